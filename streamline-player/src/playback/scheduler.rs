//! Cancellable timer scheduler
//!
//! One slot per timer kind. Scheduling a kind replaces (and aborts) the previous
//! timer of that kind; every timer carries a generation so a token that was
//! already in flight when it got superseded or cancelled is rejected by `accept`.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Check for progress after a waiting/stalled signal
    StallCheck,

    /// Commit a debounced transcode seek
    SeekCommit,

    /// Escalate a proxy that never became ready
    ProxyWatchdog,

    /// Retry an append no eviction tier made room for
    QuotaRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub generation: u64,
}

pub struct Scheduler {
    tx: mpsc::UnboundedSender<TimerToken>,
    rx: mpsc::UnboundedReceiver<TimerToken>,
    next_generation: u64,
    armed: HashMap<TimerKind, (u64, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            next_generation: 0,
            armed: HashMap::new(),
        }
    }

    /// Arm `kind` to fire after `delay`, superseding any armed timer of that kind
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerToken {
        self.next_generation += 1;
        let token = TimerToken {
            kind,
            generation: self.next_generation,
        };

        let tx = self.tx.clone();
        // Deadline is fixed here, not when the task first runs
        let sleep = tokio::time::sleep(delay);
        let handle = tokio::spawn(async move {
            sleep.await;
            let _ = tx.send(token);
        });

        if let Some((_, previous)) = self.armed.insert(kind, (token.generation, handle)) {
            previous.abort();
        }

        trace!(?kind, generation = token.generation, ?delay, "Timer scheduled");
        token
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some((generation, handle)) = self.armed.remove(&kind) {
            handle.abort();
            trace!(?kind, generation, "Timer cancelled");
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Whether a fired token is still current; consumes the slot if so
    pub fn accept(&mut self, token: TimerToken) -> bool {
        match self.armed.get(&token.kind) {
            Some((generation, _)) if *generation == token.generation => {
                self.armed.remove(&token.kind);
                true
            }
            _ => {
                trace!(kind = ?token.kind, generation = token.generation, "Ignoring superseded timer");
                false
            }
        }
    }

    /// Wait for the next fired timer (current or superseded)
    pub async fn fired(&mut self) -> TimerToken {
        match self.rx.recv().await {
            Some(token) => token,
            // Unreachable while `self.tx` lives
            None => std::future::pending().await,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
