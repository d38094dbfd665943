//! Scriptable collaborators for controller tests

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use streamline_player::decoder::{DecoderSource, MediaDecoder, SegmentSink, SinkError, TimeRange};
use streamline_player::net::{ProbeOutcome, Prober, SegmentSource, SegmentStream, StreamItem, UrlGate};
use streamline_player::{Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Segment sink state shared with the test
#[derive(Debug, Default)]
pub struct SinkLog {
    /// Length of every accepted chunk
    pub appended: Vec<usize>,
    pub removed: Vec<TimeRange>,
    pub buffered: Vec<TimeRange>,
    /// Appends left to reject with `CapacityExceeded`
    pub reject_appends: usize,
    pub ended: bool,
    /// Revision of every sink handed out so far
    pub attached: Vec<u64>,
}

/// Everything the controller did to the decoder
#[derive(Debug, Default)]
pub struct DecoderLog {
    pub loads: Vec<DecoderSource>,
    pub seeks: Vec<f64>,
    pub detached: usize,
    pub paused: bool,
    pub current_time: f64,
    pub sink: SinkLog,
}

pub struct FakeDecoder {
    log: Arc<Mutex<DecoderLog>>,
}

impl FakeDecoder {
    pub fn new(log: Arc<Mutex<DecoderLog>>) -> Self {
        Self { log }
    }
}

impl MediaDecoder for FakeDecoder {
    fn load(&mut self, source: DecoderSource) {
        let mut log = self.log.lock().unwrap();
        log.loads.push(source);
        log.current_time = 0.0;
    }

    fn attach_sink(&mut self, revision: u64) -> Box<dyn SegmentSink> {
        self.log.lock().unwrap().sink.attached.push(revision);
        Box::new(FakeSink {
            log: Arc::clone(&self.log),
        })
    }

    fn seek(&mut self, local_secs: f64) {
        let mut log = self.log.lock().unwrap();
        log.seeks.push(local_secs);
        log.current_time = local_secs;
    }

    fn is_paused(&self) -> bool {
        self.log.lock().unwrap().paused
    }

    fn detach(&mut self) {
        self.log.lock().unwrap().detached += 1;
    }
}

pub struct FakeSink {
    log: Arc<Mutex<DecoderLog>>,
}

impl SegmentSink for FakeSink {
    fn append_chunk(&mut self, chunk: &Bytes) -> std::result::Result<(), SinkError> {
        let mut log = self.log.lock().unwrap();
        if log.sink.reject_appends > 0 {
            log.sink.reject_appends -= 1;
            return Err(SinkError::CapacityExceeded);
        }
        log.sink.appended.push(chunk.len());
        Ok(())
    }

    fn remove_range(&mut self, start: f64, end: f64) -> std::result::Result<(), SinkError> {
        self.log.lock().unwrap().sink.removed.push(TimeRange::new(start, end));
        Ok(())
    }

    fn buffered(&self) -> Vec<TimeRange> {
        self.log.lock().unwrap().sink.buffered.clone()
    }

    fn current_time(&self) -> f64 {
        self.log.lock().unwrap().current_time
    }

    fn end_of_stream(&mut self) {
        self.log.lock().unwrap().sink.ended = true;
    }
}

/// Producing end of a stream opened through `FakeSource`
#[derive(Clone)]
pub struct OpenedStream {
    pub url: Url,
    pub tx: mpsc::Sender<StreamItem>,
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub struct FakeSource {
    opened: Mutex<Vec<OpenedStream>>,
}

impl FakeSource {
    pub fn opened(&self) -> Vec<OpenedStream> {
        self.opened.lock().unwrap().clone()
    }

    pub fn last(&self) -> OpenedStream {
        self.opened
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("a segment stream was opened")
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl SegmentSource for FakeSource {
    fn open(&self, url: &Url, capacity: usize) -> SegmentStream {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        self.opened.lock().unwrap().push(OpenedStream {
            url: url.clone(),
            tx,
            cancel: cancel.clone(),
        });
        SegmentStream::new(rx, cancel)
    }
}

pub struct FakeProber {
    outcome: Mutex<ProbeOutcome>,
    calls: Mutex<Vec<Url>>,
}

impl FakeProber {
    pub fn new(outcome: ProbeOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_outcome(&self, outcome: ProbeOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, url: &Url) -> ProbeOutcome {
        self.calls.lock().unwrap().push(url.clone());
        self.outcome.lock().unwrap().clone()
    }
}

/// Gate rejecting every URL
pub struct RejectingGate;

impl UrlGate for RejectingGate {
    fn check(&self, url: &Url) -> Result<()> {
        Err(Error::UnsafeUrl {
            url: url.to_string(),
            reason: "private network address".to_string(),
        })
    }
}
