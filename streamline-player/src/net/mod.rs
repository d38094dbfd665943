//! Network collaborators: segment source, diagnostic probe and URL gate

pub mod gate;
pub mod probe;
pub mod source;

pub use gate::{HttpSchemeGate, UrlGate};
pub use probe::{parse_error_body, HttpProber, ProbeOutcome, Prober};
pub use source::{HttpSegmentSource, SegmentSource, SegmentStream, StreamItem};
