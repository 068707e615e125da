//! Sink implementations
//!
//! Contains DiscardSink, StdoutSink and LokiSink.

mod discard;
mod loki;
mod stdout;

pub use self::discard::DiscardSink;
pub use self::loki::{LokiSink, PushRequest, PushStream, MAX_ERROR_BODY_LEN};
pub use self::stdout::StdoutSink;
