//! Sink nodes (consume audio, no audio outputs)

mod rtrb_sink;

pub use rtrb_sink::RtrbSink;
