//! Built-in audio nodes.
//!
//! The player graph only ever contains these:
//!
//! ```text
//! MediaTap ──> Gain ──> Analyser ──> RtrbSink ──> output stream
//! ```
//!
//! - [`MediaTap`] - output of a media element (one per element, ever)
//! - [`Gain`] - amplification up to 4.0 with linear ramps
//! - [`Analyser`] - pass-through that feeds the spectrum reader
//! - [`RtrbSink`] - interleaves into the ring buffer an output stream drains

pub mod effect;
pub mod sink;
pub mod source;

// Re-export common types at the top level for convenience
pub use effect::{Analyser, Gain, GainMessage, GainMonitor};
pub use sink::RtrbSink;
pub use source::{MediaCommand, MediaTap, Playhead};
