//! Host audio capability.
//!
//! A host opens an output: a sink node for the graph plus a stream that
//! drains it. [`OfflineHost`] drains into memory and is what tests and
//! headless tools use; `CpalHost` (feature `cpal_sink`) plays through the
//! system's default output device.

#[cfg(feature = "cpal_sink")]
mod device;
mod offline;

#[cfg(feature = "cpal_sink")]
pub use device::{CpalHost, CpalStream};
pub use offline::{OfflineHost, OfflineStream};

use crate::error::Error;
use crate::node::AudioNode;

/// Format of an opened output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Ring buffer capacity between the sink node and the stream, in samples.
    pub capacity: usize,
}

/// The consuming end of an output. Created paused.
pub trait OutputStream {
    fn resume(&mut self) -> Result<(), Error>;

    fn suspend(&mut self) -> Result<(), Error>;

    /// Samples taken out of the ring buffer so far.
    fn samples_consumed(&self) -> usize;
}

/// Something that can open an audio output.
pub trait AudioHost {
    type Sink: AudioNode<Message = ()>;
    type Stream: OutputStream;

    /// Fails with [`Error::UnsupportedPlatform`] when there is no output at all.
    fn open(&mut self) -> Result<(Self::Sink, Self::Stream, StreamInfo), Error>;
}
