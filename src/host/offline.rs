//! In-memory output for tests and headless rendering

use rtrb::{Consumer, RingBuffer};

use crate::error::Error;
use crate::host::{AudioHost, OutputStream, StreamInfo};
use crate::nodes::RtrbSink;

/// A host whose "device" is a ring buffer the caller drains.
#[derive(Clone, Debug)]
pub struct OfflineHost {
    sample_rate: u32,
    channels: u16,
    capacity: usize,
    available: bool,
    opened: usize,
}

impl OfflineHost {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            capacity: 16_384,
            available: true,
            opened: 0,
        }
    }

    /// A host with no audio capability at all.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(48_000, 2)
        }
    }

    pub fn with_capacity(mut self, samples: usize) -> Self {
        self.capacity = samples.max(64);
        self
    }

    /// How many times an output was opened.
    pub fn opened(&self) -> usize {
        self.opened
    }
}

impl AudioHost for OfflineHost {
    type Sink = RtrbSink;
    type Stream = OfflineStream;

    fn open(&mut self) -> Result<(RtrbSink, OfflineStream, StreamInfo), Error> {
        if !self.available {
            return Err(Error::UnsupportedPlatform);
        }
        self.opened += 1;

        let (producer, consumer) = RingBuffer::new(self.capacity);
        let info = StreamInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
            capacity: self.capacity,
        };
        let stream = OfflineStream {
            consumer,
            consumed: 0,
            running: false,
        };
        Ok((RtrbSink::new(producer, self.channels as usize), stream, info))
    }
}

/// Drained by hand. Draining a suspended stream yields nothing, like a
/// paused device.
pub struct OfflineStream {
    consumer: Consumer<f32>,
    consumed: usize,
    running: bool,
}

impl OfflineStream {
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Take every queued interleaved sample.
    pub fn drain(&mut self) -> Vec<f32> {
        if !self.running {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.consumer.slots());
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
        }
        self.consumed += out.len();
        out
    }
}

impl OutputStream for OfflineStream {
    fn resume(&mut self) -> Result<(), Error> {
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), Error> {
        self.running = false;
        Ok(())
    }

    fn samples_consumed(&self) -> usize {
        self.consumed
    }
}
