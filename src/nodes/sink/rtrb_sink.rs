//! Ring buffer sink feeding an output stream

use dasp_graph::{Buffer, Input};
use rtrb::Producer;

use crate::node::{AudioNode, ProcessContext, BLOCK_SIZE};

/// A sink that pushes interleaved audio into an rtrb ring buffer.
///
/// Every output stream consumes from the other end of this buffer: the cpal
/// callback for a real device, or the caller for an offline stream.
pub struct RtrbSink {
    producer: Producer<f32>,
    channels: usize,
}

impl RtrbSink {
    /// Create a sink that writes interleaved samples to the given producer
    pub fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self {
            producer,
            channels: channels.max(1),
        }
    }

    /// Create a sink for stereo audio
    pub fn stereo(producer: Producer<f32>) -> Self {
        Self::new(producer, 2)
    }
}

impl AudioNode for RtrbSink {
    type Message = (); // No control messages

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        // An unconnected sink still writes silence so the stream never
        // underruns and block accounting stays exact.
        let buffers = inputs.first().map(|i| i.buffers()).unwrap_or(&[]);
        let samples_needed = BLOCK_SIZE * self.channels;

        // Skip rather than partially write
        if self.producer.slots() < samples_needed {
            return;
        }

        // Interleave channels
        for i in 0..BLOCK_SIZE {
            for ch in 0..self.channels {
                let sample = match buffers.len() {
                    0 => 0.0,
                    n => buffers[ch.min(n - 1)][i],
                };
                let _ = self.producer.push(sample);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}
