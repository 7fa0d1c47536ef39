//! Pass-through analysis tap

use dasp_graph::{Buffer, Input};
use rtrb::Producer;

use crate::node::{AudioNode, ProcessContext};

/// Copies its input to its output unchanged and pushes a mono mix of every
/// block into a ring buffer for [`AnalyserTap`](crate::analysis::AnalyserTap).
///
/// When the reader falls behind, whole blocks are dropped rather than stalling
/// the graph.
pub struct Analyser {
    producer: Producer<f32>,
}

impl Analyser {
    pub fn new(producer: Producer<f32>) -> Self {
        Self { producer }
    }
}

impl AudioNode for Analyser {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        let in_buffers = inputs.first().map(|i| i.buffers()).unwrap_or(&[]);
        if in_buffers.is_empty() {
            for buffer in outputs.iter_mut() {
                buffer.silence();
            }
            return;
        }

        for (ch, out_buffer) in outputs.iter_mut().enumerate() {
            out_buffer.copy_from_slice(&in_buffers[ch.min(in_buffers.len() - 1)]);
        }

        let len = in_buffers[0].len();
        if self.producer.slots() < len {
            return;
        }

        let scale = 1.0 / in_buffers.len() as f32;
        for i in 0..len {
            let mono: f32 = in_buffers.iter().map(|b| b[i]).sum::<f32>() * scale;
            let _ = self.producer.push(mono);
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 2 }
}
