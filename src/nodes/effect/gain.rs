//! Ramped gain stage

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dasp_graph::{Buffer, Input};

use crate::node::{AudioNode, ProcessContext, BLOCK_SIZE};

/// Messages to control gain
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GainMessage {
    /// Jump to a gain immediately, cancelling any ramp in flight.
    SetGain(f32),
    /// Cancel any ramp in flight and ramp linearly from the current effective
    /// gain to `target` over `samples` samples.
    RampTo { target: f32, samples: u32 },
}

/// Read-only view of the gain a [`Gain`] node is actually applying.
///
/// Updated once per processed block.
#[derive(Clone, Debug)]
pub struct GainMonitor(Arc<AtomicU32>);

impl GainMonitor {
    fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// The effective gain at the end of the last processed block.
    pub fn effective(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Amplitude scaling with click-free linear ramps.
///
/// There is no limiter after this stage. Gains above 1.0 are allowed to clip
/// at the output.
pub struct Gain {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    monitor: GainMonitor,
}

impl Gain {
    /// Create a new gain node resting at `gain`
    pub fn new(gain: f32) -> Self {
        Self {
            current: gain,
            target: gain,
            step: 0.0,
            remaining: 0,
            monitor: GainMonitor::new(gain),
        }
    }

    /// A monitor that reports the effective gain from the control side.
    pub fn monitor(&self) -> GainMonitor {
        self.monitor.clone()
    }

    #[inline]
    pub fn effective(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    fn handle(&mut self, msg: GainMessage) {
        match msg {
            GainMessage::SetGain(g) => {
                self.current = g;
                self.target = g;
                self.remaining = 0;
                self.step = 0.0;
            }
            GainMessage::RampTo { target, samples } => {
                // start from wherever the previous ramp got to
                let samples = samples.max(1);
                self.target = target;
                self.remaining = samples;
                self.step = (target - self.current) / samples as f32;
            }
        }
    }

    #[inline]
    fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }
}

impl AudioNode for Gain {
    type Message = GainMessage;

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        messages: impl Iterator<Item = GainMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            self.handle(msg);
        }

        // The curve advances even with nothing connected so the ramp
        // keeps wall-clock time.
        let mut curve = [0.0f32; BLOCK_SIZE];
        for g in curve.iter_mut() {
            *g = self.advance();
        }
        self.monitor.store(self.current);

        let in_buffers = inputs.first().map(|i| i.buffers()).unwrap_or(&[]);
        if in_buffers.is_empty() {
            for buffer in outputs.iter_mut() {
                buffer.silence();
            }
            return;
        }

        for (ch, out_buffer) in outputs.iter_mut().enumerate() {
            // Get input for this channel, or last available channel
            let in_buffer = &in_buffers[ch.min(in_buffers.len() - 1)];
            for ((out, &sample), &g) in out_buffer.iter_mut().zip(in_buffer.iter()).zip(curve.iter()) {
                *out = sample * g;
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 2 } // Stereo pass-through
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: ProcessContext = ProcessContext {
        sample_rate: 48_000,
        buffer_size: BLOCK_SIZE,
    };

    fn run_block(gain: &mut Gain, msgs: Vec<GainMessage>) -> [f32; BLOCK_SIZE] {
        let mut curve = [0.0; BLOCK_SIZE];
        for msg in msgs {
            gain.handle(msg);
        }
        for g in curve.iter_mut() {
            *g = gain.advance();
        }
        curve
    }

    #[test]
    fn ramp_reaches_target_exactly() {
        let mut gain = Gain::new(1.0);
        let first = run_block(&mut gain, vec![GainMessage::RampTo { target: 2.0, samples: 128 }]);
        assert!(first[0] > 1.0 && first[0] < 1.02);
        assert!(first.windows(2).all(|w| w[1] >= w[0]));
        assert!(gain.effective() < 2.0);

        let second = run_block(&mut gain, vec![]);
        assert_eq!(second[BLOCK_SIZE - 1], 2.0);
        assert_eq!(gain.effective(), 2.0);

        // resting afterwards
        let third = run_block(&mut gain, vec![]);
        assert!(third.iter().all(|&g| g == 2.0));
    }

    #[test]
    fn new_ramp_starts_from_effective_value() {
        let mut gain = Gain::new(0.0);
        run_block(&mut gain, vec![GainMessage::RampTo { target: 4.0, samples: 256 }]);
        let midway = gain.effective();
        assert!(midway > 0.0 && midway < 4.0);

        // superseding ramp heads down from where the first one got to
        let curve = run_block(&mut gain, vec![GainMessage::RampTo { target: 0.5, samples: 64 }]);
        assert!(curve[0] < midway);
        assert_eq!(curve[BLOCK_SIZE - 1], 0.5);
        assert_eq!(gain.target(), 0.5);
    }

    #[test]
    fn set_gain_cancels_ramp() {
        let mut gain = Gain::new(1.0);
        run_block(&mut gain, vec![GainMessage::RampTo { target: 3.0, samples: 4800 }]);
        let curve = run_block(&mut gain, vec![GainMessage::SetGain(0.25)]);
        assert!(curve.iter().all(|&g| g == 0.25));
    }

    #[test]
    fn unconnected_gain_outputs_silence_and_updates_monitor() {
        let mut gain = Gain::new(1.0);
        let monitor = gain.monitor();
        let mut outputs = [Buffer::default(), Buffer::default()];
        outputs[0][3] = 1.0;

        gain.process(
            &CTX,
            [GainMessage::SetGain(3.5)].into_iter(),
            &[],
            &mut outputs,
        );

        assert!(outputs.iter().all(|b| b.iter().all(|&s| s == 0.0)));
        assert_eq!(monitor.effective(), 3.5);
    }
}
