//! Media element output tap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dasp_graph::{Buffer, Input};
use rtrb::Consumer;

use crate::node::{AudioNode, ProcessContext};

/// Transport commands sent from a media element to its tap.
///
/// These travel on the element's own queue rather than the graph's message
/// queue. Before the tap is bound the element applies them directly.
#[derive(Clone, Debug)]
pub enum MediaCommand {
    /// Replace the source with pre-decoded interleaved samples.
    Load {
        samples: Arc<[f32]>,
        channels: usize,
        sample_rate: u32,
    },
    /// Start or resume; restarts from the beginning after the end was reached.
    Play,
    /// Pause (keeps position).
    Pause,
    /// Seek to position in seconds.
    Seek(f64),
}

/// Playback position shared between a tap and its element.
#[derive(Debug, Default)]
pub struct Playhead {
    frame: AtomicU64,
    ended: AtomicBool,
}

impl Playhead {
    /// Position in source frames as of the last processed block.
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    /// Clear and return the end-of-track flag.
    pub fn take_ended(&self) -> bool {
        self.ended.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn set_frame(&self, frame: u64) {
        self.frame.store(frame, Ordering::Relaxed);
    }
}

/// Reads a media element's decoded audio into the graph.
///
/// Sources at a different rate than the graph are converted with linear
/// interpolation, which is plenty for a listening aid.
pub struct MediaTap {
    commands: Consumer<MediaCommand>,
    playhead: Arc<Playhead>,
    samples: Arc<[f32]>,
    channels: usize,
    sample_rate: u32,
    /// Fractional position in source frames
    position: f64,
    playing: bool,
}

impl MediaTap {
    pub fn new(commands: Consumer<MediaCommand>, playhead: Arc<Playhead>) -> Self {
        Self {
            commands,
            playhead,
            samples: Arc::from(Vec::new()),
            channels: 1,
            sample_rate: 44_100,
            position: 0.0,
            playing: false,
        }
    }

    #[inline]
    fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Apply a transport command immediately.
    pub(crate) fn apply(&mut self, cmd: MediaCommand) {
        match cmd {
            MediaCommand::Load {
                samples,
                channels,
                sample_rate,
            } => {
                self.samples = samples;
                self.channels = channels.max(1);
                self.sample_rate = sample_rate.max(1);
                self.position = 0.0;
                self.playing = false;
                self.playhead.ended.store(false, Ordering::Relaxed);
                self.playhead.set_frame(0);
            }
            MediaCommand::Play => {
                if self.position >= self.frames() as f64 {
                    self.position = 0.0;
                }
                self.playing = true;
            }
            MediaCommand::Pause => self.playing = false,
            MediaCommand::Seek(secs) => {
                let frame = (secs.max(0.0) * self.sample_rate as f64).floor();
                self.position = frame.min(self.frames() as f64);
                self.playhead.ended.store(false, Ordering::Relaxed);
                self.playhead.set_frame(self.position as u64);
            }
        }
    }

    #[inline]
    fn sample_at(&self, frame: usize, ch: usize) -> f32 {
        self.samples[frame * self.channels + ch]
    }
}

impl AudioNode for MediaTap {
    type Message = ();

    fn process(
        &mut self,
        ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }

        if outputs.is_empty() {
            return;
        }

        let frames = self.frames();
        if !self.playing || frames == 0 {
            for buffer in outputs.iter_mut() {
                buffer.silence();
            }
            self.playhead.set_frame(self.position as u64);
            return;
        }

        let step = self.sample_rate as f64 / ctx.sample_rate as f64;
        let buffer_len = outputs[0].len();
        let mut written = buffer_len;

        for i in 0..buffer_len {
            let idx = self.position as usize;
            if idx >= frames {
                self.playing = false;
                self.playhead.ended.store(true, Ordering::Relaxed);
                written = i;
                break;
            }
            let next = (idx + 1).min(frames - 1);
            let frac = (self.position - idx as f64) as f32;

            for (ch, buffer) in outputs.iter_mut().enumerate() {
                // Map output channel to source channel (wrap if more outputs than source)
                let src_ch = ch % self.channels;
                let a = self.sample_at(idx, src_ch);
                let b = self.sample_at(next, src_ch);
                buffer[i] = a + (b - a) * frac;
            }

            self.position += step;
        }

        // Fill remaining with silence
        for buffer in outputs.iter_mut() {
            buffer[written..].iter_mut().for_each(|s| *s = 0.0);
        }
        self.playhead.set_frame(self.position.min(frames as f64) as u64);
    }

    #[inline]
    fn num_inputs(&self) -> usize { 0 }

    #[inline]
    fn num_outputs(&self) -> usize { 2 }
}
