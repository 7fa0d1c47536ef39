//! Media elements: the playback objects the signal graph taps.
//!
//! Transport (play/pause/seek) stays with the element. The graph only ever
//! sees the element's output through its [`MediaElement::Tap`] node, which the
//! platform hands out once per element.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Producer, RingBuffer};
use tracing::debug;

use crate::error::Error;
use crate::node::AudioNode;
use crate::nodes::{MediaCommand, MediaTap, Playhead};

/// Stable identity of a media element, independent of what it has loaded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ElementId(u64);

impl ElementId {
    /// A process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pre-decoded interleaved audio, as produced by the host decoder.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }
}

/// A playback element the signal graph can tap.
pub trait MediaElement {
    /// Node carrying the element's output into the graph.
    type Tap: AudioNode<Message = ()>;
    /// What the element can be loaded with.
    type Source;

    fn id(&self) -> ElementId;

    /// Whether something is loaded.
    fn has_source(&self) -> bool;

    /// Replace the loaded source; the element pauses and rewinds. On error
    /// the previous source stays loaded.
    fn load(&mut self, source: Self::Source) -> Result<(), Error>;

    /// Start transport. Fails with [`Error::PlaybackRejected`] when the
    /// element cannot play what it holds.
    fn play(&mut self) -> Result<(), Error>;

    fn pause(&mut self);

    fn seek(&mut self, secs: f64);

    /// Hand transport changes that are still waiting over to the tap.
    fn flush(&mut self) {}

    fn position_secs(&self) -> f64;

    fn duration_secs(&self) -> f64;

    /// Clear and return whether playback ran off the end since the last call.
    fn take_ended(&mut self) -> bool;

    /// Hand out the element's output node. The platform allows this once per
    /// element; a second call fails with [`Error::BindConflict`].
    fn tap(&mut self) -> Result<Self::Tap, Error>;
}

#[derive(Clone, Copy, Debug)]
struct LoadedInfo {
    frames: usize,
    sample_rate: u32,
}

/// Latest transport state not yet handed to a bound tap.
///
/// Only the newest load, seek and play/pause matter, so repeated requests
/// overwrite each other instead of piling up in the queue.
#[derive(Default)]
struct PendingTransport {
    load: Option<MediaCommand>,
    seek: Option<f64>,
    playing: Option<bool>,
}

impl PendingTransport {
    fn merge(&mut self, cmd: MediaCommand) {
        match cmd {
            MediaCommand::Load { .. } => {
                // a load rewinds and pauses
                self.seek = None;
                self.playing = None;
                self.load = Some(cmd);
            }
            MediaCommand::Seek(secs) => self.seek = Some(secs),
            MediaCommand::Play => self.playing = Some(true),
            MediaCommand::Pause => self.playing = Some(false),
        }
    }

    fn take_next(&mut self) -> Option<MediaCommand> {
        if let Some(load) = self.load.take() {
            return Some(load);
        }
        if let Some(secs) = self.seek.take() {
            return Some(MediaCommand::Seek(secs));
        }
        self.playing
            .take()
            .map(|play| if play { MediaCommand::Play } else { MediaCommand::Pause })
    }

    fn is_empty(&self) -> bool {
        self.load.is_none() && self.seek.is_none() && self.playing.is_none()
    }
}

/// An element that plays [`DecodedAudio`] from memory.
///
/// Until its tap is handed out the element drives the tap directly. After
/// that, commands go through a small queue the tap drains every block.
pub struct MemoryElement {
    id: ElementId,
    commands: Producer<MediaCommand>,
    tap: Option<MediaTap>,
    playhead: Arc<Playhead>,
    loaded: Option<LoadedInfo>,
    pending: PendingTransport,
}

impl MemoryElement {
    pub fn new() -> Self {
        let (commands, consumer) = RingBuffer::new(32);
        let playhead = Arc::new(Playhead::default());
        Self {
            id: ElementId::next(),
            commands,
            tap: Some(MediaTap::new(consumer, Arc::clone(&playhead))),
            playhead,
            loaded: None,
            pending: PendingTransport::default(),
        }
    }

    fn submit(&mut self, cmd: MediaCommand) {
        match self.tap.as_mut() {
            Some(tap) => tap.apply(cmd),
            None => {
                self.pending.merge(cmd);
                self.deliver();
            }
        }
    }

    fn deliver(&mut self) {
        while !self.commands.is_full() {
            let Some(cmd) = self.pending.take_next() else {
                return;
            };
            if self.commands.push(cmd).is_err() {
                return;
            }
        }
        if !self.pending.is_empty() {
            debug!(element = ?self.id, "media command queue full, holding latest transport state");
        }
    }
}

impl Default for MemoryElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement for MemoryElement {
    type Tap = MediaTap;
    type Source = DecodedAudio;

    fn id(&self) -> ElementId {
        self.id
    }

    fn has_source(&self) -> bool {
        self.loaded.is_some()
    }

    fn load(&mut self, source: DecodedAudio) -> Result<(), Error> {
        if source.channels == 0 {
            return Err(Error::Decode("source has no channels".into()));
        }
        let info = LoadedInfo {
            frames: source.frames(),
            sample_rate: source.sample_rate.max(1),
        };
        self.submit(MediaCommand::Load {
            samples: Arc::from(source.samples),
            channels: source.channels,
            sample_rate: source.sample_rate,
        });
        self.loaded = Some(info);
        self.playhead.set_frame(0);
        self.playhead.take_ended();
        debug!(element = ?self.id, frames = info.frames, "source loaded");
        Ok(())
    }

    fn play(&mut self) -> Result<(), Error> {
        match self.loaded {
            Some(info) if info.frames > 0 => {
                self.submit(MediaCommand::Play);
                Ok(())
            }
            Some(_) => Err(Error::PlaybackRejected("source is empty".into())),
            None => Err(Error::PlaybackRejected("no source loaded".into())),
        }
    }

    fn pause(&mut self) {
        self.submit(MediaCommand::Pause);
    }

    fn seek(&mut self, secs: f64) {
        self.submit(MediaCommand::Seek(secs));
        if let Some(info) = self.loaded {
            let frame = (secs.max(0.0) * info.sample_rate as f64).floor() as u64;
            self.playhead.set_frame(frame.min(info.frames as u64));
        }
    }

    fn flush(&mut self) {
        if self.tap.is_none() {
            self.deliver();
        }
    }

    fn position_secs(&self) -> f64 {
        match self.loaded {
            Some(info) => self.playhead.frame() as f64 / info.sample_rate as f64,
            None => 0.0,
        }
    }

    fn duration_secs(&self) -> f64 {
        match self.loaded {
            Some(info) => info.frames as f64 / info.sample_rate as f64,
            None => 0.0,
        }
    }

    fn take_ended(&mut self) -> bool {
        self.playhead.take_ended()
    }

    fn tap(&mut self) -> Result<MediaTap, Error> {
        self.tap.take().ok_or(Error::BindConflict(self.id))
    }
}
