//! The player: one media element, one gain stage, one graph.
//!
//! Everything here runs on the host's event loop. `tick` is expected to be
//! called regularly (every display frame is plenty) to keep the output fed.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::context::ContextState;
use crate::error::Error;
use crate::gain::{GainController, GainStage};
use crate::host::AudioHost;
use crate::media::MediaElement;
use crate::metadata::TrackTags;
use crate::persist::KeyValueStore;
use crate::signal_graph::SignalGraphManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

/// What the listener picked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    pub tags: TrackTags,
}

impl Track {
    pub fn display_name(&self) -> String {
        self.tags.display_name(&self.name)
    }
}

pub struct Player<H: AudioHost, S: KeyValueStore, E: MediaElement> {
    graph: SignalGraphManager<H>,
    gain: GainController<S>,
    element: E,
    track: Option<Track>,
    playing: bool,
}

impl<H: AudioHost, S: KeyValueStore, E: MediaElement> Player<H, S, E> {
    /// Set up a player and restore the persisted volume. Nothing touches the
    /// audio host until the first play.
    pub async fn start(config: &EngineConfig, host: H, store: Arc<S>, element: E) -> Self {
        let mut gain = GainController::new(store, config);
        gain.restore().await;
        info!(volume = gain.volume(), "player ready");

        Self {
            graph: SignalGraphManager::new(host, config),
            gain,
            element,
            track: None,
            playing: false,
        }
    }

    /// Replace the loaded source. Playback stops and progress resets.
    ///
    /// If the element refuses the source, the current track and its playback
    /// state are left alone.
    pub fn load(&mut self, source: E::Source, name: impl Into<String>, tags: TrackTags) -> Result<(), Error> {
        let track = Track { name: name.into(), tags };
        if let Err(e) = self.element.load(source) {
            warn!(track = %track.display_name(), "could not load track: {e}");
            return Err(e);
        }
        self.playing = false;

        info!(track = %track.display_name(), "track loaded");
        self.track = Some(track);
        Ok(())
    }

    /// Pause if playing, otherwise start playback.
    ///
    /// Starting runs element play, then resume/build/bind, then re-applies the
    /// volume. Any failure leaves the player paused.
    pub fn toggle_play(&mut self) -> Result<PlayState, Error> {
        if !self.element.has_source() {
            return Err(Error::NoSourceLoaded);
        }

        if self.playing {
            self.element.pause();
            self.playing = false;
            return Ok(PlayState::Paused);
        }

        if let Err(e) = self.start_playback() {
            error!("could not start playback: {e}");
            self.element.pause();
            self.playing = false;
            return Err(e);
        }
        self.playing = true;
        Ok(PlayState::Playing)
    }

    fn start_playback(&mut self) -> Result<(), Error> {
        self.element.play()?;
        let initial = self.gain.volume() as f32;
        if let Some(controls) = self.graph.prepare_playback(&mut self.element, initial)? {
            self.gain.attach(controls);
        }
        self.gain.reapply();
        Ok(())
    }

    /// Keep the output fed. Returns true when the track ran out during this
    /// tick; the player is then paused with progress back at the start.
    pub fn tick(&mut self) -> bool {
        self.gain.flush();
        self.element.flush();
        self.graph.render();

        if self.element.take_ended() {
            self.playing = false;
            self.element.seek(0.0);
            info!("track ended");
            return true;
        }
        false
    }

    pub fn set_volume(&mut self, value: f64) -> Result<(), Error> {
        self.gain.set_volume(value)
    }

    pub fn volume(&self) -> f64 {
        self.gain.volume()
    }

    pub fn volume_percent(&self) -> u32 {
        self.gain.stage().percent()
    }

    pub fn stage(&self) -> GainStage {
        self.gain.stage()
    }

    pub fn snapshot(&mut self) -> &[u8] {
        self.gain.snapshot()
    }

    pub fn state(&self) -> PlayState {
        if self.playing {
            PlayState::Playing
        } else {
            PlayState::Paused
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn position_secs(&self) -> f64 {
        self.element.position_secs()
    }

    pub fn duration_secs(&self) -> f64 {
        self.element.duration_secs()
    }

    pub fn seek(&mut self, secs: f64) {
        if secs.is_finite() {
            self.element.seek(secs.clamp(0.0, self.duration_secs()));
        } else {
            warn!(secs, "ignoring seek to non-finite position");
        }
    }

    pub fn context_state(&self) -> ContextState {
        self.graph.state()
    }

    pub fn graph(&self) -> &SignalGraphManager<H> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SignalGraphManager<H> {
        &mut self.graph
    }

    pub fn gain(&self) -> &GainController<S> {
        &self.gain
    }

    pub fn gain_mut(&mut self) -> &mut GainController<S> {
        &mut self.gain
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    /// Stop everything and let the pending volume write land.
    pub async fn shutdown(&mut self) {
        self.element.pause();
        self.playing = false;
        self.graph.close();
        self.gain.settle().await;
    }
}

/// `m:ss`, as shown next to the progress bar.
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "0:00".into();
    }
    let total = secs.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
