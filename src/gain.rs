//! Volume control: the gain stage value, ramped changes and persistence.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::Error;
use crate::nodes::GainMessage;
use crate::persist::{DebouncedWriter, KeyValueStore};
use crate::signal_graph::GraphControls;

/// Loudest allowed gain, 400%.
pub const MAX_GAIN: f64 = 4.0;
/// Gain that leaves the signal unchanged.
pub const UNITY: f64 = 1.0;

/// A validated gain factor: finite and within `0.0..=MAX_GAIN`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct GainStage(f64);

impl GainStage {
    pub fn new(value: f64) -> Result<Self, Error> {
        if value.is_finite() && (0.0..=MAX_GAIN).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidGainValue(value))
        }
    }

    /// Pull a finite value into range. `None` for NaN and infinities.
    pub fn clamped(value: f64) -> Option<Self> {
        value.is_finite().then(|| Self(value.clamp(0.0, MAX_GAIN)))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Displayed volume, 100 for unity.
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self(UNITY)
    }
}

/// Owns the one gain value of the session and pushes it into the graph.
///
/// The in-memory stage is authoritative: it changes immediately on
/// [`set_volume`](Self::set_volume), while the audible gain follows with a
/// linear ramp and the store catches up after the debounce delay.
pub struct GainController<S: KeyValueStore> {
    stage: GainStage,
    controls: Option<GraphControls>,
    /// Ramp that did not fit in the gain node's queue.
    pending: Option<GainMessage>,
    ramp: Duration,
    writer: DebouncedWriter<S>,
}

impl<S: KeyValueStore> GainController<S> {
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        Self {
            stage: GainStage::clamped(config.default_gain).unwrap_or_default(),
            controls: None,
            pending: None,
            ramp: config.ramp(),
            writer: DebouncedWriter::new(store, config.volume_key.clone(), config.debounce()),
        }
    }

    pub fn stage(&self) -> GainStage {
        self.stage
    }

    pub fn volume(&self) -> f64 {
        self.stage.value()
    }

    pub fn is_attached(&self) -> bool {
        self.controls.is_some()
    }

    pub fn store(&self) -> &Arc<S> {
        self.writer.store()
    }

    /// Validate and apply a new gain.
    ///
    /// Rejected values leave everything untouched and come back as
    /// [`Error::InvalidGainValue`], which is for logging only.
    pub fn set_volume(&mut self, value: f64) -> Result<(), Error> {
        let stage = GainStage::new(value).map_err(|e| {
            debug!(value, "ignoring gain outside 0..=4");
            e
        })?;
        self.stage = stage;
        self.apply();
        self.writer.schedule(stage.value());
        Ok(())
    }

    /// Take over the endpoints of a freshly built graph.
    ///
    /// The gain node is built at the current stage, so nothing needs sending.
    pub fn attach(&mut self, controls: GraphControls) {
        debug!(gain = self.stage.value(), "gain controller attached to graph");
        self.controls = Some(controls);
        self.pending = None;
    }

    /// Ramp the graph to the current stage again. No-op before the graph exists.
    pub fn reapply(&mut self) {
        self.apply();
    }

    /// Retry a ramp the gain node's queue had no room for.
    pub fn flush(&mut self) {
        if let (Some(msg), Some(controls)) = (self.pending.take(), self.controls.as_mut()) {
            if let Err(msg) = controls.gain.send(msg) {
                self.pending = Some(msg);
            }
        }
    }

    fn apply(&mut self) {
        let Some(controls) = self.controls.as_mut() else {
            return;
        };
        let samples = (self.ramp.as_secs_f64() * controls.sample_rate as f64).round() as u32;
        let msg = GainMessage::RampTo {
            target: self.stage.value() as f32,
            samples,
        };
        // a newer ramp replaces any that is still waiting
        self.pending = controls.gain.send(msg).err();
        if self.pending.is_some() {
            debug!("gain queue full, ramp deferred");
        }
    }

    /// The gain the audio side is applying right now, which lags the stage
    /// while a ramp is in flight.
    pub fn effective_gain(&self) -> f32 {
        match &self.controls {
            Some(controls) => controls.monitor.effective(),
            None => self.stage.value() as f32,
        }
    }

    /// Current spectrum, `fft_size / 2` bytes. Empty before the graph exists.
    pub fn snapshot(&mut self) -> &[u8] {
        match self.controls.as_mut() {
            Some(controls) => controls.analyser.snapshot(),
            None => &[],
        }
    }

    /// Load the persisted gain, clamped into range, through
    /// [`set_volume`](Self::set_volume). Store failures keep the current stage.
    pub async fn restore(&mut self) {
        let key = self.writer.key().to_owned();
        match self.writer.store().get(&key).await {
            Ok(Some(value)) => match GainStage::clamped(value) {
                Some(stage) => {
                    if stage.value() != value {
                        debug!(stored = value, applied = stage.value(), "persisted gain clamped");
                    }
                    // in range by construction
                    let _ = self.set_volume(stage.value());
                }
                None => debug!(stored = value, "ignoring non-finite persisted gain"),
            },
            Ok(None) => debug!(key = %key, "no persisted gain"),
            Err(e) => warn!("could not read persisted gain: {e}"),
        }
    }

    /// Wait for the pending persistence write to land.
    pub async fn settle(&mut self) {
        self.writer.flush().await;
    }
}
