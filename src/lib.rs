//! SuperEars - audio player core with amplification past unity gain
//!
//! Design principles:
//! - One graph per processing context: `MediaTap -> Gain -> Analyser -> Sink`,
//!   built once and never rebuilt
//! - Nodes receive parameters via message ring buffers, not shared state
//! - Gain changes are linear ramps; a new ramp supersedes the one in flight
//! - Each media element is tapped at most once; bindings are cached by identity
//! - Volume persistence is debounced and never blocks playback

mod node;
mod graph;

pub mod analysis;
pub mod binding;
pub mod config;
pub mod context;
#[cfg(feature = "vorbis_src")]
pub mod decode;
pub mod error;
pub mod gain;
pub mod host;
pub mod media;
pub mod metadata;
pub mod nodes;
pub mod persist;
pub mod player;
pub mod signal_graph;

pub use node::{AudioNode, ProcessContext, NodeId, BLOCK_SIZE};
pub use graph::{AudioGraph, NodeHandle};

pub use analysis::AnalyserTap;
pub use binding::{SourceBinding, SourceBindings};
pub use config::EngineConfig;
pub use context::{ContextState, ProcessingContext};
pub use error::Error;
pub use gain::{GainController, GainStage, MAX_GAIN, UNITY};
pub use host::{AudioHost, OfflineHost, OutputStream, StreamInfo};
pub use media::{DecodedAudio, ElementId, MediaElement, MemoryElement};
pub use metadata::{CoverArt, TagReader, TrackTags};
pub use persist::{DebouncedWriter, JsonFileStore, KeyValueStore, MemoryStore, UnavailableStore};
pub use player::{PlayState, Player, Track};
pub use signal_graph::{GraphControls, SignalGraphManager};
