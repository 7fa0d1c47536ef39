//! Source nodes (generate audio, no audio inputs)

mod media_tap;

pub use media_tap::{MediaCommand, MediaTap, Playhead};
