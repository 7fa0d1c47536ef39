//! Crate-wide error type.

use core::fmt;

use crate::media::ElementId;

/// Everything that can go wrong between a play/volume request and the speakers.
///
/// The variants follow one propagation policy: structural and platform errors
/// reach the user as a plain-language message ([`Error::user_message`]), while
/// transient errors (persistence, malformed gain input) are logged and dropped
/// by the component that sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The host has no audio output at all. Fatal to the audio features, never retried.
    UnsupportedPlatform,
    /// A gain value that is not finite or lies outside `[0.0, 4.0]`.
    InvalidGainValue(f64),
    /// The durable store could not be read or written.
    Persistence(String),
    /// An element was tapped twice. Prevented by the binding cache, so seeing
    /// this means a bug in the caller.
    BindConflict(ElementId),
    /// A source was bound before the gain/analyser chain existed.
    GraphNotBuilt,
    /// The host refused to start playback (nothing decodable, device gone, ...).
    PlaybackRejected(String),
    /// Play was requested with no file loaded.
    NoSourceLoaded,
    /// The processing context was closed and cannot be used again.
    ContextClosed,
    /// The output stream failed to start, pause or build.
    Stream(String),
    /// Configuration could not be read or parsed.
    Config(String),
    /// Tags could not be read from a file.
    Metadata(String),
    /// A file could not be decoded by the host decoder.
    Decode(String),
}

impl Error {
    /// Whether the user can reasonably try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PlaybackRejected(_) | Error::NoSourceLoaded | Error::Stream(_))
    }

    /// Plain-language message suitable for showing to the listener.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::UnsupportedPlatform | Error::ContextClosed => "Cannot play audio on this device.",
            Error::NoSourceLoaded => "Select a music file first!",
            Error::PlaybackRejected(_) | Error::Stream(_) | Error::Decode(_) => {
                "Could not play this audio. Please check the file."
            }
            Error::BindConflict(_) | Error::GraphNotBuilt => "Something went wrong while starting playback.",
            Error::InvalidGainValue(_) | Error::Persistence(_) | Error::Config(_) | Error::Metadata(_) => "",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedPlatform => write!(f, "no audio output is available on this host"),
            Error::InvalidGainValue(v) => write!(f, "invalid gain value {v}"),
            Error::Persistence(msg) => write!(f, "persistence failure: {msg}"),
            Error::BindConflict(id) => write!(f, "media element {id:?} is already tapped"),
            Error::GraphNotBuilt => write!(f, "signal graph has not been built"),
            Error::PlaybackRejected(msg) => write!(f, "playback rejected: {msg}"),
            Error::NoSourceLoaded => write!(f, "no source loaded"),
            Error::ContextClosed => write!(f, "processing context is closed"),
            Error::Stream(msg) => write!(f, "output stream error: {msg}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Metadata(msg) => write!(f, "metadata error: {msg}"),
            Error::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
