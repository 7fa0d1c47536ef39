//! Host decoder for Ogg Vorbis files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lewton::inside_ogg::OggStreamReader;
use tracing::debug;

use crate::error::Error;
use crate::media::DecodedAudio;

/// Decode a whole Ogg Vorbis file into interleaved `f32` samples.
pub fn decode_vorbis(path: impl AsRef<Path>) -> Result<DecodedAudio, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::Decode(format!("{}: {e}", path.display())))?;
    let mut srr = OggStreamReader::new(BufReader::new(file)).map_err(|e| Error::Decode(e.to_string()))?;

    let channels = srr.ident_hdr.audio_channels as usize;
    let sample_rate = srr.ident_hdr.audio_sample_rate;
    let mut samples = Vec::new();

    while let Some(packet) = srr.read_dec_packet_itl().map_err(|e| Error::Decode(e.to_string()))? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    debug!(path = %path.display(), channels, sample_rate, samples = samples.len(), "decoded");
    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}
