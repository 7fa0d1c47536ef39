//! Best-effort track tags for display.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use crate::error::Error;

/// Picture type of a front cover in a FLAC/Vorbis picture block.
const FRONT_COVER: u32 = 3;

/// Embedded cover image.
#[derive(Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// MIME type as tagged, e.g. `image/jpeg`.
    pub mime: String,
    pub data: Vec<u8>,
}

impl CoverArt {
    /// `data:` URL for showing the image as a background.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.data))
    }

    /// Decode a base64 `METADATA_BLOCK_PICTURE` comment. Returns the picture
    /// type alongside the image.
    pub fn from_picture_block(encoded: &str) -> Result<(u32, Self), Error> {
        let raw = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::Metadata(format!("picture block: {e}")))?;
        let mut block = PictureBlock { raw: &raw };

        let kind = block.u32()?;
        let mime = block.field()?;
        let mime = String::from_utf8_lossy(mime).into_owned();
        block.field()?; // description
        block.skip(16)?; // width, height, depth, palette size
        let data = block.field()?.to_vec();
        if data.is_empty() {
            return Err(Error::Metadata("picture block has no image".into()));
        }

        let mime = if mime.is_empty() { "image/jpeg".to_owned() } else { mime };
        Ok((kind, Self { mime, data }))
    }
}

impl std::fmt::Debug for CoverArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverArt")
            .field("mime", &self.mime)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Big-endian reader over a decoded picture block.
struct PictureBlock<'a> {
    raw: &'a [u8],
}

impl<'a> PictureBlock<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.raw.len() < len {
            return Err(Error::Metadata("picture block is truncated".into()));
        }
        let (head, rest) = self.raw.split_at(len);
        self.raw = rest;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.take(len).map(|_| ())
    }

    /// Length-prefixed bytes.
    fn field(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u32()? as usize;
        self.take(len)
    }
}

/// What is known about a track beyond its audio.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover: Option<CoverArt>,
}

impl TrackTags {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none() && self.cover.is_none()
    }

    /// "Artist - Title" when both are tagged, else whichever exists, else
    /// `fallback` (usually the file name).
    pub fn display_name(&self, fallback: &str) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.clone(),
            _ => fallback.to_owned(),
        }
    }

    /// Fill from `(key, value)` comment pairs, keys matched case-insensitively.
    /// The first occurrence of a key wins. For cover art a front cover wins
    /// over any other picture; unreadable pictures are skipped.
    pub fn from_comments<'a>(comments: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut tags = Self::default();
        let mut front_cover = false;
        for (key, value) in comments {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let key = key.to_ascii_uppercase();
            if key == "METADATA_BLOCK_PICTURE" {
                if front_cover {
                    continue;
                }
                match CoverArt::from_picture_block(value) {
                    Ok((kind, cover)) => {
                        if kind == FRONT_COVER || tags.cover.is_none() {
                            front_cover = kind == FRONT_COVER;
                            tags.cover = Some(cover);
                        }
                    }
                    Err(e) => debug!("skipping cover art: {e}"),
                }
                continue;
            }
            let slot = match key.as_str() {
                "TITLE" => &mut tags.title,
                "ARTIST" => &mut tags.artist,
                "ALBUM" => &mut tags.album,
                _ => continue,
            };
            slot.get_or_insert_with(|| value.to_owned());
        }
        tags
    }
}

/// Reads tags from a file on disk.
pub trait TagReader {
    fn read(&self, path: &Path) -> Result<TrackTags, Error>;
}

/// Read tags, treating any failure as "no tags". Loading never waits on this.
pub fn read_best_effort(reader: &impl TagReader, path: &Path) -> TrackTags {
    match reader.read(path) {
        Ok(tags) => tags,
        Err(e) => {
            debug!(path = %path.display(), "no tags: {e}");
            TrackTags::default()
        }
    }
}

/// Vorbis comments from an Ogg file.
#[cfg(feature = "vorbis_src")]
#[derive(Debug, Default, Clone, Copy)]
pub struct VorbisTagReader;

#[cfg(feature = "vorbis_src")]
impl TagReader for VorbisTagReader {
    fn read(&self, path: &Path) -> Result<TrackTags, Error> {
        let file = std::fs::File::open(path).map_err(|e| Error::Metadata(e.to_string()))?;
        let reader = lewton::inside_ogg::OggStreamReader::new(std::io::BufReader::new(file))
            .map_err(|e| Error::Metadata(e.to_string()))?;
        let comments = &reader.comment_hdr.comment_list;
        Ok(TrackTags::from_comments(
            comments.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }
}
