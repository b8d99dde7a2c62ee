//! Audio tracks, and the node's binary track encoding.

use base64::{engine::general_purpose::STANDARD, DecodeError as Base64Error, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
};

/// Flag set in the message header when a version byte follows it.
const TRACK_INFO_VERSIONED: u32 = 1;

/// Newest track blob version this decoder understands.
const MAX_TRACK_VERSION: u8 = 3;

/// Metadata describing a track, as resolved by a node.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    /// Source-specific identifier (e.g., a video ID).
    pub identifier: String,
    /// Whether the track can be seeked along.
    pub is_seekable: bool,
    /// Author, artist, or uploader of the track.
    pub author: String,
    /// Length of the track, in milliseconds.
    pub length: u64,
    /// Whether the track is a live stream of unknown length.
    pub is_stream: bool,
    /// Start position of the track, in milliseconds.
    #[serde(default)]
    pub position: u64,
    /// Title of the track.
    pub title: String,
    /// Canonical URL of the track, if it has one.
    #[serde(default)]
    pub uri: Option<String>,
    /// Name of the source manager which resolved the track.
    #[serde(default)]
    pub source_name: String,
    /// Artwork URL of the track, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    /// International Standard Recording Code of the track, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
}

/// A playable track.
///
/// A track is identified by its encoded form: the opaque string a node
/// hands out when loading tracks, and expects back in `play` commands.
/// Two tracks are equal exactly when their encoded forms are equal.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Track {
    #[serde(rename = "track", alias = "encoded")]
    encoded: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<TrackInfo>,
}

impl Track {
    /// Creates a track from an encoded string and its already-known metadata.
    pub fn new(encoded: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            encoded: encoded.into(),
            info: Some(info),
        }
    }

    /// Creates a track from its encoded form, decoding metadata where possible.
    ///
    /// Blobs produced by newer node versions may not be decodable; these
    /// tracks remain playable, but have no [`info`].
    ///
    /// [`info`]: Track::info()
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        let encoded = encoded.into();
        let info = decode_info(&encoded).ok();

        Self { encoded, info }
    }

    /// Creates a track from its encoded form, failing if its metadata
    /// cannot be decoded.
    pub fn decode(encoded: impl Into<String>) -> Result<Self, TrackDecodeError> {
        let encoded = encoded.into();
        let info = decode_info(&encoded)?;

        Ok(Self {
            encoded,
            info: Some(info),
        })
    }

    /// The opaque encoded form of this track.
    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Decoded metadata of this track, if available.
    #[must_use]
    pub fn info(&self) -> Option<&TrackInfo> {
        self.info.as_ref()
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

/// Serde adapter for fields holding a track in its bare encoded form.
pub(crate) mod encoded {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(track: &Track, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(track.encoded())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Track, D::Error> {
        String::deserialize(deserializer).map(Track::from_encoded)
    }
}

/// Errors encountered while decoding a track blob.
#[derive(Debug)]
#[non_exhaustive]
pub enum TrackDecodeError {
    /// The encoded string was not valid base64.
    Base64(Base64Error),
    /// The blob ended before all expected fields were read.
    UnexpectedEnd,
    /// The blob uses a track format newer than this decoder.
    UnsupportedVersion(u8),
}

impl Display for TrackDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "failed to decode track: ")?;
        match self {
            Self::Base64(e) => write!(f, "invalid base64 ({e})"),
            Self::UnexpectedEnd => write!(f, "blob ended early"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported version {v}"),
        }
    }
}

impl Error for TrackDecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Base64(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Base64Error> for TrackDecodeError {
    fn from(e: Base64Error) -> Self {
        Self::Base64(e)
    }
}

/// Reads the big-endian, `DataOutput`-style fields of a track blob.
struct DataInput<'a> {
    buf: &'a [u8],
}

impl<'a> DataInput<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TrackDecodeError> {
        if self.buf.len() < n {
            return Err(TrackDecodeError::UnexpectedEnd);
        }

        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;

        Ok(head)
    }

    fn read_u8(&mut self) -> Result<u8, TrackDecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_bool(&mut self) -> Result<bool, TrackDecodeError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u16(&mut self) -> Result<u16, TrackDecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, TrackDecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, TrackDecodeError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(bytes))
    }

    fn read_utf(&mut self) -> Result<String, TrackDecodeError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;

        Ok(match std::str::from_utf8(bytes) {
            Ok(s) => s.to_owned(),
            Err(_) => decode_modified_utf8(bytes),
        })
    }

    fn read_nullable_utf(&mut self) -> Result<Option<String>, TrackDecodeError> {
        if self.read_bool()? {
            self.read_utf().map(Some)
        } else {
            Ok(None)
        }
    }
}

fn decode_info(encoded: &str) -> Result<TrackInfo, TrackDecodeError> {
    let raw = STANDARD.decode(encoded)?;
    let mut input = DataInput { buf: &raw };

    let header = input.read_u32()?;
    let flags = header >> 30;
    let size = (header & 0x3FFF_FFFF) as usize;

    let mut body = DataInput {
        buf: input.take(size)?,
    };

    let version = if flags & TRACK_INFO_VERSIONED == 0 {
        1
    } else {
        body.read_u8()?
    };

    if version > MAX_TRACK_VERSION {
        return Err(TrackDecodeError::UnsupportedVersion(version));
    }

    let title = body.read_utf()?;
    let author = body.read_utf()?;
    let length = body.read_i64()?;
    let identifier = body.read_utf()?;
    let is_stream = body.read_bool()?;
    let uri = if version >= 2 {
        body.read_nullable_utf()?
    } else {
        None
    };
    let (artwork_url, isrc) = if version >= 3 {
        (body.read_nullable_utf()?, body.read_nullable_utf()?)
    } else {
        (None, None)
    };
    let source_name = body.read_utf()?;

    // Source-specific fields sit between the source name and the position,
    // which is always the final field of the message.
    if body.buf.len() < 8 {
        return Err(TrackDecodeError::UnexpectedEnd);
    }
    let mut tail = DataInput {
        buf: &body.buf[body.buf.len() - 8..],
    };
    let position = tail.read_i64()?;

    Ok(TrackInfo {
        identifier,
        is_seekable: !is_stream,
        author,
        length: u64::try_from(length).unwrap_or(0),
        is_stream,
        position: u64::try_from(position).unwrap_or(0),
        title,
        uri,
        source_name,
        artwork_url,
        isrc,
    })
}

/// Decodes Java's modified UTF-8, where NUL and supplementary characters
/// use non-standard encodings.
fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i] as u16;
        let (unit, width) = if b & 0x80 == 0 {
            (b, 1)
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            (((b & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F), 2)
        } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            (
                ((b & 0x0F) << 12)
                    | ((bytes[i + 1] as u16 & 0x3F) << 6)
                    | (bytes[i + 2] as u16 & 0x3F),
                3,
            )
        } else {
            (0xFFFD, 1)
        };

        units.push(unit);
        i += width;
    }

    String::from_utf16_lossy(&units)
}
