//! Stream descriptors, samples, and movie-level info — the demuxer's output
//! data model.

use serde::{Deserialize, Serialize};

use crate::codec::TrackKind;
use crate::types::FourCC;

/// Parsed ftyp (File Type) box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileType {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

/// Global timescale and duration from the mvhd box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieHeader {
    /// Ticks per second of the movie timeline.
    pub time_scale: u32,
    /// Movie duration in timescale ticks.
    pub duration: u64,
}

/// Video-specific stream attributes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAttrs {
    pub width: u32,
    pub height: u32,
    /// Constant frame rate, present only when every stts delta is equal.
    pub frame_rate: Option<f32>,
    /// Average frame rate over the whole track.
    pub avg_frame_rate: Option<f32>,
}

/// Audio-specific stream attributes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAttrs {
    pub sample_rate: f32,
    pub channels: u16,
    pub bit_depth: u16,
}

/// One demuxed track stream.
///
/// Exactly one of `video`/`audio` is populated, matching `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamContext {
    /// Track id: the trak box's index in file order.
    pub id: u32,
    pub kind: TrackKind,
    /// Raw sample-entry fourcc from stsd.
    pub codec_fourcc: FourCC,
    /// Canonical codec string for decoder configuration; the raw fourcc
    /// when the codec is unknown.
    pub codec_canonical: String,
    /// Ticks per second of this track's media timeline (from mdhd).
    pub time_scale: u32,
    /// Track duration in media timescale ticks (from mdhd).
    pub duration: u64,
    /// Codec-specific configuration bytes, verbatim from the stsd
    /// sample-entry residual (e.g. an avcC box for H.264).
    pub extra_data: Option<Vec<u8>>,
    pub video: Option<VideoAttrs>,
    pub audio: Option<AudioAttrs>,
    /// Nominal bit rate in bits per second (defaults to the average).
    pub bit_rate: Option<u32>,
    /// Average bit rate in bits per second over the whole track.
    pub avg_bit_rate: Option<u32>,
}

impl StreamContext {
    /// Video attributes; present iff `kind == Video`.
    pub fn video(&self) -> Option<&VideoAttrs> {
        self.video.as_ref()
    }

    /// Audio attributes; present iff `kind == Audio`.
    pub fn audio(&self) -> Option<&AudioAttrs> {
        self.audio.as_ref()
    }
}

/// One entry of the flat, time-ordered sample index.
///
/// This is pure metadata; the encoded bytes stay in the caller's buffer
/// and are resolved through the demuxer's `sample_data`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Id of the stream this sample belongs to.
    pub stream_id: u32,
    /// Absolute byte offset of the sample data in the buffer.
    pub file_offset: u64,
    /// Byte size of the sample data.
    pub size: u32,
    /// Decode timestamp in microseconds.
    pub timestamp_us: i64,
    /// Sample duration in microseconds.
    pub duration_us: u32,
    /// Whether this sample is a sync sample (keyframe).
    pub keyframe: bool,
}

/// Movie-level info returned by the demuxer's `info()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    /// Ticks per second of the movie timeline.
    pub time_scale: u32,
    /// Movie duration in timescale ticks.
    pub duration: u64,
    pub streams: Vec<StreamContext>,
    /// Total number of samples in the merged index.
    pub sample_count: usize,
    pub ftyp: Option<FileType>,
}

/// Per-stream frame-rate projection.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRateInfo {
    pub stream_id: u32,
    /// Present only for constant-rate streams.
    pub frame_rate: Option<f32>,
    pub avg_frame_rate: Option<f32>,
    /// True when every stts delta of the stream is equal.
    pub is_constant: bool,
}

/// Per-stream bit-rate projection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitRateInfo {
    pub stream_id: u32,
    pub bit_rate: u32,
    pub avg_bit_rate: u32,
}

/// One encoded chunk assembled for a platform decoder: sample timing and
/// flags plus the stream's codec configuration, with all byte fields
/// borrowed from the demuxer's buffer.
#[derive(Copy, Clone, Debug)]
pub struct MediaChunk<'a> {
    pub kind: TrackKind,
    pub codec: &'a str,
    pub extra_data: Option<&'a [u8]>,
    pub timestamp_us: i64,
    pub duration_us: u32,
    pub keyframe: bool,
    pub data: &'a [u8],
}
