//! Track kinds and fourcc → canonical codec-string mapping.
//!
//! The canonical strings are what a platform decoder expects in its codec
//! configuration (e.g. WebCodecs-style `"avc1"`, `"mp4a.40.2"`). Unknown
//! fourccs are not an error — callers pass the raw code through and record
//! a warning.

use serde::{Deserialize, Serialize};

use crate::types::FourCC;

/// Media kind of a track.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Video sample-entry fourcc (lowercased) → canonical codec string.
const VIDEO_CODECS: &[(&str, &str)] = &[
    ("avc1", "avc1"),
    ("avc3", "avc1"),
    ("hev1", "hev1"),
    ("hvc1", "hvc1"),
    ("vp08", "vp8"),
    ("vp09", "vp9"),
    ("av01", "av01"),
    ("mp4v", "mp4v.20.9"),
    ("mjpa", "mjpeg"),
    ("mjpb", "mjpeg"),
    ("mjpg", "mjpeg"),
    // Apple ProRes family
    ("apch", "prores"),
    ("apcn", "prores"),
    ("apcs", "prores"),
    ("apco", "prores"),
    ("ap4h", "prores"),
];

/// Audio sample-entry fourcc (lowercased) → canonical codec string.
const AUDIO_CODECS: &[(&str, &str)] = &[
    ("mp4a", "mp4a.40.2"),
    ("opus", "opus"),
    ("mp3", "mp3"),
    (".mp3", "mp3"),
    ("flac", "flac"),
    ("vorb", "vorbis"),
    // QuickTime PCM variants
    ("lpcm", "pcm-s16"),
    ("sowt", "pcm-s16"),
    ("twos", "pcm-s16"),
    ("in24", "pcm-s24"),
    ("in32", "pcm-s32"),
    ("fl32", "pcm-f32"),
    ("fl64", "pcm-f64"),
];

/// Canonical codec string for a video sample-entry fourcc, if known.
pub fn canonical_video_codec(fourcc: FourCC) -> Option<&'static str> {
    let key = fourcc.lower_key();
    VIDEO_CODECS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

/// Canonical codec string for an audio sample-entry fourcc, if known.
pub fn canonical_audio_codec(fourcc: FourCC) -> Option<&'static str> {
    let key = fourcc.lower_key();
    AUDIO_CODECS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

/// Canonical codec string for a fourcc of the given kind, if known.
pub fn canonical_codec(kind: TrackKind, fourcc: FourCC) -> Option<&'static str> {
    match kind {
        TrackKind::Video => canonical_video_codec(fourcc),
        TrackKind::Audio => canonical_audio_codec(fourcc),
    }
}
