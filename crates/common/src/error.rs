//! Demuxer error and warning types (thiserror-based).
//!
//! Errors abort parsing; warnings record recoverable deviations (odd box
//! sizes, unknown codec fourccs, truncated tables) and are collected on
//! the demuxer for retrieval after `init`.

use thiserror::Error;

use crate::types::FourCC;

/// Fatal demuxing errors.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("not a usable ISO-BMFF stream: {0}")]
    InvalidFileFormat(String),

    #[error("corrupt data at offset {offset}: {reason}")]
    CorruptData { offset: u64, reason: String },

    #[error("box '{fourcc}' at offset {offset} has invalid size {size}")]
    InvalidBoxSize {
        fourcc: FourCC,
        offset: u64,
        size: u64,
    },

    #[error("required box '{0}' not found")]
    MissingRequiredBox(&'static str),

    #[error("invalid sample table for track {track}: {reason}")]
    InvalidSampleTable { track: u32, reason: String },

    #[error("unsupported codec '{0}'")]
    UnsupportedCodec(FourCC),

    #[error("seek failed: {0}")]
    SeekError(String),

    #[error("sample {index} not found (index has {count} samples)")]
    SampleNotFound { index: usize, count: usize },

    #[error("stream {id} not found")]
    StreamNotFound { id: u32 },
}

/// Convenience Result type for demuxer operations.
pub type DemuxResult<T> = Result<T, DemuxError>;

/// Non-fatal deviations encountered while parsing.
///
/// These never abort `init`; they are accumulated in file order and
/// retrievable via the demuxer's `warnings()` accessor. The `Error`
/// derive is only for the `Display` messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DemuxWarning {
    #[error("unknown codec fourcc '{0}', passed through unmapped")]
    UnknownCodec(FourCC),

    #[error("unknown box '{fourcc}' at offset {offset}, payload kept opaque")]
    UnknownBox { fourcc: FourCC, offset: u64 },

    #[error("child of '{parent}' at offset {offset} would cross the parent end, container truncated")]
    ChildExceedsParent { parent: FourCC, offset: u64 },

    #[error("malformed box '{fourcc}' at offset {offset}: {reason}")]
    MalformedBox {
        fourcc: FourCC,
        offset: u64,
        reason: String,
    },

    #[error("track {track}: truncated '{fourcc}' table, kept {kept} of {expected} entries")]
    TruncatedTable {
        track: u32,
        fourcc: FourCC,
        kept: usize,
        expected: usize,
    },

    #[error("track {track}: inconsistent sample count, trimmed to {kept} samples: {reason}")]
    InconsistentSampleCount {
        track: u32,
        kept: usize,
        reason: String,
    },

    #[error("track {track}: chunk at offset {offset} extends past the end of mdat")]
    ChunkBeyondMdat { track: u32, offset: u64 },

    #[error("track {track}: sample {sample} has zero size")]
    ZeroSizeSample { track: u32, sample: u32 },

    #[error("no mdat box found at top level")]
    MissingMdat,

    #[error("track {track} skipped: {reason}")]
    SkippedTrack { track: u32, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = DemuxError::MissingRequiredBox("moov");
        assert_eq!(err.to_string(), "required box 'moov' not found");

        let err = DemuxError::InvalidBoxSize {
            fourcc: FourCC::from_bytes(*b"trak"),
            offset: 64,
            size: 3,
        };
        assert!(err.to_string().contains("trak"));
        assert!(err.to_string().contains("64"));

        let err = DemuxError::UnsupportedCodec(FourCC::from_bytes(*b"ap4x"));
        assert!(err.to_string().contains("ap4x"));
    }

    #[test]
    fn warning_messages() {
        let warn = DemuxWarning::UnknownCodec(FourCC::from_bytes(*b"zzzz"));
        assert!(warn.to_string().contains("zzzz"));
    }
}
