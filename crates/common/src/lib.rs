//! `mv-common` — Shared types, codec tables, and errors for the MediaView
//! demux engine.
//!
//! This crate is the foundation the demuxer and its consumers depend on:
//!
//! - **Types**: `FourCC` (newtype for box and codec codes)
//! - **Codec**: `TrackKind` and fourcc → canonical codec-string tables
//! - **Streams**: `StreamContext`, `Sample`, `MovieInfo`, `MediaChunk`
//! - **Errors**: `DemuxError` plus the non-fatal `DemuxWarning` channel
//! - **Config**: `DemuxOptions`

pub mod codec;
pub mod config;
pub mod error;
pub mod stream;
pub mod types;

// Re-export commonly used items at crate root
pub use codec::{canonical_audio_codec, canonical_codec, canonical_video_codec, TrackKind};
pub use config::DemuxOptions;
pub use error::{DemuxError, DemuxResult, DemuxWarning};
pub use stream::{
    AudioAttrs, BitRateInfo, FileType, FrameRateInfo, MediaChunk, MovieHeader, MovieInfo, Sample,
    StreamContext, VideoAttrs,
};
pub use types::FourCC;
