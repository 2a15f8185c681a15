//! `mv-demux` — MP4/MOV (ISO BMFF) container demuxer over a resident
//! byte buffer.
//!
//! Parses the box hierarchy, builds a flat time-ordered sample index
//! from the sample tables, and exposes a pull cursor with keyframe-aware
//! seeking. Sample data is returned as zero-copy views into the input
//! buffer. No FFmpeg dependency — fully custom parser.

pub mod mp4;
pub mod perf;
pub mod probe;
pub mod reader;

pub use mp4::Mp4Demuxer;
pub use probe::looks_like_mp4;
