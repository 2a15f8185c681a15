//! Demuxer configuration.

use serde::{Deserialize, Serialize};

/// Options controlling which tracks are demuxed and whether per-phase
/// parse timings are collected.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct DemuxOptions {
    /// Demux video tracks.
    pub enable_video: bool,
    /// Demux audio tracks.
    pub enable_audio: bool,
    /// Collect wall-clock timings around the parse phases.
    pub debug: bool,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self {
            enable_video: true,
            enable_audio: true,
            debug: false,
        }
    }
}

impl DemuxOptions {
    /// Options that keep only video tracks.
    pub fn video_only() -> Self {
        Self {
            enable_audio: false,
            ..Self::default()
        }
    }

    /// Options that keep only audio tracks.
    pub fn audio_only() -> Self {
        Self {
            enable_video: false,
            ..Self::default()
        }
    }
}
