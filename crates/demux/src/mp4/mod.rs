//! MP4/MOV (ISO BMFF) demuxer facade.
//!
//! Orchestrates the box-tree parse, per-track stream and sample-table
//! decoding, and the merged time-ordered sample index, and exposes the
//! pull cursor (`next_sample`/`sample_data`/`seek`) over it.
//!
//! Timing note: timestamps are decode timestamps from stts. Edit lists
//! (elst) and composition offsets are ignored, so the media timeline may
//! diverge from the presentation timeline for files that use them.

pub mod boxes;
pub mod sample;
pub mod track;

use std::collections::BTreeMap;
use std::time::Duration;

use mv_common::{
    BitRateInfo, DemuxError, DemuxOptions, DemuxResult, DemuxWarning, FileType, FrameRateInfo,
    MediaChunk, MovieHeader, MovieInfo, Sample, StreamContext, TrackKind,
};
use tracing::{debug, info, warn};

use crate::perf::PerfProbe;
use boxes::{parse_box_tree, Mp4Box, FTYP, MDAT, MOOV, MVHD, TRAK};
use sample::{build_sample_index, ticks_to_micros};
use track::{parse_ftyp, parse_mvhd, parse_trak, RawSampleTable, TrackInfo};

/// Demuxer lifecycle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Unparsed,
    Initialised,
    Closed,
}

/// MP4 demuxer over a resident byte buffer.
///
/// Generic over `B: AsRef<[u8]>`, so it borrows a caller-owned slice
/// (`&[u8]`, zero-copy) or owns the buffer itself (`Vec<u8>`). All
/// sample-data views alias the buffer; the merged sample index is owned
/// by the demuxer.
///
/// Lifecycle: `Unparsed → init() → Initialised → close() → Closed`.
/// Accessors require the initialised state. The demuxer is not
/// thread-safe (the cursor is mutable); it holds no locks and no global
/// state.
#[derive(Debug)]
pub struct Mp4Demuxer<B: AsRef<[u8]>> {
    data: B,
    options: DemuxOptions,
    state: State,
    ftyp: Option<FileType>,
    movie: MovieHeader,
    streams: Vec<StreamContext>,
    tables: BTreeMap<u32, RawSampleTable>,
    mdat_offset: u64,
    mdat_size: u64,
    /// Merged sample index, sorted by (timestamp, stream id).
    samples: Vec<Sample>,
    cursor: usize,
    warnings: Vec<DemuxWarning>,
    perf: PerfProbe,
}

impl<B: AsRef<[u8]>> Mp4Demuxer<B> {
    /// Create an unparsed demuxer; call `init()` before using it.
    pub fn new(data: B, options: DemuxOptions) -> Self {
        Self {
            data,
            options,
            state: State::Unparsed,
            ftyp: None,
            movie: MovieHeader {
                time_scale: 0,
                duration: 0,
            },
            streams: Vec::new(),
            tables: BTreeMap::new(),
            mdat_offset: 0,
            mdat_size: 0,
            samples: Vec::new(),
            cursor: 0,
            warnings: Vec::new(),
            perf: PerfProbe::new(false),
        }
    }

    /// Create and initialise in one step.
    pub fn open(data: B, options: DemuxOptions) -> DemuxResult<Self> {
        let mut demuxer = Self::new(data, options);
        demuxer.init()?;
        Ok(demuxer)
    }

    /// Parse the buffer and build the sample index.
    ///
    /// Idempotent once initialised; fails after `close()`.
    pub fn init(&mut self) -> DemuxResult<()> {
        match self.state {
            State::Initialised => return Ok(()),
            State::Closed => {
                return Err(DemuxError::InvalidFileFormat(
                    "demuxer has been closed".into(),
                ))
            }
            State::Unparsed => {}
        }

        let options = self.options;
        let mut perf = PerfProbe::new(options.debug);
        let mut warnings = Vec::new();
        let data = self.data.as_ref();

        // Top-level box parse; moov is the one hard requirement.
        let tree = perf.time("parse-box-tree", || parse_box_tree(data, &mut warnings))?;
        let Some(moov) = top_level(&tree, MOOV) else {
            return Err(DemuxError::MissingRequiredBox("moov"));
        };

        // ftyp is optional; a malformed one only warns.
        let ftyp = match top_level(&tree, FTYP) {
            Some(b) => match b.payload_reader(data) {
                Some(mut r) => match parse_ftyp(&mut r) {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        warn!("unparseable ftyp: {err}");
                        warnings.push(DemuxWarning::MalformedBox {
                            fourcc: FTYP,
                            offset: b.header.offset,
                            reason: err.to_string(),
                        });
                        None
                    }
                },
                None => None,
            },
            None => None,
        };

        let movie = {
            let mut reader = moov
                .child(MVHD)
                .and_then(|b| b.payload_reader(data))
                .ok_or(DemuxError::MissingRequiredBox("mvhd"))?;
            parse_mvhd(&mut reader)?
        };

        let mdat = top_level(&tree, MDAT);
        let (mdat_offset, mdat_size) = match mdat {
            Some(b) => (b.header.payload_offset(), b.header.payload_len()),
            None => {
                warnings.push(DemuxWarning::MissingMdat);
                (0, 0)
            }
        };
        let mdat_end = mdat.map(|b| b.header.payload_offset() + b.header.payload_len());

        // Tracks in file order; the index becomes the stream id.
        let mut tracks: Vec<TrackInfo> = Vec::new();
        let mut advertised = [0usize; 2]; // video, audio
        perf.time("parse-streams", || {
            for (idx, trak) in moov
                .children()
                .iter()
                .filter(|b| b.fourcc() == TRAK)
                .enumerate()
            {
                let parsed = parse_trak(data, trak, idx as u32, &mut warnings);
                match parsed.advertised {
                    Some(TrackKind::Video) => advertised[0] += 1,
                    Some(TrackKind::Audio) => advertised[1] += 1,
                    None => {}
                }
                if let Some(info) = parsed.info {
                    let keep = match info.stream.kind {
                        TrackKind::Video => options.enable_video,
                        TrackKind::Audio => options.enable_audio,
                    };
                    if keep {
                        tracks.push(info);
                    } else {
                        debug!(
                            "track {} ({}) disabled by options",
                            info.stream.id,
                            info.stream.kind.display_name()
                        );
                    }
                }
            }
        });

        // Per-track indices, stamped with the stream id.
        let mut samples: Vec<Sample> = Vec::new();
        let mut kind_counts = [0usize; 2];
        perf.time("build-index", || {
            for track in &tracks {
                let built = build_sample_index(
                    track.stream.id,
                    track.stream.time_scale,
                    &track.table,
                    mdat_end,
                    &mut warnings,
                );
                match track.stream.kind {
                    TrackKind::Video => kind_counts[0] += built.len(),
                    TrackKind::Audio => kind_counts[1] += built.len(),
                }
                samples.extend(built);
            }
        });

        // An enabled kind that moov advertises must yield samples.
        if options.enable_video && advertised[0] > 0 && kind_counts[0] == 0 {
            return Err(DemuxError::InvalidSampleTable {
                track: 0,
                reason: "moov advertises video but no video samples could be indexed".into(),
            });
        }
        if options.enable_audio && advertised[1] > 0 && kind_counts[1] == 0 {
            return Err(DemuxError::InvalidSampleTable {
                track: 0,
                reason: "moov advertises audio but no audio samples could be indexed".into(),
            });
        }

        // Merge to one timeline. The sort is stable, so equal
        // (timestamp, stream) pairs keep their original order.
        perf.time("merge-sort", || {
            samples.sort_by_key(|s| (s.timestamp_us, s.stream_id))
        });

        let mut streams = Vec::with_capacity(tracks.len());
        let mut tables = BTreeMap::new();
        for track in tracks {
            let mut stream = track.stream;
            if let Some(avg) = average_bit_rate(
                track.table.total_bytes(),
                stream.duration,
                stream.time_scale,
            ) {
                stream.avg_bit_rate = Some(avg);
                stream.bit_rate = Some(avg);
            }
            tables.insert(stream.id, track.table);
            streams.push(stream);
        }

        info!(
            "mp4: {} stream(s), {} samples, duration {:.2}s, {} warning(s)",
            streams.len(),
            samples.len(),
            if movie.time_scale > 0 {
                movie.duration as f64 / movie.time_scale as f64
            } else {
                0.0
            },
            warnings.len()
        );

        self.ftyp = ftyp;
        self.movie = movie;
        self.streams = streams;
        self.tables = tables;
        self.mdat_offset = mdat_offset;
        self.mdat_size = mdat_size;
        self.samples = samples;
        self.cursor = 0;
        self.warnings = warnings;
        self.perf = perf;
        self.state = State::Initialised;
        Ok(())
    }

    /// Release the sample index. Idempotent; the demuxer cannot be
    /// re-initialised afterwards.
    pub fn close(&mut self) {
        self.samples = Vec::new();
        self.tables.clear();
        self.streams.clear();
        self.cursor = 0;
        self.state = State::Closed;
    }

    /// Rewind the cursor to the first sample.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    fn ensure_initialised(&self) -> DemuxResult<()> {
        if self.state != State::Initialised {
            return Err(DemuxError::InvalidFileFormat(
                "demuxer not initialised".into(),
            ));
        }
        Ok(())
    }

    // ─── Cursor ─────────────────────────────────────────────────────

    /// Next sample in timestamp order, or `None` at the end (or when the
    /// demuxer is not initialised).
    pub fn next_sample(&mut self) -> Option<Sample> {
        if self.state != State::Initialised {
            return None;
        }
        let sample = self.samples.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(sample)
    }

    /// Borrow a sample's encoded bytes from the buffer (zero-copy).
    pub fn sample_data(&self, sample: &Sample) -> DemuxResult<&[u8]> {
        self.ensure_initialised()?;
        let data = self.data.as_ref();
        let end = sample
            .file_offset
            .checked_add(sample.size as u64)
            .filter(|&end| end <= data.len() as u64)
            .ok_or_else(|| DemuxError::CorruptData {
                offset: sample.file_offset,
                reason: format!(
                    "sample range {}+{} outside buffer of {} bytes",
                    sample.file_offset,
                    sample.size,
                    data.len()
                ),
            })?;
        Ok(&data[sample.file_offset as usize..end as usize])
    }

    /// Assemble the decoder-facing chunk for a sample: stream codec
    /// configuration plus the sample's timing, flags, and data.
    pub fn chunk(&self, sample: &Sample) -> DemuxResult<MediaChunk<'_>> {
        let stream = self.stream(sample.stream_id)?;
        let data = self.sample_data(sample)?;
        Ok(MediaChunk {
            kind: stream.kind,
            codec: &stream.codec_canonical,
            extra_data: stream.extra_data.as_deref(),
            timestamp_us: sample.timestamp_us,
            duration_us: sample.duration_us,
            keyframe: sample.keyframe,
            data,
        })
    }

    /// Move the cursor to the last keyframe at or before `target_us`.
    ///
    /// Falls back to the first sample when no keyframe precedes the
    /// target; out-of-range targets clamp. Seeking an empty index is a
    /// no-op.
    pub fn seek(&mut self, target_us: i64) -> DemuxResult<()> {
        if self.state != State::Initialised {
            return Err(DemuxError::SeekError("demuxer not initialised".into()));
        }
        if self.samples.is_empty() {
            return Ok(());
        }

        // Linear scan; the index is timestamp-sorted, so stop at the
        // first sample past the target.
        let mut best = None;
        for (i, s) in self.samples.iter().enumerate() {
            if s.timestamp_us > target_us {
                break;
            }
            if s.keyframe {
                best = Some(i);
            }
        }
        self.cursor = best.unwrap_or(0);
        debug!("seek to {}µs → sample {}", target_us, self.cursor);
        Ok(())
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Movie-level info: timescale, duration, streams, sample count.
    pub fn info(&self) -> DemuxResult<MovieInfo> {
        self.ensure_initialised()?;
        Ok(MovieInfo {
            time_scale: self.movie.time_scale,
            duration: self.movie.duration,
            streams: self.streams.clone(),
            sample_count: self.samples.len(),
            ftyp: self.ftyp.clone(),
        })
    }

    /// Demuxed streams, in track order.
    pub fn streams(&self) -> &[StreamContext] {
        &self.streams
    }

    /// Stream by id.
    pub fn stream(&self, id: u32) -> DemuxResult<&StreamContext> {
        self.ensure_initialised()?;
        self.streams
            .iter()
            .find(|s| s.id == id)
            .ok_or(DemuxError::StreamNotFound { id })
    }

    /// Random access into the merged sample index.
    pub fn sample_at(&self, index: usize) -> DemuxResult<Sample> {
        self.ensure_initialised()?;
        self.samples
            .get(index)
            .copied()
            .ok_or(DemuxError::SampleNotFound {
                index,
                count: self.samples.len(),
            })
    }

    /// Number of samples in the merged index.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Movie duration in microseconds.
    pub fn duration_micros(&self) -> i64 {
        ticks_to_micros(self.movie.duration, self.movie.time_scale)
    }

    /// Byte extent of the mdat payload: `(offset, size)`.
    pub fn mdat_extent(&self) -> (u64, u64) {
        (self.mdat_offset, self.mdat_size)
    }

    /// Raw (undecoded) sample tables of a kept track.
    pub fn raw_sample_table(&self, id: u32) -> Option<&RawSampleTable> {
        self.tables.get(&id)
    }

    /// Frame-rate projection for the video streams.
    pub fn frame_rate_info(&self) -> DemuxResult<Vec<FrameRateInfo>> {
        self.ensure_initialised()?;
        Ok(self
            .streams
            .iter()
            .filter_map(|s| {
                s.video().map(|v| FrameRateInfo {
                    stream_id: s.id,
                    frame_rate: v.frame_rate,
                    avg_frame_rate: v.avg_frame_rate,
                    is_constant: v.frame_rate.is_some(),
                })
            })
            .collect())
    }

    /// Bit-rate projection for all streams that have one.
    pub fn bit_rate_info(&self) -> DemuxResult<Vec<BitRateInfo>> {
        self.ensure_initialised()?;
        Ok(self
            .streams
            .iter()
            .filter_map(|s| {
                Some(BitRateInfo {
                    stream_id: s.id,
                    bit_rate: s.bit_rate?,
                    avg_bit_rate: s.avg_bit_rate?,
                })
            })
            .collect())
    }

    /// Non-fatal deviations collected during `init`, in file order.
    pub fn warnings(&self) -> &[DemuxWarning] {
        &self.warnings
    }

    /// Per-phase parse timings; empty unless `DemuxOptions::debug`.
    pub fn timings(&self) -> &[(&'static str, Duration)] {
        self.perf.phases()
    }
}

/// Top-level (non-recursive) box lookup.
fn top_level(tree: &[Mp4Box], fourcc: mv_common::FourCC) -> Option<&Mp4Box> {
    tree.iter().find(|b| b.fourcc() == fourcc)
}

/// Average bit rate: `round(total_bytes · 8 · time_scale / duration_ticks)`.
fn average_bit_rate(total_bytes: u64, duration_ticks: u64, time_scale: u32) -> Option<u32> {
    if total_bytes == 0 || duration_ticks == 0 || time_scale == 0 {
        return None;
    }
    let bits = total_bytes as u128 * 8 * time_scale as u128;
    let rounded = (bits + duration_ticks as u128 / 2) / duration_ticks as u128;
    Some(rounded.min(u32::MAX as u128) as u32)
}
