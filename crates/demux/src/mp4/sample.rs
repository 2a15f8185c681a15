//! Sample-index construction — maps the raw sample tables to a flat list
//! of samples with file byte offsets, sizes, microsecond timestamps, and
//! keyframe flags.
//!
//! The build walks chunks in order, consuming sizes from the global size
//! stream and ticks from an stts accumulator. Table mismatches trim the
//! index with a warning rather than failing: a truncated file still plays
//! up to the point the tables cover.

use mv_common::{DemuxWarning, Sample};
use std::cmp::Ordering;
use tracing::debug;

use crate::mp4::track::{RawSampleTable, SttsEntry};

/// Convert media ticks to microseconds, rounding half to even.
///
/// Kept in integer arithmetic end to end; the same helper is used for
/// timestamps and durations so both round identically.
pub(crate) fn ticks_to_micros(ticks: u64, time_scale: u32) -> i64 {
    if time_scale == 0 {
        return 0;
    }
    let num = ticks as u128 * 1_000_000;
    let den = time_scale as u128;
    let quotient = num / den;
    let remainder = num % den;

    let rounded = match (remainder * 2).cmp(&den) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => {
            if quotient % 2 == 0 {
                quotient
            } else {
                quotient + 1
            }
        }
    };
    rounded as i64
}

/// Decode-timestamp accumulator over stts runs.
///
/// Yields `(dts_ticks, delta_ticks)` per sample. When the table runs out
/// before the sample count does, the last delta keeps counting so
/// timestamps stay monotonic (the caller warns about the shortfall).
struct TickCursor<'t> {
    entries: &'t [SttsEntry],
    idx: usize,
    left_in_entry: u32,
    ticks: u64,
    last_delta: u32,
}

impl<'t> TickCursor<'t> {
    fn new(entries: &'t [SttsEntry]) -> Self {
        let mut cursor = Self {
            entries,
            idx: 0,
            left_in_entry: 0,
            ticks: 0,
            last_delta: 1,
        };
        cursor.settle();
        cursor
    }

    /// Position on the next entry with a non-zero sample count.
    fn settle(&mut self) {
        while self.left_in_entry == 0 && self.idx < self.entries.len() {
            self.left_in_entry = self.entries[self.idx].sample_count;
            if self.left_in_entry == 0 {
                self.idx += 1;
            }
        }
    }

    fn next(&mut self) -> (u64, u32) {
        let delta = if self.idx < self.entries.len() && self.left_in_entry > 0 {
            let delta = self.entries[self.idx].sample_delta;
            self.left_in_entry -= 1;
            if self.left_in_entry == 0 {
                self.idx += 1;
                self.settle();
            }
            self.last_delta = delta;
            delta
        } else {
            self.last_delta
        };

        let dts = self.ticks;
        self.ticks += delta as u64;
        (dts, delta)
    }
}

/// Samples-per-chunk for a 1-based chunk number. stsc runs apply from
/// `first_chunk` until the next entry's `first_chunk - 1`; `entry_idx`
/// is advanced monotonically by the caller.
fn samples_per_chunk(table: &RawSampleTable, entry_idx: &mut usize, chunk_num: u32) -> u32 {
    let runs = &table.sample_to_chunk;
    while *entry_idx + 1 < runs.len() && runs[*entry_idx + 1].first_chunk <= chunk_num {
        *entry_idx += 1;
    }
    match runs.get(*entry_idx) {
        Some(run) if run.first_chunk <= chunk_num => run.samples_per_chunk,
        _ => 1,
    }
}

/// Build the flat sample index for one track.
///
/// `mdat_end` is the absolute end offset of the mdat payload, used only
/// to warn about chunks that spill past it.
pub fn build_sample_index(
    stream_id: u32,
    time_scale: u32,
    table: &RawSampleTable,
    mdat_end: Option<u64>,
    warnings: &mut Vec<DemuxWarning>,
) -> Vec<Sample> {
    let sample_count = table.sizes.len();
    if sample_count == 0 {
        return Vec::new();
    }
    if table.chunk_offsets.is_empty() {
        warnings.push(DemuxWarning::InconsistentSampleCount {
            track: stream_id,
            kept: 0,
            reason: "no chunk offsets for a non-empty size table".into(),
        });
        return Vec::new();
    }

    // Sorted copy of the 1-based sync numbers for membership tests.
    let sync_samples = table.sync_samples.as_ref().map(|numbers| {
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        sorted
    });

    let stts_covered: u64 = table
        .time_to_sample
        .iter()
        .map(|e| e.sample_count as u64)
        .sum();

    let mut samples = Vec::with_capacity(sample_count);
    let mut ticks = TickCursor::new(&table.time_to_sample);
    let mut stsc_idx = 0usize;
    let mut sample_idx = 0usize;
    let mut stsc_overflow = false;

    'chunks: for (chunk_idx, &chunk_offset) in table.chunk_offsets.iter().enumerate() {
        let chunk_num = chunk_idx as u32 + 1;
        let in_chunk = samples_per_chunk(table, &mut stsc_idx, chunk_num);

        let mut offset = chunk_offset;
        for _ in 0..in_chunk {
            if sample_idx >= sample_count {
                stsc_overflow = true;
                break 'chunks;
            }

            let size = table.sizes[sample_idx];
            if size == 0 {
                warnings.push(DemuxWarning::ZeroSizeSample {
                    track: stream_id,
                    sample: sample_idx as u32 + 1,
                });
            }

            let (dts, delta) = ticks.next();
            let keyframe = match &sync_samples {
                // Absent stss: every sample is a sync sample.
                None => true,
                Some(set) => set.binary_search(&(sample_idx as u32 + 1)).is_ok(),
            };

            samples.push(Sample {
                stream_id,
                file_offset: offset,
                size,
                timestamp_us: ticks_to_micros(dts, time_scale),
                duration_us: ticks_to_micros(delta as u64, time_scale) as u32,
                keyframe,
            });

            offset += size as u64;
            sample_idx += 1;
        }

        if let Some(end) = mdat_end {
            if offset > end {
                warnings.push(DemuxWarning::ChunkBeyondMdat {
                    track: stream_id,
                    offset: chunk_offset,
                });
            }
        }
    }

    if stsc_overflow {
        warnings.push(DemuxWarning::InconsistentSampleCount {
            track: stream_id,
            kept: sample_count,
            reason: "sample-to-chunk runs imply more samples than the size table".into(),
        });
    }
    if sample_idx < sample_count {
        warnings.push(DemuxWarning::InconsistentSampleCount {
            track: stream_id,
            kept: sample_idx,
            reason: "chunk offsets cover fewer samples than the size table".into(),
        });
    }
    if (stts_covered as usize) < samples.len() {
        warnings.push(DemuxWarning::TruncatedTable {
            track: stream_id,
            fourcc: crate::mp4::boxes::STTS,
            kept: stts_covered as usize,
            expected: samples.len(),
        });
    }

    debug!(
        "track {}: {} samples indexed ({} warnings so far)",
        stream_id,
        samples.len(),
        warnings.len()
    );

    samples
}
