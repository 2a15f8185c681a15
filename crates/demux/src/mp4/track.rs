//! Per-track stream parsing: mdhd/hdlr/stsd decoding and raw
//! sample-table extraction.
//!
//! Each trak box is decoded independently into a `StreamContext` (codec,
//! dimensions, rates) plus a `RawSampleTable` (undecoded stsz/stco/stsc/
//! stts/stss contents) for the index builder. Sample-table sub-boxes
//! decode independently; a truncated or malformed table degrades to a
//! warning, never a parse abort.

use mv_common::{
    canonical_codec, AudioAttrs, DemuxResult, DemuxWarning, FourCC, MovieHeader, StreamContext,
    TrackKind, VideoAttrs,
};
use tracing::{debug, warn};

use crate::mp4::boxes::{
    Mp4Box, CO64, HDLR, MDHD, MDIA, MINF, SOUN, STBL, STCO, STSC, STSD, STSS, STSZ, STTS, STZ2,
    VIDE,
};
use crate::reader::ByteReader;

// ─── Raw sample tables ──────────────────────────────────────────────

/// One stts (Decoding Time to Sample) run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// One stsc (Sample to Chunk) run. `first_chunk` is 1-based and applies
/// until the next entry's `first_chunk - 1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Undecoded sample-table contents for one track.
#[derive(Clone, Debug, Default)]
pub struct RawSampleTable {
    /// Per-sample byte sizes, already expanded from stsz/stz2.
    pub sizes: Vec<u32>,
    /// Absolute chunk byte offsets from stco/co64.
    pub chunk_offsets: Vec<u64>,
    pub sample_to_chunk: Vec<StscEntry>,
    pub time_to_sample: Vec<SttsEntry>,
    /// 1-based sync-sample numbers. `None` means stss was absent and
    /// every sample is a keyframe.
    pub sync_samples: Option<Vec<u32>>,
}

impl RawSampleTable {
    /// Total encoded byte count of the track.
    pub fn total_bytes(&self) -> u64 {
        self.sizes.iter().map(|&s| s as u64).sum()
    }
}

// ─── Header boxes ───────────────────────────────────────────────────

/// Parse an mvhd payload: global timescale and duration (v0/v1).
pub fn parse_mvhd(reader: &mut ByteReader<'_>) -> DemuxResult<MovieHeader> {
    let version = reader.read_u8()?;
    reader.skip(3)?; // flags

    let (time_scale, duration) = if version == 1 {
        reader.skip(16)?; // creation + modification time (64-bit)
        (reader.read_u32()?, reader.read_u64()?)
    } else {
        reader.skip(8)?;
        (reader.read_u32()?, reader.read_u32()? as u64)
    };

    debug!("mvhd: time_scale={}, duration={}", time_scale, duration);
    Ok(MovieHeader {
        time_scale,
        duration,
    })
}

/// Parse an mdhd payload: per-track timescale and duration (v0/v1).
/// The layout matches mvhd up to the duration field.
pub fn parse_mdhd(reader: &mut ByteReader<'_>) -> DemuxResult<(u32, u64)> {
    let header = parse_mvhd(reader)?;
    Ok((header.time_scale, header.duration))
}

/// Parse an hdlr payload and return the component subtype.
pub fn parse_hdlr(reader: &mut ByteReader<'_>) -> DemuxResult<FourCC> {
    reader.skip(4)?; // version + flags
    reader.skip(4)?; // pre_defined
    reader.read_fourcc()
}

/// Parse an ftyp payload.
pub fn parse_ftyp(reader: &mut ByteReader<'_>) -> DemuxResult<mv_common::FileType> {
    let major_brand = reader.read_fourcc()?;
    let minor_version = reader.read_u32()?;
    let mut compatible_brands = Vec::with_capacity(reader.remaining() / 4);
    while reader.remaining() >= 4 {
        compatible_brands.push(reader.read_fourcc()?);
    }
    debug!(
        "ftyp: major_brand='{}', minor_version={}, {} compatible brands",
        major_brand,
        minor_version,
        compatible_brands.len()
    );
    Ok(mv_common::FileType {
        major_brand,
        minor_version,
        compatible_brands,
    })
}

// ─── stsd sample entries ────────────────────────────────────────────

/// First sample description of an stsd box, decoded per track kind.
#[derive(Clone, Debug)]
pub enum SampleEntry {
    Video(VideoSampleEntry),
    Audio(AudioSampleEntry),
}

/// Video sample description (QuickTime/ISO layout).
#[derive(Clone, Debug)]
pub struct VideoSampleEntry {
    pub codec_fourcc: FourCC,
    pub width: u16,
    pub height: u16,
    /// Pascal-string compressor name (may be empty).
    pub compressor: String,
    pub depth: u16,
    /// Extension bytes after the fixed fields, verbatim (avcC, hvcC,
    /// colr, ... — whatever the file carries).
    pub extra_data: Vec<u8>,
}

/// Audio sample description (QuickTime/ISO layout).
#[derive(Clone, Debug)]
pub struct AudioSampleEntry {
    pub codec_fourcc: FourCC,
    pub channels: u16,
    pub bit_depth: u16,
    pub compression_id: i16,
    pub packet_size: u16,
    pub sample_rate: f64,
    /// Extension bytes after the fixed fields, verbatim (esds, dOps, ...).
    pub extra_data: Vec<u8>,
}

/// Parse an stsd payload and return the first sample entry, decoded
/// according to the track kind from hdlr.
pub fn parse_stsd(
    reader: &mut ByteReader<'_>,
    kind: TrackKind,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Option<SampleEntry>> {
    reader.skip(4)?; // version + flags
    let entry_count = reader.read_u32()?;
    if entry_count == 0 {
        return Ok(None);
    }

    let entry_offset = reader.abs_pos();
    let entry_size = reader.read_u32()? as usize;
    let codec_fourcc = reader.read_fourcc()?;

    if entry_size < 16 {
        warnings.push(DemuxWarning::MalformedBox {
            fourcc: STSD,
            offset: entry_offset,
            reason: format!("sample entry size {entry_size} too small"),
        });
        return Ok(None);
    }

    // Scope parsing to the entry; a short stsd clamps with a warning.
    let mut body_len = entry_size - 8;
    if body_len > reader.remaining() {
        warnings.push(DemuxWarning::TruncatedTable {
            track,
            fourcc: STSD,
            kept: reader.remaining(),
            expected: body_len,
        });
        body_len = reader.remaining();
    }
    let mut entry = reader.sub_reader(body_len)?;

    entry.skip(6)?; // reserved
    let _data_reference_index = entry.read_u16()?;

    match kind {
        TrackKind::Video => {
            entry.skip(16)?; // pre_defined(2) reserved(2) pre_defined(12)
            let width = entry.read_u16()?;
            let height = entry.read_u16()?;
            entry.skip(14)?; // resolutions(8) reserved(4) frame_count(2)

            // 32-byte Pascal-length compressor name.
            let name_len = entry.read_u8()?.min(31) as usize;
            let name_bytes = entry.read_bytes(31)?;
            let compressor = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

            let depth = entry.read_u16()?;
            entry.skip(2)?; // pre_defined / color_table_id
            let extra_data = entry.read_bytes(entry.remaining())?.to_vec();

            debug!(
                "stsd: video '{}' {}x{} depth={} extra={}B",
                codec_fourcc,
                width,
                height,
                depth,
                extra_data.len()
            );

            Ok(Some(SampleEntry::Video(VideoSampleEntry {
                codec_fourcc,
                width,
                height,
                compressor,
                depth,
                extra_data,
            })))
        }
        TrackKind::Audio => {
            entry.skip(8)?; // version(2) revision(2) vendor(4)
            let channels = entry.read_u16()?;
            let bit_depth = entry.read_u16()?;
            let compression_id = entry.read_i16()?;
            let packet_size = entry.read_u16()?;
            let sample_rate = entry.read_fixed_16_16()?;
            let extra_data = entry.read_bytes(entry.remaining())?.to_vec();

            debug!(
                "stsd: audio '{}' channels={} bit_depth={} rate={} extra={}B",
                codec_fourcc,
                channels,
                bit_depth,
                sample_rate,
                extra_data.len()
            );

            Ok(Some(SampleEntry::Audio(AudioSampleEntry {
                codec_fourcc,
                channels,
                bit_depth,
                compression_id,
                packet_size,
                sample_rate,
                extra_data,
            })))
        }
    }
}

// ─── Sample table boxes (stbl children) ─────────────────────────────

/// Parse stsz: per-sample sizes, expanding a uniform size into `count`
/// copies. Short tables are trimmed with a warning.
pub fn parse_stsz(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<u32>> {
    reader.skip(4)?; // version + flags
    let uniform_size = reader.read_u32()?;
    let count = reader.read_u32()? as usize;

    if uniform_size != 0 {
        debug!("stsz: {} samples, uniform size {}", count, uniform_size);
        return Ok(vec![uniform_size; count]);
    }

    let mut sizes = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        if reader.remaining() < 4 {
            warnings.push(DemuxWarning::TruncatedTable {
                track,
                fourcc: STSZ,
                kept: sizes.len(),
                expected: count,
            });
            break;
        }
        sizes.push(reader.read_u32()?);
    }

    debug!("stsz: {} sample sizes", sizes.len());
    Ok(sizes)
}

/// Parse stz2 (compact sample sizes, field sizes 4/8/16).
pub fn parse_stz2(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<u32>> {
    reader.skip(4)?; // version + flags
    reader.skip(3)?; // reserved
    let field_size = reader.read_u8()?;
    let count = reader.read_u32()? as usize;

    let mut sizes = Vec::with_capacity(count.min(reader.remaining() * 2));
    match field_size {
        4 => {
            // Two samples per byte, high nibble first.
            let mut byte = 0u8;
            for i in 0..count {
                if i % 2 == 0 {
                    if reader.is_empty() {
                        break;
                    }
                    byte = reader.read_u8()?;
                    sizes.push((byte >> 4) as u32);
                } else {
                    sizes.push((byte & 0x0F) as u32);
                }
            }
        }
        8 => {
            for _ in 0..count {
                if reader.is_empty() {
                    break;
                }
                sizes.push(reader.read_u8()? as u32);
            }
        }
        16 => {
            for _ in 0..count {
                if reader.remaining() < 2 {
                    break;
                }
                sizes.push(reader.read_u16()? as u32);
            }
        }
        other => {
            warnings.push(DemuxWarning::MalformedBox {
                fourcc: STZ2,
                offset: reader.abs_pos(),
                reason: format!("invalid field size {other}"),
            });
            return Ok(Vec::new());
        }
    }

    if sizes.len() < count {
        warnings.push(DemuxWarning::TruncatedTable {
            track,
            fourcc: STZ2,
            kept: sizes.len(),
            expected: count,
        });
    }

    debug!("stz2: {} sample sizes (field size {})", sizes.len(), field_size);
    Ok(sizes)
}

/// Parse stco (32-bit chunk offsets).
pub fn parse_stco(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<u64>> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;

    let mut offsets = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        if reader.remaining() < 4 {
            warnings.push(DemuxWarning::TruncatedTable {
                track,
                fourcc: STCO,
                kept: offsets.len(),
                expected: count,
            });
            break;
        }
        offsets.push(reader.read_u32()? as u64);
    }

    debug!("stco: {} chunk offsets", offsets.len());
    Ok(offsets)
}

/// Parse co64 (64-bit chunk offsets).
pub fn parse_co64(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<u64>> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;

    let mut offsets = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        if reader.remaining() < 8 {
            warnings.push(DemuxWarning::TruncatedTable {
                track,
                fourcc: CO64,
                kept: offsets.len(),
                expected: count,
            });
            break;
        }
        offsets.push(reader.read_u64()?);
    }

    debug!("co64: {} chunk offsets", offsets.len());
    Ok(offsets)
}

/// Parse stsc (sample-to-chunk runs).
pub fn parse_stsc(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<StscEntry>> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;

    let mut entries = Vec::with_capacity(count.min(reader.remaining() / 12));
    for _ in 0..count {
        if reader.remaining() < 12 {
            warnings.push(DemuxWarning::TruncatedTable {
                track,
                fourcc: STSC,
                kept: entries.len(),
                expected: count,
            });
            break;
        }
        entries.push(StscEntry {
            first_chunk: reader.read_u32()?,
            samples_per_chunk: reader.read_u32()?,
            sample_description_index: reader.read_u32()?,
        });
    }

    debug!("stsc: {} entries", entries.len());
    Ok(entries)
}

/// Parse stts (time-to-sample runs, deltas in media ticks).
pub fn parse_stts(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<SttsEntry>> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;

    let mut entries = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        if reader.remaining() < 8 {
            warnings.push(DemuxWarning::TruncatedTable {
                track,
                fourcc: STTS,
                kept: entries.len(),
                expected: count,
            });
            break;
        }
        entries.push(SttsEntry {
            sample_count: reader.read_u32()?,
            sample_delta: reader.read_u32()?,
        });
    }

    debug!("stts: {} entries", entries.len());
    Ok(entries)
}

/// Parse stss (sync-sample numbers, 1-based, kept 1-based).
pub fn parse_stss(
    reader: &mut ByteReader<'_>,
    track: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<u32>> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;

    let mut sync = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        if reader.remaining() < 4 {
            warnings.push(DemuxWarning::TruncatedTable {
                track,
                fourcc: STSS,
                kept: sync.len(),
                expected: count,
            });
            break;
        }
        sync.push(reader.read_u32()?);
    }

    debug!("stss: {} sync samples", sync.len());
    Ok(sync)
}

// ─── Frame-rate derivation ──────────────────────────────────────────

fn round3(x: f64) -> f32 {
    ((x * 1000.0).round() / 1000.0) as f32
}

/// Derive `(frame_rate, avg_frame_rate, is_constant)` from stts.
///
/// The rate is constant iff every delta is equal; the constant rate is
/// `time_scale / delta` and the average is
/// `total_samples * time_scale / total_ticks`, both rounded to 3
/// decimals. Degenerate tables yield no rates.
pub fn derive_frame_rates(
    time_scale: u32,
    stts: &[SttsEntry],
) -> (Option<f32>, Option<f32>, bool) {
    if time_scale == 0 || stts.is_empty() {
        return (None, None, false);
    }

    let total_samples: u64 = stts.iter().map(|e| e.sample_count as u64).sum();
    let total_ticks: u64 = stts
        .iter()
        .map(|e| e.sample_count as u64 * e.sample_delta as u64)
        .sum();
    if total_samples == 0 || total_ticks == 0 {
        return (None, None, false);
    }

    let first_delta = stts[0].sample_delta;
    let is_constant = first_delta > 0 && stts.iter().all(|e| e.sample_delta == first_delta);

    let frame_rate = if is_constant {
        Some(round3(time_scale as f64 / first_delta as f64))
    } else {
        None
    };
    let avg_frame_rate = Some(round3(
        total_samples as f64 * time_scale as f64 / total_ticks as f64,
    ));

    (frame_rate, avg_frame_rate, is_constant)
}

// ─── trak orchestration ─────────────────────────────────────────────

/// Everything extracted from one trak box.
#[derive(Clone, Debug)]
pub struct TrackInfo {
    /// Stream descriptor; bit rates are filled in by the facade once the
    /// sample index exists.
    pub stream: StreamContext,
    pub table: RawSampleTable,
}

/// Result of examining one trak: the kind its hdlr advertised (if
/// recognised) and the decoded track, when usable.
#[derive(Clone, Debug, Default)]
pub struct TrakParse {
    pub advertised: Option<TrackKind>,
    pub info: Option<TrackInfo>,
}

/// Decode one trak box. `id` is the trak's index in file order and
/// becomes the stream id. Unusable tracks are skipped with a warning.
pub fn parse_trak(
    data: &[u8],
    trak: &Mp4Box,
    id: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> TrakParse {
    fn skip(id: u32, warnings: &mut Vec<DemuxWarning>, reason: &str) {
        warn!("track {id} skipped: {reason}");
        warnings.push(DemuxWarning::SkippedTrack {
            track: id,
            reason: reason.to_string(),
        });
    }

    let Some(mdia) = trak.child(MDIA) else {
        skip(id, warnings, "no mdia box");
        return TrakParse::default();
    };

    // hdlr decides the kind; anything but vide/soun is not ours.
    let kind = match mdia.child(HDLR).and_then(|b| b.payload_reader(data)) {
        Some(mut r) => match parse_hdlr(&mut r) {
            Ok(subtype) if subtype == VIDE => TrackKind::Video,
            Ok(subtype) if subtype == SOUN => TrackKind::Audio,
            Ok(subtype) => {
                debug!("track {id}: handler '{subtype}' is not a media track, skipped");
                return TrakParse::default();
            }
            Err(err) => {
                skip(id, warnings, &format!("unparseable hdlr: {err}"));
                return TrakParse::default();
            }
        },
        None => {
            skip(id, warnings, "no hdlr box");
            return TrakParse::default();
        }
    };
    let advertised = Some(kind);

    let (time_scale, duration) = match mdia.child(MDHD).and_then(|b| b.payload_reader(data)) {
        Some(mut r) => match parse_mdhd(&mut r) {
            Ok(pair) => pair,
            Err(err) => {
                skip(id, warnings, &format!("unparseable mdhd: {err}"));
                return TrakParse {
                    advertised,
                    info: None,
                };
            }
        },
        None => {
            skip(id, warnings, "no mdhd box");
            return TrakParse {
                advertised,
                info: None,
            };
        }
    };

    let Some(stbl) = mdia.descend(&[MINF, STBL]) else {
        skip(id, warnings, "no stbl box");
        return TrakParse {
            advertised,
            info: None,
        };
    };

    let entry = match stbl.child(STSD).and_then(|b| b.payload_reader(data)) {
        Some(mut r) => parse_stsd(&mut r, kind, id, warnings).unwrap_or_default(),
        None => None,
    };
    let Some(entry) = entry else {
        skip(id, warnings, "no usable sample description");
        return TrakParse {
            advertised,
            info: None,
        };
    };

    let table = parse_sample_tables(data, stbl, id, warnings);

    let (codec_fourcc, extra_data, video, audio) = match entry {
        SampleEntry::Video(v) => {
            let (frame_rate, avg_frame_rate, _) =
                derive_frame_rates(time_scale, &table.time_to_sample);
            (
                v.codec_fourcc,
                v.extra_data,
                Some(VideoAttrs {
                    width: v.width as u32,
                    height: v.height as u32,
                    frame_rate,
                    avg_frame_rate,
                }),
                None,
            )
        }
        SampleEntry::Audio(a) => (
            a.codec_fourcc,
            a.extra_data,
            None,
            Some(AudioAttrs {
                sample_rate: a.sample_rate as f32,
                channels: a.channels,
                bit_depth: a.bit_depth,
            }),
        ),
    };

    let codec_canonical = match canonical_codec(kind, codec_fourcc) {
        Some(canonical) => canonical.to_string(),
        None => {
            warn!("track {id}: unknown codec fourcc '{codec_fourcc}'");
            warnings.push(DemuxWarning::UnknownCodec(codec_fourcc));
            codec_fourcc.to_string()
        }
    };

    let stream = StreamContext {
        id,
        kind,
        codec_fourcc,
        codec_canonical,
        time_scale,
        duration,
        extra_data: if extra_data.is_empty() {
            None
        } else {
            Some(extra_data)
        },
        video,
        audio,
        bit_rate: None,
        avg_bit_rate: None,
    };

    TrakParse {
        advertised,
        info: Some(TrackInfo { stream, table }),
    }
}

/// Decode the sample-table boxes of an stbl container. Each sub-box
/// decodes independently; failures degrade to warnings and an empty
/// table of that kind.
fn parse_sample_tables(
    data: &[u8],
    stbl: &Mp4Box,
    id: u32,
    warnings: &mut Vec<DemuxWarning>,
) -> RawSampleTable {
    fn run<T: Default>(
        stbl: &Mp4Box,
        data: &[u8],
        fourcc: FourCC,
        warnings: &mut Vec<DemuxWarning>,
        parse: impl FnOnce(&mut ByteReader<'_>, &mut Vec<DemuxWarning>) -> DemuxResult<T>,
    ) -> Option<T> {
        let b = stbl.child(fourcc)?;
        let mut reader = b.payload_reader(data)?;
        match parse(&mut reader, warnings) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("'{fourcc}' unparseable: {err}");
                warnings.push(DemuxWarning::MalformedBox {
                    fourcc,
                    offset: b.header.offset,
                    reason: err.to_string(),
                });
                Some(T::default())
            }
        }
    }

    let sizes = run(stbl, data, STSZ, warnings, |r, w| parse_stsz(r, id, w))
        .or_else(|| run(stbl, data, STZ2, warnings, |r, w| parse_stz2(r, id, w)))
        .unwrap_or_default();

    let chunk_offsets = run(stbl, data, STCO, warnings, |r, w| parse_stco(r, id, w))
        .or_else(|| run(stbl, data, CO64, warnings, |r, w| parse_co64(r, id, w)))
        .unwrap_or_default();

    let sample_to_chunk =
        run(stbl, data, STSC, warnings, |r, w| parse_stsc(r, id, w)).unwrap_or_default();
    let time_to_sample =
        run(stbl, data, STTS, warnings, |r, w| parse_stts(r, id, w)).unwrap_or_default();
    let sync_samples = run(stbl, data, STSS, warnings, |r, w| parse_stss(r, id, w));

    RawSampleTable {
        sizes,
        chunk_offsets,
        sample_to_chunk,
        time_to_sample,
        sync_samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be_reader(data: &[u8]) -> ByteReader<'_> {
        ByteReader::new(data)
    }

    #[test]
    fn mvhd_v0() {
        let mut payload = vec![0u8; 4]; // version 0 + flags
        payload.extend_from_slice(&0u32.to_be_bytes()); // creation
        payload.extend_from_slice(&0u32.to_be_bytes()); // modification
        payload.extend_from_slice(&600u32.to_be_bytes()); // timescale
        payload.extend_from_slice(&1200u32.to_be_bytes()); // duration

        let header = parse_mvhd(&mut be_reader(&payload)).unwrap();
        assert_eq!(header.time_scale, 600);
        assert_eq!(header.duration, 1200);
    }

    #[test]
    fn mvhd_v1() {
        let mut payload = vec![1, 0, 0, 0]; // version 1 + flags
        payload.extend_from_slice(&0u64.to_be_bytes());
        payload.extend_from_slice(&0u64.to_be_bytes());
        payload.extend_from_slice(&90000u32.to_be_bytes());
        payload.extend_from_slice(&(u32::MAX as u64 + 10).to_be_bytes());

        let header = parse_mvhd(&mut be_reader(&payload)).unwrap();
        assert_eq!(header.time_scale, 90000);
        assert_eq!(header.duration, u32::MAX as u64 + 10);
    }

    #[test]
    fn hdlr_subtype() {
        let mut payload = vec![0u8; 4]; // version + flags
        payload.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
        payload.extend_from_slice(b"vide");
        payload.extend_from_slice(&[0u8; 12]); // reserved

        assert_eq!(parse_hdlr(&mut be_reader(&payload)).unwrap(), VIDE);
    }

    #[test]
    fn ftyp_brands() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"isom");
        payload.extend_from_slice(&512u32.to_be_bytes());
        payload.extend_from_slice(b"isom");
        payload.extend_from_slice(b"iso2");

        let ftyp = parse_ftyp(&mut be_reader(&payload)).unwrap();
        assert_eq!(ftyp.major_brand, FourCC::from_bytes(*b"isom"));
        assert_eq!(ftyp.minor_version, 512);
        assert_eq!(ftyp.compatible_brands.len(), 2);
    }

    fn video_stsd_payload(fourcc: &[u8; 4], width: u16, height: u16, extra: &[u8]) -> Vec<u8> {
        let mut entry = Vec::new();
        entry.extend_from_slice(&[0u8; 6]); // reserved
        entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
        entry.extend_from_slice(&[0u8; 16]); // pre_defined + reserved
        entry.extend_from_slice(&width.to_be_bytes());
        entry.extend_from_slice(&height.to_be_bytes());
        entry.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // horizresolution 72dpi
        entry.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // vertresolution
        entry.extend_from_slice(&[0u8; 4]); // reserved
        entry.extend_from_slice(&1u16.to_be_bytes()); // frame_count
        let mut name = [0u8; 32];
        name[0] = 4;
        name[1..5].copy_from_slice(b"test");
        entry.extend_from_slice(&name);
        entry.extend_from_slice(&24u16.to_be_bytes()); // depth
        entry.extend_from_slice(&0xFFFFu16.to_be_bytes()); // color_table_id
        entry.extend_from_slice(extra);

        let mut payload = vec![0u8; 4]; // version + flags
        payload.extend_from_slice(&1u32.to_be_bytes()); // entry_count
        payload.extend_from_slice(&((entry.len() + 8) as u32).to_be_bytes());
        payload.extend_from_slice(fourcc);
        payload.extend_from_slice(&entry);
        payload
    }

    #[test]
    fn stsd_video_entry() {
        let extra = [0x61u8, 0x76, 0x63, 0x43, 1, 2, 3]; // fake avcC bytes
        let payload = video_stsd_payload(b"avc1", 320, 240, &extra);
        let mut warnings = Vec::new();

        let entry = parse_stsd(&mut be_reader(&payload), TrackKind::Video, 0, &mut warnings)
            .unwrap()
            .unwrap();
        let SampleEntry::Video(v) = entry else {
            panic!("expected video entry");
        };

        assert_eq!(v.codec_fourcc, FourCC::from_bytes(*b"avc1"));
        assert_eq!(v.width, 320);
        assert_eq!(v.height, 240);
        assert_eq!(v.compressor, "test");
        assert_eq!(v.depth, 24);
        assert_eq!(v.extra_data, extra);
        assert!(warnings.is_empty());
    }

    #[test]
    fn stsd_audio_entry() {
        let mut entry = Vec::new();
        entry.extend_from_slice(&[0u8; 6]); // reserved
        entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
        entry.extend_from_slice(&[0u8; 8]); // version + revision + vendor
        entry.extend_from_slice(&2u16.to_be_bytes()); // channels
        entry.extend_from_slice(&16u16.to_be_bytes()); // bit_depth
        entry.extend_from_slice(&0i16.to_be_bytes()); // compression_id
        entry.extend_from_slice(&0u16.to_be_bytes()); // packet_size
        entry.extend_from_slice(&(44100u32 << 16).to_be_bytes()); // sample_rate 16.16
        entry.extend_from_slice(&[9, 9]); // fake esds residue

        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&((entry.len() + 8) as u32).to_be_bytes());
        payload.extend_from_slice(b"mp4a");
        payload.extend_from_slice(&entry);

        let mut warnings = Vec::new();
        let parsed = parse_stsd(&mut be_reader(&payload), TrackKind::Audio, 0, &mut warnings)
            .unwrap()
            .unwrap();
        let SampleEntry::Audio(a) = parsed else {
            panic!("expected audio entry");
        };

        assert_eq!(a.codec_fourcc, FourCC::from_bytes(*b"mp4a"));
        assert_eq!(a.channels, 2);
        assert_eq!(a.bit_depth, 16);
        assert!((a.sample_rate - 44100.0).abs() < 1e-9);
        assert_eq!(a.extra_data, vec![9, 9]);
    }

    fn table_payload(entries: &[[u32; 2]]) -> Vec<u8> {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for e in entries {
            payload.extend_from_slice(&e[0].to_be_bytes());
            payload.extend_from_slice(&e[1].to_be_bytes());
        }
        payload
    }

    #[test]
    fn stts_entries() {
        let payload = table_payload(&[[100, 512], [50, 1024]]);
        let mut warnings = Vec::new();
        let entries = parse_stts(&mut be_reader(&payload), 0, &mut warnings).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sample_count, 100);
        assert_eq!(entries[0].sample_delta, 512);
        assert_eq!(entries[1].sample_delta, 1024);
        assert!(warnings.is_empty());
    }

    #[test]
    fn stts_truncated_warns() {
        let mut payload = table_payload(&[[100, 512]]);
        // Claim 3 entries but carry only 1.
        payload[4..8].copy_from_slice(&3u32.to_be_bytes());

        let mut warnings = Vec::new();
        let entries = parse_stts(&mut be_reader(&payload), 7, &mut warnings).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            warnings[0],
            DemuxWarning::TruncatedTable {
                track: 7,
                kept: 1,
                expected: 3,
                ..
            }
        ));
    }

    #[test]
    fn stsz_uniform_expands() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&512u32.to_be_bytes()); // uniform size
        payload.extend_from_slice(&4u32.to_be_bytes()); // count

        let mut warnings = Vec::new();
        let sizes = parse_stsz(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(sizes, vec![512; 4]);
    }

    #[test]
    fn stsz_individual() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&3u32.to_be_bytes());
        for size in [100u32, 200, 150] {
            payload.extend_from_slice(&size.to_be_bytes());
        }

        let mut warnings = Vec::new();
        let sizes = parse_stsz(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(sizes, vec![100, 200, 150]);
    }

    #[test]
    fn stz2_nibble_sizes() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&[0, 0, 0]); // reserved
        payload.push(4); // field size
        payload.extend_from_slice(&3u32.to_be_bytes());
        payload.push(0x5A); // sizes 5, 10
        payload.push(0x70); // size 7 (low nibble unused)

        let mut warnings = Vec::new();
        let sizes = parse_stz2(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(sizes, vec![5, 10, 7]);
    }

    #[test]
    fn stco_endianness() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(&0x0011_2233u32.to_be_bytes());
        payload.extend_from_slice(&0x4455_6677u32.to_be_bytes());

        let mut warnings = Vec::new();
        let offsets = parse_stco(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(offsets, vec![0x0011_2233, 0x4455_6677]);
    }

    #[test]
    fn co64_beyond_4gib() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(&0x1_0000_0000u64.to_be_bytes());
        payload.extend_from_slice(&0x2_0000_0000u64.to_be_bytes());

        let mut warnings = Vec::new();
        let offsets = parse_co64(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(offsets, vec![0x1_0000_0000, 0x2_0000_0000]);
    }

    #[test]
    fn stsc_runs() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&2u32.to_be_bytes());
        for entry in [[1u32, 10, 1], [5, 5, 1]] {
            for v in entry {
                payload.extend_from_slice(&v.to_be_bytes());
            }
        }

        let mut warnings = Vec::new();
        let entries = parse_stsc(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].first_chunk, 1);
        assert_eq!(entries[0].samples_per_chunk, 10);
        assert_eq!(entries[1].first_chunk, 5);
    }

    #[test]
    fn stss_kept_one_based() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&3u32.to_be_bytes());
        for v in [1u32, 25, 50] {
            payload.extend_from_slice(&v.to_be_bytes());
        }

        let mut warnings = Vec::new();
        let sync = parse_stss(&mut be_reader(&payload), 0, &mut warnings).unwrap();
        assert_eq!(sync, vec![1, 25, 50]);
    }

    #[test]
    fn frame_rates_constant() {
        let stts = [SttsEntry {
            sample_count: 300,
            sample_delta: 1000,
        }];
        let (rate, avg, constant) = derive_frame_rates(30000, &stts);
        assert_eq!(rate, Some(30.0));
        assert_eq!(avg, Some(30.0));
        assert!(constant);
    }

    #[test]
    fn frame_rates_ntsc() {
        let stts = [SttsEntry {
            sample_count: 300,
            sample_delta: 1001,
        }];
        let (rate, avg, constant) = derive_frame_rates(30000, &stts);
        assert!(constant);
        assert_eq!(rate, Some(29.97));
        assert_eq!(avg, Some(29.97));
    }

    #[test]
    fn frame_rates_variable() {
        let stts = [
            SttsEntry {
                sample_count: 1,
                sample_delta: 300,
            },
            SttsEntry {
                sample_count: 1,
                sample_delta: 301,
            },
        ];
        let (rate, avg, constant) = derive_frame_rates(600, &stts);
        assert!(!constant);
        assert_eq!(rate, None);
        // 2 * 600 / 601 = 1.99667... rounds to 1.997
        assert_eq!(avg, Some(1.997));
    }

    #[test]
    fn frame_rates_degenerate() {
        assert_eq!(derive_frame_rates(0, &[]), (None, None, false));
        assert_eq!(derive_frame_rates(600, &[]), (None, None, false));
        let zero = [SttsEntry {
            sample_count: 3,
            sample_delta: 0,
        }];
        assert_eq!(derive_frame_rates(600, &zero), (None, None, false));
    }
}
