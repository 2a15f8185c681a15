//! ISO BMFF box (atom) tree parser.
//!
//! Parses the box hierarchy of MP4/MOV/M4V buffers into a tree of
//! containers and opaque leaves, with pre-order search helpers.
//!
//! Reference: ISO 14496-12 (ISO Base Media File Format).

use mv_common::{DemuxError, DemuxResult, DemuxWarning, FourCC};
use std::ops::Range;
use tracing::{trace, warn};

use crate::reader::ByteReader;

// ─── Box FourCC constants ────────────────────────────────────────────

pub const FTYP: FourCC = FourCC::from_bytes(*b"ftyp");
pub const MOOV: FourCC = FourCC::from_bytes(*b"moov");
pub const MVHD: FourCC = FourCC::from_bytes(*b"mvhd");
pub const TRAK: FourCC = FourCC::from_bytes(*b"trak");
pub const TKHD: FourCC = FourCC::from_bytes(*b"tkhd");
pub const MDIA: FourCC = FourCC::from_bytes(*b"mdia");
pub const MDHD: FourCC = FourCC::from_bytes(*b"mdhd");
pub const HDLR: FourCC = FourCC::from_bytes(*b"hdlr");
pub const MINF: FourCC = FourCC::from_bytes(*b"minf");
pub const STBL: FourCC = FourCC::from_bytes(*b"stbl");
pub const STSD: FourCC = FourCC::from_bytes(*b"stsd");
pub const STTS: FourCC = FourCC::from_bytes(*b"stts");
pub const STSC: FourCC = FourCC::from_bytes(*b"stsc");
pub const STSZ: FourCC = FourCC::from_bytes(*b"stsz");
pub const STZ2: FourCC = FourCC::from_bytes(*b"stz2");
pub const STCO: FourCC = FourCC::from_bytes(*b"stco");
pub const CO64: FourCC = FourCC::from_bytes(*b"co64");
pub const STSS: FourCC = FourCC::from_bytes(*b"stss");
pub const CTTS: FourCC = FourCC::from_bytes(*b"ctts");
pub const MDAT: FourCC = FourCC::from_bytes(*b"mdat");
pub const FREE: FourCC = FourCC::from_bytes(*b"free");
pub const SKIP: FourCC = FourCC::from_bytes(*b"skip");
pub const WIDE: FourCC = FourCC::from_bytes(*b"wide");
pub const UUID: FourCC = FourCC::from_bytes(*b"uuid");
pub const UDTA: FourCC = FourCC::from_bytes(*b"udta");
pub const META: FourCC = FourCC::from_bytes(*b"meta");
pub const DINF: FourCC = FourCC::from_bytes(*b"dinf");
pub const DREF: FourCC = FourCC::from_bytes(*b"dref");
pub const EDTS: FourCC = FourCC::from_bytes(*b"edts");
pub const ELST: FourCC = FourCC::from_bytes(*b"elst");
pub const MVEX: FourCC = FourCC::from_bytes(*b"mvex");
pub const MOOF: FourCC = FourCC::from_bytes(*b"moof");
pub const TRAF: FourCC = FourCC::from_bytes(*b"traf");
pub const MFRA: FourCC = FourCC::from_bytes(*b"mfra");
pub const SMHD: FourCC = FourCC::from_bytes(*b"smhd");
pub const VMHD: FourCC = FourCC::from_bytes(*b"vmhd");
pub const VIDE: FourCC = FourCC::from_bytes(*b"vide");
pub const SOUN: FourCC = FourCC::from_bytes(*b"soun");

/// Box types parsed recursively into child boxes. `uuid` is deliberately
/// absent: its payload starts with a 16-byte usertype, so it is kept
/// opaque.
const CONTAINER_TYPES: &[FourCC] = &[
    MOOV, TRAK, MDIA, MINF, STBL, UDTA, META, DINF, EDTS, MVEX, MOOF, TRAF, MFRA,
];

/// Leaf types we expect to see; anything else raises an `UnknownBox`
/// warning (and stays an opaque leaf).
const KNOWN_LEAF_TYPES: &[FourCC] = &[
    FTYP, MVHD, TKHD, MDHD, HDLR, STSD, STTS, STSC, STSZ, STZ2, STCO, CO64, STSS, CTTS, MDAT,
    FREE, SKIP, WIDE, UUID, DREF, ELST, SMHD, VMHD,
];

pub(crate) fn is_container(fourcc: FourCC) -> bool {
    CONTAINER_TYPES.contains(&fourcc)
}

// ─── Box Header ─────────────────────────────────────────────────────

/// A parsed ISO BMFF box header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoxHeader {
    /// FourCC type code.
    pub fourcc: FourCC,
    /// Total box size including the header. Already resolved for
    /// extended (64-bit) and to-end-of-buffer (size 0) forms.
    pub size: u64,
    /// Absolute offset of the box start.
    pub offset: u64,
    /// Size of the header itself (8 or 16 bytes).
    pub header_len: u8,
}

impl BoxHeader {
    /// Byte size of the payload, excluding the header.
    pub fn payload_len(&self) -> u64 {
        self.size - self.header_len as u64
    }

    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + self.header_len as u64
    }

    /// Absolute offset of the first byte after this box.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size
    }
}

/// Read one box header from the reader. Returns `None` at end of input.
///
/// A `size` of 0 means the box extends to the end of the reader's range;
/// a `size` of 1 means a 64-bit largesize follows the fourcc. Both forms
/// are resolved to the actual total size here.
pub fn read_box_header(reader: &mut ByteReader<'_>) -> DemuxResult<Option<BoxHeader>> {
    if reader.is_empty() {
        return Ok(None);
    }

    let offset = reader.abs_pos();
    let size32 = reader.read_u32()?;
    let fourcc = reader.read_fourcc()?;

    let (size, header_len) = match size32 {
        0 => {
            // Extends to the end of the enclosing range.
            (reader.remaining() as u64 + 8, 8u8)
        }
        1 => {
            let largesize = reader.read_u64()?;
            (largesize, 16u8)
        }
        _ => (size32 as u64, 8u8),
    };

    if size < header_len as u64 {
        return Err(DemuxError::InvalidBoxSize {
            fourcc,
            offset,
            size,
        });
    }

    trace!("box '{}' at offset {}, size {}", fourcc, offset, size);

    Ok(Some(BoxHeader {
        fourcc,
        size,
        offset,
        header_len,
    }))
}

// ─── Box Tree ───────────────────────────────────────────────────────

/// A node of the parsed box tree: either a container with child boxes or
/// a leaf whose payload is an opaque byte range of the source buffer.
#[derive(Clone, Debug)]
pub struct Mp4Box {
    pub header: BoxHeader,
    pub content: BoxContent,
}

/// Container-vs-leaf classification of a box.
#[derive(Clone, Debug)]
pub enum BoxContent {
    Container(Vec<Mp4Box>),
    Leaf {
        /// Absolute payload byte range in the source buffer.
        payload: Range<usize>,
    },
}

impl Mp4Box {
    pub fn fourcc(&self) -> FourCC {
        self.header.fourcc
    }

    /// Child boxes; empty for leaves.
    pub fn children(&self) -> &[Mp4Box] {
        match &self.content {
            BoxContent::Container(children) => children,
            BoxContent::Leaf { .. } => &[],
        }
    }

    /// Payload bytes of a leaf box; `None` for containers.
    pub fn payload<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        match &self.content {
            BoxContent::Leaf { payload } => data.get(payload.clone()),
            BoxContent::Container(_) => None,
        }
    }

    /// A reader over a leaf payload, positioned at its start and
    /// reporting file-absolute offsets.
    pub fn payload_reader<'a>(&self, data: &'a [u8]) -> Option<ByteReader<'a>> {
        let payload = self.payload(data)?;
        Some(ByteReader::with_offset(
            payload,
            self.header.payload_offset(),
        ))
    }

    /// First direct child with the given type.
    pub fn child(&self, fourcc: FourCC) -> Option<&Mp4Box> {
        self.children().iter().find(|b| b.fourcc() == fourcc)
    }

    /// Walk a path of box types from this box downward.
    pub fn descend(&self, path: &[FourCC]) -> Option<&Mp4Box> {
        let mut node = self;
        for &fourcc in path {
            node = node.child(fourcc)?;
        }
        Some(node)
    }
}

/// Pre-order depth-first search over a box forest.
pub fn find(boxes: &[Mp4Box], fourcc: FourCC) -> Option<&Mp4Box> {
    for b in boxes {
        if b.fourcc() == fourcc {
            return Some(b);
        }
        if let Some(found) = find(b.children(), fourcc) {
            return Some(found);
        }
    }
    None
}

/// All boxes of the given type, in pre-order.
pub fn find_all(boxes: &[Mp4Box], fourcc: FourCC) -> Vec<&Mp4Box> {
    let mut out = Vec::new();
    collect(boxes, fourcc, &mut out);
    out
}

fn collect<'t>(boxes: &'t [Mp4Box], fourcc: FourCC, out: &mut Vec<&'t Mp4Box>) {
    for b in boxes {
        if b.fourcc() == fourcc {
            out.push(b);
        }
        collect(b.children(), fourcc, out);
    }
}

/// Resolve a path of box types starting from the top level, e.g.
/// `[MOOV, TRAK, MDIA]` returns the first mdia of the first trak.
pub fn find_path<'t>(boxes: &'t [Mp4Box], path: &[FourCC]) -> Option<&'t Mp4Box> {
    let (&first, rest) = path.split_first()?;
    let root = boxes.iter().find(|b| b.fourcc() == first)?;
    root.descend(rest)
}

/// Parse the complete box tree of a buffer.
pub fn parse_box_tree(
    data: &[u8],
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<Mp4Box>> {
    let mut reader = ByteReader::new(data);
    parse_level(&mut reader, None, warnings)
}

/// Parse sibling boxes until the reader is exhausted.
///
/// `parent` is the enclosing container type, used for warnings. A child
/// whose declared size crosses the end of the enclosing range terminates
/// this level with a warning; boxes parsed so far are kept and the
/// enclosing container stays usable.
fn parse_level(
    reader: &mut ByteReader<'_>,
    parent: Option<FourCC>,
    warnings: &mut Vec<DemuxWarning>,
) -> DemuxResult<Vec<Mp4Box>> {
    let mut boxes = Vec::new();

    while !reader.is_empty() {
        if reader.remaining() < 8 {
            warn!(
                "{} trailing bytes at offset {}, ignored",
                reader.remaining(),
                reader.abs_pos()
            );
            warnings.push(DemuxWarning::MalformedBox {
                fourcc: parent.unwrap_or(FourCC(0)),
                offset: reader.abs_pos(),
                reason: format!("{} trailing bytes", reader.remaining()),
            });
            break;
        }

        let header_offset = reader.abs_pos();
        let header = match read_box_header(reader) {
            Ok(Some(h)) => h,
            Ok(None) => break,
            Err(err) => {
                // Inside a container a malformed child only truncates the
                // container; at the top level it is fatal.
                if let Some(parent) = parent {
                    warn!("malformed child of '{parent}': {err}");
                    warnings.push(DemuxWarning::ChildExceedsParent {
                        parent,
                        offset: header_offset,
                    });
                    break;
                }
                return Err(err);
            }
        };

        let payload_len = header.payload_len();
        if payload_len > reader.remaining() as u64 {
            if let Some(parent) = parent {
                warn!(
                    "child '{}' at offset {} crosses the end of '{}'",
                    header.fourcc, header.offset, parent
                );
                warnings.push(DemuxWarning::ChildExceedsParent {
                    parent,
                    offset: header.offset,
                });
                break;
            }
            return Err(DemuxError::InvalidBoxSize {
                fourcc: header.fourcc,
                offset: header.offset,
                size: header.size,
            });
        }

        let mut payload_reader = reader.sub_reader(payload_len as usize)?;

        let content = if is_container(header.fourcc) {
            BoxContent::Container(parse_level(
                &mut payload_reader,
                Some(header.fourcc),
                warnings,
            )?)
        } else {
            if !KNOWN_LEAF_TYPES.contains(&header.fourcc) {
                warnings.push(DemuxWarning::UnknownBox {
                    fourcc: header.fourcc,
                    offset: header.offset,
                });
            }
            let start = header.payload_offset() as usize;
            BoxContent::Leaf {
                payload: start..start + payload_len as usize,
            }
        };

        boxes.push(Mp4Box { header, content });
    }

    Ok(boxes)
}
