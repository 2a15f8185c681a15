//! Bounds-checked byte cursor over a resident buffer.
//!
//! ISO-BMFF integers are big-endian throughout, so the reader defaults to
//! big-endian; the endianness flag exists for legacy QuickTime payloads
//! that carry little-endian fields.
//!
//! Every read validates the remaining length first and fails with
//! `DemuxError::CorruptData` on shortfall, so callers can use `?` freely
//! without byte-level bookkeeping.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use mv_common::{DemuxError, DemuxResult, FourCC};

/// Byte order for multi-byte reads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Stateful cursor over an immutable byte slice.
///
/// `sub_reader` is the only way to scope parsing to a box payload: it
/// hands out an independent cursor over the next `n` bytes and advances
/// the parent past them.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute offset of `data[0]` in the underlying file, carried into
    /// sub-readers so error offsets stay file-absolute.
    base_offset: u64,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    /// New big-endian reader over the whole slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base_offset: 0,
            endian: Endian::Big,
        }
    }

    /// Reader whose positions report as file-absolute offsets starting at
    /// `base_offset`.
    pub fn with_offset(data: &'a [u8], base_offset: u64) -> Self {
        Self {
            data,
            pos: 0,
            base_offset,
            endian: Endian::Big,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Current position within the slice.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// File-absolute offset of the current position.
    pub fn abs_pos(&self) -> u64 {
        self.base_offset + self.pos as u64
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Total length of the underlying slice.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Move to an absolute position within the slice.
    pub fn seek(&mut self, pos: usize) -> DemuxResult<()> {
        if pos > self.data.len() {
            return Err(self.short(pos.saturating_sub(self.data.len())));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance past the next `n` bytes.
    pub fn skip(&mut self, n: usize) -> DemuxResult<()> {
        self.take(n).map(|_| ())
    }

    /// Core bounds check: consume and return the next `n` bytes.
    fn take(&mut self, n: usize) -> DemuxResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.short(n));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn short(&self, wanted: usize) -> DemuxError {
        DemuxError::CorruptData {
            offset: self.abs_pos(),
            reason: format!("need {wanted} bytes, {} remain", self.remaining()),
        }
    }

    /// Borrow the next `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> DemuxResult<&'a [u8]> {
        self.take(n)
    }

    /// Read `n` bytes as ASCII text; non-ASCII bytes are replaced.
    pub fn read_ascii(&mut self, n: usize) -> DemuxResult<String> {
        let bytes = self.take(n)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_u8(&mut self) -> DemuxResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> DemuxResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> DemuxResult<u16> {
        let b = self.take(2)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u16(b),
            Endian::Little => LittleEndian::read_u16(b),
        })
    }

    pub fn read_i16(&mut self) -> DemuxResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// 24-bit unsigned read (box flags fields).
    pub fn read_u24(&mut self) -> DemuxResult<u32> {
        let b = self.take(3)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u24(b),
            Endian::Little => LittleEndian::read_u24(b),
        })
    }

    /// 24-bit signed read (sign-extended).
    pub fn read_i24(&mut self) -> DemuxResult<i32> {
        let raw = self.read_u24()?;
        Ok(((raw << 8) as i32) >> 8)
    }

    pub fn read_u32(&mut self) -> DemuxResult<u32> {
        let b = self.take(4)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u32(b),
            Endian::Little => LittleEndian::read_u32(b),
        })
    }

    pub fn read_i32(&mut self) -> DemuxResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> DemuxResult<u64> {
        let b = self.take(8)?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_u64(b),
            Endian::Little => LittleEndian::read_u64(b),
        })
    }

    pub fn read_i64(&mut self) -> DemuxResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> DemuxResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> DemuxResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a four-character code.
    pub fn read_fourcc(&mut self) -> DemuxResult<FourCC> {
        let b = self.take(4)?;
        Ok(FourCC::from_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a 16.16 fixed-point value (e.g. stsd audio sample rate).
    pub fn read_fixed_16_16(&mut self) -> DemuxResult<f64> {
        Ok(self.read_u32()? as f64 / 65536.0)
    }

    /// Read an 8.8 fixed-point value.
    pub fn read_fixed_8_8(&mut self) -> DemuxResult<f32> {
        Ok(self.read_u16()? as f32 / 256.0)
    }

    /// Look at the next byte without advancing.
    pub fn peek_u8(&self) -> DemuxResult<u8> {
        self.clone().read_u8()
    }

    /// Look at the next u32 without advancing.
    pub fn peek_u32(&self) -> DemuxResult<u32> {
        self.clone().read_u32()
    }

    /// Look at the next fourcc without advancing.
    pub fn peek_fourcc(&self) -> DemuxResult<FourCC> {
        self.clone().read_fourcc()
    }

    /// Split off an independent reader over the next `n` bytes and advance
    /// past them.
    pub fn sub_reader(&mut self, n: usize) -> DemuxResult<ByteReader<'a>> {
        let base = self.abs_pos();
        let slice = self.take(n)?;
        Ok(ByteReader {
            data: slice,
            pos: 0,
            base_offset: base,
            endian: self.endian,
        })
    }
}
