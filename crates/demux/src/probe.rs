//! Buffer sniffing — cheap ISO-BMFF detection before a full parse.

use byteorder::{BigEndian, ByteOrder};
use mv_common::FourCC;

use crate::mp4::boxes::{FREE, FTYP, MDAT, MOOV, SKIP, WIDE};

/// Box types that plausibly open an ISO-BMFF file.
const LEADING_TYPES: &[FourCC] = &[FTYP, MOOV, MDAT, FREE, SKIP, WIDE];

/// Returns true if the buffer starts with a plausible ISO-BMFF box
/// header. Cheap enough to run before committing to a full `init`.
pub fn looks_like_mp4(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }
    let size = BigEndian::read_u32(&data[..4]);
    let fourcc = FourCC::from_bytes([data[4], data[5], data[6], data[7]]);

    let size_ok = match size {
        0 => true,                     // extends to end of file
        1 => data.len() >= 16,         // largesize follows
        n => n >= 8,
    };
    size_ok && LEADING_TYPES.contains(&fourcc)
}
