//! Core identifier types shared across the engine crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A four-character code identifying a box or codec type.
///
/// Stored as a big-endian u32 so constants compare cheaply; the ASCII
/// form is recovered on demand for logging and codec-table lookups.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCC(pub u32);

impl FourCC {
    /// Build a FourCC from 4 ASCII bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// The 4 raw bytes of this code.
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Lowercased ASCII key used by the codec tables.
    ///
    /// Trailing spaces and NULs are trimmed so padded codes like `"mp3 "`
    /// normalise to `"mp3"`.
    pub fn lower_key(self) -> String {
        let mut bytes = self.to_bytes().to_vec();
        while matches!(bytes.last(), Some(b' ') | Some(0)) {
            bytes.pop();
        }
        bytes
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b.to_ascii_lowercase() as char
                } else {
                    '?'
                }
            })
            .collect()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}
