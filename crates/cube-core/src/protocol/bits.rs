//! MSB-first bit-field extraction.
//!
//! MoYu32 packs several fields at positions that are not byte aligned (5-bit
//! move codes, for example).  Bit 0 is the most significant bit of byte 0,
//! bit 8 is the most significant bit of byte 1, and so on.

/// Read-only view over a byte buffer addressed in bits.
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Number of addressable bits.
    pub fn len_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Reads `width` bits starting at bit `start`, most significant first.
    ///
    /// Returns `None` if the field runs past the end of the buffer or `width`
    /// is larger than 32.
    pub fn read(&self, start: usize, width: usize) -> Option<u32> {
        if width > 32 || start.checked_add(width)? > self.len_bits() {
            return None;
        }
        let mut value: u32 = 0;
        for bit in start..start + width {
            let byte = self.bytes[bit / 8];
            let set = (byte >> (7 - bit % 8)) & 1;
            value = (value << 1) | u32::from(set);
        }
        Some(value)
    }

    /// Convenience wrapper for fields up to eight bits wide.
    pub fn read_u8(&self, start: usize, width: usize) -> Option<u8> {
        if width > 8 {
            return None;
        }
        self.read(start, width).map(|v| v as u8)
    }
}
