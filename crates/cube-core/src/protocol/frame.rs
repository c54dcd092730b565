//! Start/length/CRC framing with per-block encryption.
//!
//! Wire format before encryption:
//! ```text
//! [0xFE][len:1][opcode:1][payload:N][crc_lo:1][crc_hi:1][zero padding]
//! ```
//! `len` counts everything up to and including the CRC (`N + 5` bytes, i.e.
//! the opcode-plus-payload "content" length + 4).  The buffer is then
//! zero-padded to a multiple of 16 and every 16-byte block is encrypted on its
//! own: no chaining between blocks.
//!
//! # Inbound validation
//!
//! Garbled notifications are normal on a BLE link.  [`open_frame`] reports
//! *why* a buffer was rejected through [`FrameError`], but callers are expected
//! to log and drop rejected frames rather than tear down the connection.

use thiserror::Error;

use crate::cipher::aes::{Aes128, BLOCK_SIZE};
use crate::protocol::checksum::{append_checksum, crc16_modbus};

/// First byte of every framed message.
pub const FRAME_START: u8 = 0xFE;

/// Smallest frame that can carry a header and be checksummed.
pub const MIN_FRAME_LEN: usize = 3;

/// Bytes added around the content: start byte, length byte, two CRC bytes.
pub const FRAME_OVERHEAD: usize = 4;

/// Reasons a buffer is rejected by a frame codec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer is shorter than the codec can work with.
    #[error("frame too short: need at least {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    /// The raw buffer is not a whole number of cipher blocks.
    #[error("buffer of {0} bytes is not a multiple of the cipher block size")]
    Unaligned(usize),

    /// The decrypted length byte points past the end of the buffer.
    #[error("declared length {declared} exceeds buffer length {available}")]
    LengthOverrun { declared: usize, available: usize },

    /// The CRC over the frame did not come out to zero.
    #[error("checksum mismatch (residue 0x{0:04X})")]
    ChecksumMismatch(u16),

    /// Outbound content does not fit the one-byte length field.
    #[error("content of {0} bytes does not fit a one-byte length field")]
    ContentTooLong(usize),
}

// ── Block helpers ─────────────────────────────────────────────────────────────

/// Borrows the 16 bytes of `buf` starting at `offset` as a cipher block.
pub(crate) fn block_mut(buf: &mut [u8], offset: usize) -> Option<&mut [u8; BLOCK_SIZE]> {
    buf.get_mut(offset..offset + BLOCK_SIZE)?.try_into().ok()
}

/// Encrypts every whole 16-byte block of `buf` independently.
pub fn encrypt_blocks(cipher: &Aes128, buf: &mut [u8]) {
    for offset in (0..buf.len()).step_by(BLOCK_SIZE) {
        if let Some(block) = block_mut(buf, offset) {
            cipher.encrypt_block(block);
        }
    }
}

/// Decrypts every whole 16-byte block of `buf` independently.
pub fn decrypt_blocks(cipher: &Aes128, buf: &mut [u8]) {
    for offset in (0..buf.len()).step_by(BLOCK_SIZE) {
        if let Some(block) = block_mut(buf, offset) {
            cipher.decrypt_block(block);
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Builds the plaintext frame for `content` (opcode followed by payload),
/// including CRC trailer and zero padding.
///
/// # Errors
///
/// Returns [`FrameError::ContentTooLong`] if the frame length would not fit
/// in one byte.
pub fn build_frame(content: &[u8]) -> Result<Vec<u8>, FrameError> {
    let declared = content.len() + FRAME_OVERHEAD;
    let declared_byte =
        u8::try_from(declared).map_err(|_| FrameError::ContentTooLong(content.len()))?;

    let padded_len = declared.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut frame = Vec::with_capacity(padded_len);
    frame.push(FRAME_START);
    frame.push(declared_byte);
    frame.extend_from_slice(content);
    append_checksum(&mut frame);
    frame.resize(padded_len, 0x00);
    Ok(frame)
}

/// Builds and encrypts a frame for `content`, ready for a transport write.
///
/// # Errors
///
/// See [`build_frame`].
pub fn seal_frame(cipher: &Aes128, content: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut frame = build_frame(content)?;
    encrypt_blocks(cipher, &mut frame);
    Ok(frame)
}

/// Decrypts a raw notification and returns the validated frame, truncated to
/// its declared length (padding removed, CRC trailer kept).
///
/// # Errors
///
/// Returns [`FrameError`] if the buffer is too short, not block-aligned, has a
/// length byte beyond the buffer, or fails the CRC check.
pub fn open_frame(cipher: &Aes128, raw: &[u8]) -> Result<Vec<u8>, FrameError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort {
            needed: MIN_FRAME_LEN,
            available: raw.len(),
        });
    }
    if raw.len() % BLOCK_SIZE != 0 {
        return Err(FrameError::Unaligned(raw.len()));
    }

    let mut msg = raw.to_vec();
    decrypt_blocks(cipher, &mut msg);

    let declared = msg[1] as usize;
    if declared > msg.len() {
        return Err(FrameError::LengthOverrun {
            declared,
            available: msg.len(),
        });
    }
    msg.truncate(declared);
    if msg.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort {
            needed: MIN_FRAME_LEN,
            available: msg.len(),
        });
    }

    let residue = crc16_modbus(&msg);
    if residue != 0 {
        return Err(FrameError::ChecksumMismatch(residue));
    }
    Ok(msg)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
