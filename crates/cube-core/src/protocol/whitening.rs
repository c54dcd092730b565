//! Head/tail IV whitening around the block cipher (MoYu32).
//!
//! MoYu32 frames are 20 bytes long, which is not a whole number of blocks.
//! The device handles this by encrypting two *overlapping* 16-byte windows:
//!
//! ```text
//!  bytes:  0 ............ 15 16 .. 19
//!  head:   [================]
//!  tail:       [================]      (last 16 bytes, offset len - 16)
//! ```
//!
//! Before each window is encrypted it is XOR-ed with the IV.  Encoding does
//! head first, then tail; decoding undoes it in the opposite order.  The order
//! matters: bytes 4..16 go through the cipher twice.
//!
//! Frames of exactly 16 bytes only have a head.  Frames shorter than one block
//! cannot be processed and are rejected.

use crate::cipher::aes::{Aes128, BLOCK_SIZE};
use crate::protocol::frame::{block_mut, FrameError};

fn xor_iv(block: &mut [u8; BLOCK_SIZE], iv: &[u8; BLOCK_SIZE]) {
    for (b, k) in block.iter_mut().zip(iv) {
        *b ^= k;
    }
}

fn check_len(buf: &[u8]) -> Result<(), FrameError> {
    if buf.len() < BLOCK_SIZE {
        return Err(FrameError::TooShort {
            needed: BLOCK_SIZE,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Encrypts `buf` in place.
///
/// # Errors
///
/// Returns [`FrameError::TooShort`] if `buf` is shorter than one block.
pub fn whiten_encrypt(
    cipher: &Aes128,
    iv: &[u8; BLOCK_SIZE],
    buf: &mut [u8],
) -> Result<(), FrameError> {
    check_len(buf)?;
    let tail = buf.len() - BLOCK_SIZE;

    if let Some(head) = block_mut(buf, 0) {
        xor_iv(head, iv);
        cipher.encrypt_block(head);
    }
    if tail > 0 {
        if let Some(block) = block_mut(buf, tail) {
            xor_iv(block, iv);
            cipher.encrypt_block(block);
        }
    }
    Ok(())
}

/// Decrypts `buf` in place, undoing [`whiten_encrypt`].
///
/// # Errors
///
/// Returns [`FrameError::TooShort`] if `buf` is shorter than one block.
pub fn whiten_decrypt(
    cipher: &Aes128,
    iv: &[u8; BLOCK_SIZE],
    buf: &mut [u8],
) -> Result<(), FrameError> {
    check_len(buf)?;
    let tail = buf.len() - BLOCK_SIZE;

    if tail > 0 {
        if let Some(block) = block_mut(buf, tail) {
            cipher.decrypt_block(block);
            xor_iv(block, iv);
        }
    }
    if let Some(head) = block_mut(buf, 0) {
        cipher.decrypt_block(head);
        xor_iv(head, iv);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: [u8; BLOCK_SIZE] = [7; BLOCK_SIZE];
    const IV: [u8; BLOCK_SIZE] = [
        0x10, 0x21, 0x32, 0x43, 0x54, 0x65, 0x76, 0x87, 0x98, 0xA9, 0xBA, 0xCB, 0xDC, 0xED, 0xFE,
        0x0F,
    ];

    #[test]
    fn test_whiten_rejects_short_buffer() {
        let cipher = Aes128::new(&KEY);
        let mut buf = [0u8; 15];
        assert!(matches!(
            whiten_encrypt(&cipher, &IV, &mut buf),
            Err(FrameError::TooShort { needed: 16, available: 15 })
        ));
        assert!(whiten_decrypt(&cipher, &IV, &mut buf).is_err());
    }

    #[test]
    fn test_single_block_is_iv_xor_then_encrypt() {
        // Arrange
        let cipher = Aes128::new(&KEY);
        let mut expected = [0x5Au8; BLOCK_SIZE];
        xor_iv(&mut expected, &IV);
        cipher.encrypt_block(&mut expected);

        // Act
        let mut buf = [0x5Au8; BLOCK_SIZE];
        whiten_encrypt(&cipher, &IV, &mut buf).unwrap();

        // Assert
        assert_eq!(buf, expected);
    }

    #[test]
    fn test_twenty_byte_frame_encrypts_overlapping_tail_after_head() {
        // Arrange – reproduce the two steps by hand
        let cipher = Aes128::new(&KEY);
        let plain: Vec<u8> = (0u8..20).collect();
        let mut expected = plain.clone();
        {
            let head = block_mut(&mut expected, 0).unwrap();
            xor_iv(head, &IV);
            cipher.encrypt_block(head);
        }
        {
            let tail = block_mut(&mut expected, 4).unwrap();
            xor_iv(tail, &IV);
            cipher.encrypt_block(tail);
        }

        // Act
        let mut buf = plain;
        whiten_encrypt(&cipher, &IV, &mut buf).unwrap();

        // Assert
        assert_eq!(buf, expected);
    }

    proptest! {
        #[test]
        fn prop_decrypt_undoes_encrypt(data in proptest::collection::vec(any::<u8>(), 16..48)) {
            let cipher = Aes128::new(&KEY);
            let mut buf = data.clone();
            whiten_encrypt(&cipher, &IV, &mut buf).unwrap();
            whiten_decrypt(&cipher, &IV, &mut buf).unwrap();
            prop_assert_eq!(buf, data);
        }
    }
}
