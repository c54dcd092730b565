//! Vendor key material.
//!
//! Both device families use the same block cipher but source their keys
//! differently:
//!
//! - **QiYi** uses one static 16-byte key shared by every device.
//! - **MoYu32** starts from a static base key and base IV, then adds the
//!   device's 6-byte hardware address into the first six bytes of each, so
//!   every cube ends up with its own key/IV pair.
//!
//! The static values are reverse-engineered device defaults, shipped as
//! LZ-string compressed JSON arrays.  They are decoded once, on first use, and
//! cached as plain byte arrays.

use std::sync::OnceLock;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::aes::BLOCK_SIZE;
use super::lzstring::{decompress_from_encoded_uri_component, LzStringError};

/// Compressed QiYi static key.
pub const QIYI_KEY_LITERAL: &str = "NoDg7ANAjGkEwBYCc0xQnADAVgkzGAzHNAGyRTanQi5QIFyHrjQMQgsC6QA";

/// Compressed MoYu32 base key.
pub const MOYU32_KEY_LITERAL: &str = "NoJgjANGYJwQrADgjEUAMBmKAWCP4JNIRswt81Yp5DztE1EB2AXSA";

/// Compressed MoYu32 base IV.
pub const MOYU32_IV_LITERAL: &str = "NoRg7ANAzArNAc1IigFgqgTB9MCcE8cAbBCJpKgeaSAAxTSPxgC6QA";

/// Errors produced while decoding an embedded key literal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key literal is not valid LZ-string data: {0}")]
    Decompress(#[from] LzStringError),
    #[error("key literal is not a JSON byte array: {0}")]
    Json(String),
    #[error("key literal has {0} bytes, expected 16")]
    WrongLength(usize),
}

/// Decodes a compressed key literal into its 16 bytes.
///
/// # Errors
///
/// Returns [`KeyError`] if the literal does not decompress to a JSON array of
/// exactly 16 bytes.
pub fn decode_key_literal(literal: &str) -> Result<[u8; BLOCK_SIZE], KeyError> {
    let json = decompress_from_encoded_uri_component(literal)?;
    parse_key_json(&json)
}

fn parse_key_json(json: &str) -> Result<[u8; BLOCK_SIZE], KeyError> {
    let bytes: Vec<u8> = serde_json::from_str(json).map_err(|e| KeyError::Json(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| KeyError::WrongLength(len))
}

fn cached(
    cell: &'static OnceLock<Result<[u8; BLOCK_SIZE], KeyError>>,
    literal: &str,
) -> Result<[u8; BLOCK_SIZE], KeyError> {
    cell.get_or_init(|| decode_key_literal(literal)).clone()
}

/// The static QiYi key.
pub fn qiyi_key() -> Result<[u8; BLOCK_SIZE], KeyError> {
    static KEY: OnceLock<Result<[u8; BLOCK_SIZE], KeyError>> = OnceLock::new();
    cached(&KEY, QIYI_KEY_LITERAL)
}

/// The MoYu32 base key, before address derivation.
pub fn moyu32_base_key() -> Result<[u8; BLOCK_SIZE], KeyError> {
    static KEY: OnceLock<Result<[u8; BLOCK_SIZE], KeyError>> = OnceLock::new();
    cached(&KEY, MOYU32_KEY_LITERAL)
}

/// The MoYu32 base IV, before address derivation.
pub fn moyu32_base_iv() -> Result<[u8; BLOCK_SIZE], KeyError> {
    static IV: OnceLock<Result<[u8; BLOCK_SIZE], KeyError>> = OnceLock::new();
    cached(&IV, MOYU32_IV_LITERAL)
}

// ── Per-device derivation ─────────────────────────────────────────────────────

/// A per-connection key/IV pair.  Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeyMaterial {
    pub key: [u8; BLOCK_SIZE],
    pub iv: [u8; BLOCK_SIZE],
}

impl std::fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKeyMaterial { .. }")
    }
}

/// Derives a device key/IV pair from the base constants and the device's
/// hardware address.
///
/// Byte `i` (for `i` in `0..6`) of both key and IV becomes
/// `(base[i] + address[5 - i]) % 255`.  The remaining ten bytes are copied
/// unchanged.  Note the modulus is 255, not 256: this matches the devices.
pub fn derive_key_iv(
    base_key: &[u8; BLOCK_SIZE],
    base_iv: &[u8; BLOCK_SIZE],
    address: &[u8; 6],
) -> DerivedKeyMaterial {
    let mut key = *base_key;
    let mut iv = *base_iv;
    for i in 0..6 {
        let addr = u16::from(address[5 - i]);
        key[i] = ((u16::from(key[i]) + addr) % 255) as u8;
        iv[i] = ((u16::from(iv[i]) + addr) % 255) as u8;
    }
    DerivedKeyMaterial { key, iv }
}
