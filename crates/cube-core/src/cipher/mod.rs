//! Cipher module: the block cipher and the vendor key material.
//!
//! - **`aes`** – 10-round, 16-byte block cipher with key-schedule expansion.
//! - **`keys`** – Embedded vendor key literals and per-device key/IV derivation.
//! - **`lzstring`** – Decoder for the compressed form the key literals ship in.

pub mod aes;
pub mod keys;
pub mod lzstring;

pub use aes::{Aes128, BLOCK_SIZE};
pub use keys::{derive_key_iv, DerivedKeyMaterial, KeyError};
