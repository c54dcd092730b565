//! Protocol module: everything about how bytes look on the wire.
//!
//! - **`checksum`** – CRC-16 frame trailer.
//! - **`frame`** – Start/length/CRC framing plus per-block encryption (QiYi).
//! - **`whitening`** – Head/tail IV whitening around the block cipher (MoYu32).
//! - **`bits`** – MSB-first bit-field extraction for non byte-aligned fields.
//! - **`gatt`** – GATT UUID expansion and case-insensitive matching.
//! - **`qiyi`** / **`moyu32`** – The two vendor message layouts.

pub mod bits;
pub mod checksum;
pub mod frame;
pub mod gatt;
pub mod moyu32;
pub mod qiyi;
pub mod whitening;

pub use bits::BitReader;
pub use checksum::crc16_modbus;
pub use frame::{open_frame, seal_frame, FrameError};
pub use gatt::{expand_uuid, uuid_matches};
pub use moyu32::MoYuMessage;
pub use qiyi::QiYiMessage;
pub use whitening::{whiten_decrypt, whiten_encrypt};
