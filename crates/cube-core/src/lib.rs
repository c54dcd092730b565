//! # cube-core
//!
//! Shared library for the smart-cube bridge containing the block cipher, the
//! vendor frame codecs, the move vocabulary, and the move reconciliation
//! engine.
//!
//! It has zero dependencies on Bluetooth stacks, async runtimes, or UI code.
//! Everything in here is synchronous and can be tested with plain byte arrays.
//!
//! # Architecture overview (for beginners)
//!
//! A "smart" twisty puzzle reports every face turn over Bluetooth Low Energy
//! (BLE).  The reports arrive as small encrypted notification frames, and some
//! of them get lost on the way.  The bridge turns that lossy stream back into
//! an ordered list of moves such as `R`, `U'`, `F`.
//!
//! This crate (`cube-core`) is the pure foundation.  It defines:
//!
//! - **`cipher`** – The 16-byte block cipher used by both device families,
//!   plus decoding of the embedded vendor key literals and the per-device
//!   key/IV derivation.
//!
//! - **`protocol`** – How bytes look on the wire: the CRC-16 trailer, block
//!   framing, head/tail IV whitening, bit-level field extraction, GATT UUID
//!   matching, and the two vendor message layouts (QiYi and MoYu32).
//!
//! - **`domain`** – Faces, turns and moves; device identity (name prefix →
//!   model → hardware address); and the reconciliation engine that recovers
//!   moves from the history window carried in every move frame.

pub mod cipher;
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cube_core::Move` instead of `cube_core::domain::moves::Move`.
pub use cipher::aes::Aes128;
pub use domain::device::{AddressError, DeviceModel, GattProfile, HardwareAddress};
pub use domain::moves::{Face, Move, MoveEvent, MoveParseError, Turn};
pub use domain::reconcile::{
    HistoryEntry, Marker, Reconciler, Reconciliation, Timestamp, WrappingCounter,
};
pub use protocol::frame::FrameError;
