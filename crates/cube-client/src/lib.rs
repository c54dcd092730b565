//! cube-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does cube-client do? (for beginners)
//!
//! A smart cube is a twisty puzzle with a small Bluetooth Low Energy radio
//! inside.  Every time a face is turned it sends an encrypted notification.
//! The client application:
//!
//! 1. Discovers a cube whose advertised name matches a known prefix and works
//!    out which device family it belongs to.
//! 2. Opens the BLE link, finds the vendor's GATT service and
//!    characteristics, derives the cipher key, subscribes to notifications
//!    and sends the vendor handshake.
//! 3. Decrypts each notification, acknowledges it when the device expects
//!    that, and recovers any moves whose notifications were lost.
//! 4. Hands every move, in the order it was made, to a [`MoveSink`].
//!
//! The BLE stack itself sits behind the
//! [`BleTransport`](infrastructure::transport::BleTransport) trait, so the
//! whole path runs in tests against an in-memory transport.
//!
//! [`MoveSink`]: application::move_sink::MoveSink

/// Application layer: vendor protocol adapters and the move sink seam.
pub mod application;

/// Infrastructure layer: transport seam, connection lifecycle, configuration.
pub mod infrastructure;
