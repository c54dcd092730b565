//! Infrastructure layer for the client application.
//!
//! Contains the I/O-facing pieces: the BLE transport seam, the connection
//! lifecycle that drives an adapter over it, and configuration loading.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `cube_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`transport`** – The async [`BleTransport`](transport::BleTransport)
//!   trait a platform BLE stack implements, plus an in-memory
//!   `MockTransport` for tests and capture replay.
//!
//! - **`connection`** – [`ConnectionHandle`](connection::ConnectionHandle):
//!   discovery, model detection, GATT resolution, key derivation,
//!   subscription, handshake, the notification loop, and teardown.
//!
//! - **`config`** – TOML configuration for the client binary.

pub mod config;
pub mod connection;
pub mod transport;
