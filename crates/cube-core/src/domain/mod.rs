//! Domain entities for the smart-cube bridge.
//!
//! This module contains pure logic with no infrastructure dependencies.
//!
//! # What lives in the domain? (for beginners)
//!
//! The domain is the innermost layer of the bridge.  It knows what a *move*
//! is, which device families exist and how they are identified, and how to
//! decide which reported moves are new.  It does not know anything about
//! Bluetooth, async runtimes, or the bytes on the wire: those concerns live
//! in `protocol` (bytes) and in the `cube-client` crate (I/O).
//!
//! Keeping it this way means every rule here can be tested with plain values.

/// Faces, turn directions, moves and the events the bridge emits.
pub mod moves;

/// Device families, their name prefixes, hardware addresses and GATT profiles.
pub mod device;

/// Recovering lost moves from the history window in each move frame.
///
/// See [`reconcile::Reconciler`] for the main type.
pub mod reconcile;
