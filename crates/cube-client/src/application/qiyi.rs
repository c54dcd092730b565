//! QiYi protocol adapter.
//!
//! Session flow:
//!
//! ```text
//! bridge                                 cube
//!   │── hello (address) ─────────────────▶│
//!   │◀──────────────── cube hello (0x02) ──│  battery, sticker state
//!   │── ack ──────────────────────────────▶│
//!   │◀────────────── state change (0x03) ──│  latest move + 9 history slots
//!   │── ack ──────────────────────────────▶│
//!   │              ...                     │
//! ```
//!
//! Every hello and state-change frame is acknowledged by echoing its opcode
//! and timestamp.  Move ordering uses the 32-bit device timestamp.

use tracing::{debug, info, warn};
use zeroize::Zeroize;

use cube_core::cipher::keys::qiyi_key;
use cube_core::cipher::KeyError;
use cube_core::protocol::frame::{open_frame, seal_frame, FRAME_START};
use cube_core::protocol::qiyi::{ack_content, hello_content, QiYiMessage, RECONCILE_WINDOW};
use cube_core::{Aes128, DeviceModel, FrameError, HardwareAddress, Reconciler, Timestamp};

use super::protocol::{CubeProtocol, NotificationOutcome};

/// Adapter for QiYi cubes.
pub struct QiYiProtocol {
    cipher: Option<Aes128>,
    address: HardwareAddress,
    reconciler: Reconciler<Timestamp>,
    battery: Option<u8>,
    facelets: Option<String>,
}

impl QiYiProtocol {
    /// Creates the adapter for the cube at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the static key literal cannot be decoded.
    pub fn new(address: HardwareAddress) -> Result<Self, KeyError> {
        let mut key = qiyi_key()?;
        let cipher = Aes128::new(&key);
        key.zeroize();
        Ok(Self {
            cipher: Some(cipher),
            address,
            reconciler: Reconciler::new(RECONCILE_WINDOW),
            battery: None,
            facelets: None,
        })
    }

    /// The newest timestamp forwarded so far.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.reconciler.last_observed()
    }

    fn acknowledge(cipher: &Aes128, msg: &[u8], outcome: &mut NotificationOutcome) {
        let Some(content) = ack_content(msg) else {
            return;
        };
        match seal_frame(cipher, content) {
            Ok(frame) => outcome.replies.push(frame),
            Err(e) => warn!(error = %e, "could not build QiYi acknowledgement"),
        }
    }
}

impl CubeProtocol for QiYiProtocol {
    fn model(&self) -> DeviceModel {
        DeviceModel::QiYi
    }

    fn handshake(&mut self) -> Result<Vec<Vec<u8>>, FrameError> {
        let Some(cipher) = &self.cipher else {
            return Ok(Vec::new());
        };
        Ok(vec![seal_frame(cipher, &hello_content(&self.address))?])
    }

    fn on_notification(&mut self, raw: &[u8]) -> NotificationOutcome {
        let mut outcome = NotificationOutcome::default();
        let Some(cipher) = &self.cipher else {
            debug!("QiYi adapter released; ignoring notification");
            return outcome;
        };

        let msg = match open_frame(cipher, raw) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, len = raw.len(), "discarding QiYi notification");
                return outcome;
            }
        };
        if msg[0] != FRAME_START {
            warn!(start = msg[0], "QiYi frame has unexpected start byte");
        }

        let message = match QiYiMessage::parse(&msg) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "discarding malformed QiYi frame");
                return outcome;
            }
        };

        match message {
            QiYiMessage::Hello {
                timestamp,
                battery,
                facelets,
            } => {
                Self::acknowledge(cipher, &msg, &mut outcome);
                info!(battery = ?battery, "QiYi cube hello");
                self.battery = battery.or(self.battery);
                self.facelets = facelets.or(self.facelets.take());
                self.reconciler.observe(timestamp);
            }
            QiYiMessage::StateChange {
                history, facelets, ..
            } => {
                Self::acknowledge(cipher, &msg, &mut outcome);
                if facelets.is_some() {
                    self.facelets = facelets;
                }
                outcome.moves = self.reconciler.reconcile(&history).events;
            }
            QiYiMessage::Other { opcode } => {
                debug!(opcode, "ignoring QiYi opcode");
            }
        }
        outcome
    }

    fn battery_level(&self) -> Option<u8> {
        self.battery
    }

    fn facelets(&self) -> Option<&str> {
        self.facelets.as_deref()
    }

    fn release(&mut self) {
        // Dropping the cipher wipes its round keys.
        self.cipher = None;
        self.reconciler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::protocol::frame::FRAME_OVERHEAD;

    fn address() -> HardwareAddress {
        DeviceModel::QiYi
            .address_from_name("QY-QYSC-S-1234")
            .unwrap()
    }

    fn cipher() -> Aes128 {
        Aes128::new(&qiyi_key().unwrap())
    }

    /// Builds an encrypted state-change notification.  `slots` fill history
    /// slot k = 1, 2, ... in order.
    fn state_change(ts: u32, latest: u8, slots: &[(u32, u8)]) -> Vec<u8> {
        let mut content = vec![0u8; 90];
        content[0] = 0x03;
        content[1..5].copy_from_slice(&ts.to_be_bytes());
        content[32] = latest;
        for (i, &(slot_ts, mv)) in slots.iter().enumerate() {
            let off = 91 - 5 * (i + 1) - 2;
            content[off..off + 4].copy_from_slice(&slot_ts.to_be_bytes());
            content[off + 4] = mv;
        }
        seal_frame(&cipher(), &content).unwrap()
    }

    fn hello(ts: u32, battery: u8) -> Vec<u8> {
        let mut content = vec![0u8; 34];
        content[0] = 0x02;
        content[1..5].copy_from_slice(&ts.to_be_bytes());
        content[33] = battery;
        seal_frame(&cipher(), &content).unwrap()
    }

    fn tokens(outcome: &NotificationOutcome) -> Vec<String> {
        outcome.moves.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_handshake_is_single_hello_frame() {
        // Arrange
        let mut protocol = QiYiProtocol::new(address()).unwrap();

        // Act
        let frames = protocol.handshake().unwrap();

        // Assert
        assert_eq!(frames.len(), 1);
        let opened = open_frame(&cipher(), &frames[0]).unwrap();
        assert_eq!(&opened[2..4], &[0x00, 0x6B]);
    }

    #[test]
    fn test_hello_is_acknowledged_and_sets_baseline() {
        // Arrange
        let mut protocol = QiYiProtocol::new(address()).unwrap();

        // Act
        let outcome = protocol.on_notification(&hello(500, 76));

        // Assert
        assert!(outcome.moves.is_empty());
        assert_eq!(outcome.replies.len(), 1);
        let ack = open_frame(&cipher(), &outcome.replies[0]).unwrap();
        assert_eq!(ack.len(), 5 + FRAME_OVERHEAD);
        assert_eq!(&ack[2..7], &[0x02, 0x00, 0x00, 0x01, 0xF4]);
        assert_eq!(protocol.battery_level(), Some(76));
        assert_eq!(protocol.last_timestamp(), Some(Timestamp(500)));
    }

    #[test]
    fn test_state_change_is_acknowledged_and_reconciled() {
        // Arrange
        let mut protocol = QiYiProtocol::new(address()).unwrap();
        protocol.on_notification(&hello(100, 50));

        // Act – R at 200 was lost, F arrives at 300
        let outcome = protocol.on_notification(&state_change(300, 10, &[(200, 4), (100, 2)]));

        // Assert
        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(tokens(&outcome), ["R", "F"]);
        assert_eq!(protocol.last_timestamp(), Some(Timestamp(300)));
    }

    #[test]
    fn test_first_state_change_without_hello_emits_latest_only() {
        let mut protocol = QiYiProtocol::new(address()).unwrap();

        let outcome = protocol.on_notification(&state_change(300, 8, &[(200, 4), (100, 2)]));

        assert_eq!(tokens(&outcome), ["U"]);
    }

    #[test]
    fn test_duplicate_state_change_emits_nothing_but_is_acknowledged() {
        let mut protocol = QiYiProtocol::new(address()).unwrap();
        protocol.on_notification(&hello(100, 50));
        let frame = state_change(300, 10, &[(100, 2)]);

        protocol.on_notification(&frame);
        let again = protocol.on_notification(&frame);

        assert!(again.moves.is_empty());
        assert_eq!(again.replies.len(), 1);
    }

    #[test]
    fn test_invalid_move_code_is_never_forwarded() {
        let mut protocol = QiYiProtocol::new(address()).unwrap();
        protocol.on_notification(&hello(100, 50));

        let outcome = protocol.on_notification(&state_change(300, 13, &[(200, 4), (100, 2)]));

        assert_eq!(tokens(&outcome), ["R"]);
        assert_eq!(protocol.last_timestamp(), Some(Timestamp(300)));
    }

    #[test]
    fn test_corrupted_notifications_are_discarded_without_touching_state() {
        // Arrange
        let mut protocol = QiYiProtocol::new(address()).unwrap();
        protocol.on_notification(&hello(100, 50));
        let mut corrupted = state_change(300, 10, &[]);
        corrupted[20] ^= 0xFF;

        // Act
        let short = protocol.on_notification(&[0xFE, 0x01]);
        let unaligned = protocol.on_notification(&[0u8; 17]);
        let bad_crc = protocol.on_notification(&corrupted);

        // Assert
        for outcome in [short, unaligned, bad_crc] {
            assert_eq!(outcome, NotificationOutcome::default());
        }
        assert_eq!(protocol.last_timestamp(), Some(Timestamp(100)));
    }

    #[test]
    fn test_unknown_opcode_is_ignored() {
        let mut protocol = QiYiProtocol::new(address()).unwrap();
        let raw = seal_frame(&cipher(), &[0x09, 0, 0, 0, 1]).unwrap();

        let outcome = protocol.on_notification(&raw);

        assert_eq!(outcome, NotificationOutcome::default());
        assert_eq!(protocol.last_timestamp(), None);
    }

    #[test]
    fn test_release_stops_processing() {
        let mut protocol = QiYiProtocol::new(address()).unwrap();
        protocol.release();

        assert_eq!(
            protocol.on_notification(&hello(100, 50)),
            NotificationOutcome::default()
        );
        assert!(protocol.handshake().unwrap().is_empty());
    }
}
