//! MoYu32 protocol adapter.
//!
//! MoYu32 cubes use a per-device key and IV derived from their hardware
//! address, fixed 20-byte messages, and an 8-bit move counter for ordering.
//!
//! # Counter baseline
//!
//! Move frames only say "the counter is now N, and these were the last five
//! moves".  Without knowing the counter value before the frame, there is no
//! way to tell how many of those five are new.  So the adapter:
//!
//! 1. Asks for status (opcode 163) during the handshake, and again on every
//!    notification until a status reply arrives.
//! 2. Ignores move frames until a status frame has set the baseline.
//! 3. Skips a move frame entirely if any of its slots holds an invalid code,
//!    leaving the baseline where it was.

use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use cube_core::cipher::keys::{derive_key_iv, moyu32_base_iv, moyu32_base_key};
use cube_core::cipher::{KeyError, BLOCK_SIZE};
use cube_core::protocol::moyu32::{
    handshake_requests, request, MoYuMessage, MESSAGE_LEN, MOVE_SLOTS, OPCODE_STATUS,
};
use cube_core::protocol::whitening::{whiten_decrypt, whiten_encrypt};
use cube_core::{
    Aes128, DeviceModel, FrameError, HardwareAddress, Reconciler, WrappingCounter,
};

use super::protocol::{CubeProtocol, NotificationOutcome};

#[derive(Zeroize, ZeroizeOnDrop)]
struct SessionKeys {
    cipher: Aes128,
    iv: [u8; BLOCK_SIZE],
}

impl SessionKeys {
    fn encode(&self, plain: &[u8; MESSAGE_LEN]) -> Result<Vec<u8>, FrameError> {
        let mut buf = plain.to_vec();
        whiten_encrypt(&self.cipher, &self.iv, &mut buf)?;
        Ok(buf)
    }

    fn decode(&self, raw: &[u8]) -> Result<Vec<u8>, FrameError> {
        let mut buf = raw.to_vec();
        whiten_decrypt(&self.cipher, &self.iv, &mut buf)?;
        Ok(buf)
    }
}

/// Adapter for MoYu32 cubes.
pub struct MoYu32Protocol {
    keys: Option<SessionKeys>,
    reconciler: Reconciler<WrappingCounter>,
    battery: Option<u8>,
}

impl MoYu32Protocol {
    /// Creates the adapter, deriving the key and IV from `address`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if a base key literal cannot be decoded.
    pub fn new(address: HardwareAddress) -> Result<Self, KeyError> {
        let derived = derive_key_iv(&moyu32_base_key()?, &moyu32_base_iv()?, address.bytes());
        debug!(%address, "derived MoYu32 session key");
        Ok(Self {
            keys: Some(SessionKeys {
                cipher: Aes128::new(&derived.key),
                iv: derived.iv,
            }),
            reconciler: Reconciler::new(MOVE_SLOTS),
            battery: None,
        })
    }

    /// The move counter baseline, once a status frame has set it.
    pub fn counter(&self) -> Option<WrappingCounter> {
        self.reconciler.last_observed()
    }
}

impl CubeProtocol for MoYu32Protocol {
    fn model(&self) -> DeviceModel {
        DeviceModel::MoYu32
    }

    fn handshake(&mut self) -> Result<Vec<Vec<u8>>, FrameError> {
        let Some(keys) = &self.keys else {
            return Ok(Vec::new());
        };
        handshake_requests().iter().map(|r| keys.encode(r)).collect()
    }

    fn on_notification(&mut self, raw: &[u8]) -> NotificationOutcome {
        let mut outcome = NotificationOutcome::default();
        let Some(keys) = &self.keys else {
            debug!("MoYu32 adapter released; ignoring notification");
            return outcome;
        };

        let baseline = self.reconciler.last_observed();
        if baseline.is_none() {
            match keys.encode(&request(OPCODE_STATUS)) {
                Ok(frame) => outcome.replies.push(frame),
                Err(e) => warn!(error = %e, "could not build MoYu32 status request"),
            }
        }

        let message = match keys.decode(raw).and_then(|msg| MoYuMessage::parse(&msg)) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, len = raw.len(), "discarding MoYu32 notification");
                return outcome;
            }
        };

        match message {
            MoYuMessage::Info => info!("MoYu32 hardware info received"),
            MoYuMessage::Status { counter } => {
                debug!(counter = counter.0, "MoYu32 status");
                self.reconciler.observe(counter);
            }
            MoYuMessage::Power { battery } => {
                info!(battery, "MoYu32 battery level");
                self.battery = Some(battery);
            }
            MoYuMessage::Move { counter, history } => {
                if baseline.is_none() {
                    debug!(counter = counter.0, "no status yet; ignoring MoYu32 move frame");
                } else if let Some(bad) = history.iter().find(|e| e.mv.is_none()) {
                    warn!(code = bad.code, "invalid MoYu32 move code; skipping frame");
                } else {
                    outcome.moves = self.reconciler.reconcile(&history).events;
                }
            }
            MoYuMessage::Gyro => {}
            MoYuMessage::Other { opcode } => debug!(opcode, "ignoring MoYu32 opcode"),
        }
        outcome
    }

    fn battery_level(&self) -> Option<u8> {
        self.battery
    }

    fn release(&mut self) {
        self.keys = None;
        self.reconciler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::protocol::moyu32::{OPCODE_INFO, OPCODE_MOVE, OPCODE_POWER};

    const NAME: &str = "WCU_MY32_ABCD";

    fn protocol() -> MoYu32Protocol {
        let address = DeviceModel::MoYu32.address_from_name(NAME).unwrap();
        MoYu32Protocol::new(address).unwrap()
    }

    fn put_bits(buf: &mut [u8], start: usize, width: usize, value: u8) {
        for i in 0..width {
            if (value >> (width - 1 - i)) & 1 == 1 {
                let pos = start + i;
                buf[pos / 8] |= 0x80 >> (pos % 8);
            }
        }
    }

    fn encrypt(p: &MoYu32Protocol, plain: &[u8; MESSAGE_LEN]) -> Vec<u8> {
        p.keys.as_ref().unwrap().encode(plain).unwrap()
    }

    fn status(p: &MoYu32Protocol, counter: u8) -> Vec<u8> {
        let mut msg = request(OPCODE_STATUS);
        put_bits(&mut msg, 152, 8, counter);
        encrypt(p, &msg)
    }

    fn moves(p: &MoYu32Protocol, counter: u8, codes: [u8; 5]) -> Vec<u8> {
        let mut msg = request(OPCODE_MOVE);
        put_bits(&mut msg, 88, 8, counter);
        for (i, code) in codes.into_iter().enumerate() {
            put_bits(&mut msg, 96 + 5 * i, 5, code);
        }
        encrypt(p, &msg)
    }

    fn tokens(outcome: &NotificationOutcome) -> Vec<String> {
        outcome.moves.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_handshake_sends_info_status_power() {
        // Arrange
        let mut p = protocol();

        // Act
        let frames = p.handshake().unwrap();

        // Assert
        assert_eq!(frames.len(), 3);
        let opcodes: Vec<u8> = frames
            .iter()
            .map(|f| p.keys.as_ref().unwrap().decode(f).unwrap()[0])
            .collect();
        assert_eq!(opcodes, [OPCODE_INFO, OPCODE_STATUS, OPCODE_POWER]);
        assert!(frames.iter().all(|f| f.len() == MESSAGE_LEN));
    }

    #[test]
    fn test_moves_ignored_until_status_and_status_requested() {
        // Arrange
        let mut p = protocol();

        // Act
        let outcome = p.on_notification(&moves(&p, 5, [10, 0, 0, 0, 0]));

        // Assert
        assert!(outcome.moves.is_empty());
        assert_eq!(outcome.replies.len(), 1, "status re-requested");
        let req = p.keys.as_ref().unwrap().decode(&outcome.replies[0]).unwrap();
        assert_eq!(req[0], OPCODE_STATUS);
        assert_eq!(p.counter(), None);
    }

    #[test]
    fn test_status_sets_baseline_and_stops_requests() {
        let mut p = protocol();

        let first = p.on_notification(&status(&p, 40));
        let second = p.on_notification(&status(&p, 40));

        assert_eq!(first.replies.len(), 1);
        assert!(second.replies.is_empty());
        assert_eq!(p.counter(), Some(WrappingCounter(40)));
    }

    #[test]
    fn test_move_frame_emits_new_moves_oldest_first() {
        // Arrange – baseline 40, counter jumps to 42: slots 0 (R) and 1 (U')
        let mut p = protocol();
        p.on_notification(&status(&p, 40));

        // Act
        let outcome = p.on_notification(&moves(&p, 42, [10, 5, 0, 0, 0]));

        // Assert
        assert_eq!(tokens(&outcome), ["U'", "R"]);
        assert_eq!(p.counter(), Some(WrappingCounter(42)));
    }

    #[test]
    fn test_move_frame_with_same_counter_emits_nothing() {
        let mut p = protocol();
        p.on_notification(&status(&p, 40));

        let outcome = p.on_notification(&moves(&p, 40, [10, 5, 0, 0, 0]));

        assert!(outcome.moves.is_empty());
    }

    #[test]
    fn test_gap_beyond_five_slots_is_capped() {
        let mut p = protocol();
        p.on_notification(&status(&p, 250));

        // 250 → 10 is a gap of 16 across the wrap; only five slots exist.
        let outcome = p.on_notification(&moves(&p, 10, [0, 2, 4, 6, 8]));

        assert_eq!(tokens(&outcome), ["L", "D", "U", "B", "F"]);
        assert_eq!(p.counter(), Some(WrappingCounter(10)));
    }

    #[test]
    fn test_invalid_slot_skips_frame_and_keeps_baseline() {
        let mut p = protocol();
        p.on_notification(&status(&p, 40));

        let outcome = p.on_notification(&moves(&p, 41, [10, 14, 0, 0, 0]));

        assert!(outcome.moves.is_empty());
        assert_eq!(p.counter(), Some(WrappingCounter(40)));
    }

    #[test]
    fn test_power_frame_sets_battery() {
        let mut p = protocol();
        let mut msg = request(OPCODE_POWER);
        msg[1] = 64;

        p.on_notification(&encrypt(&p, &msg));

        assert_eq!(p.battery_level(), Some(64));
    }

    #[test]
    fn test_short_notification_is_discarded() {
        let mut p = protocol();
        p.on_notification(&status(&p, 1));

        let outcome = p.on_notification(&[0u8; 8]);

        assert_eq!(outcome, NotificationOutcome::default());
        assert_eq!(p.counter(), Some(WrappingCounter(1)));
    }

    #[test]
    fn test_release_wipes_keys() {
        let mut p = protocol();
        p.release();

        assert!(p.keys.is_none());
        assert!(p.handshake().unwrap().is_empty());
        assert_eq!(p.counter(), None);
    }
}
