//! MoYu32 message layout.
//!
//! MoYu32 messages are fixed 20-byte buffers protected by head/tail
//! [`whitening`](super::whitening).  There is no start byte, length byte, or
//! CRC.  The first byte is the opcode; the remaining fields are packed at bit
//! offsets and read MSB-first with [`BitReader`].
//!
//! | opcode | meaning        | fields                                         |
//! |--------|----------------|------------------------------------------------|
//! | 161    | hardware info  | logged only                                    |
//! | 163    | status         | move counter at bits `[152,160)`               |
//! | 164    | power          | battery level at bits `[8,16)`                 |
//! | 165    | move           | counter at `[88,96)`, five 5-bit move slots    |
//! |        |                | at `[96 + 5i, 101 + 5i)`, newest first         |
//! | 171    | gyro           | ignored                                        |
//!
//! Move slot codes index `"FBUDLR"` with their upper bits; the low bit is set
//! for a counter-clockwise turn.  Codes 12 and above are invalid.

use crate::domain::moves::{Face, Move, Turn};
use crate::domain::reconcile::{HistoryEntry, WrappingCounter};
use crate::protocol::bits::BitReader;
use crate::protocol::frame::FrameError;

/// Length of every request and notification.
pub const MESSAGE_LEN: usize = 20;

pub const OPCODE_INFO: u8 = 161;
pub const OPCODE_STATUS: u8 = 163;
pub const OPCODE_POWER: u8 = 164;
pub const OPCODE_MOVE: u8 = 165;
pub const OPCODE_GYRO: u8 = 171;

/// Number of move slots in a move frame.
pub const MOVE_SLOTS: usize = 5;

const SLOT_FACES: [Face; 6] = [Face::F, Face::B, Face::U, Face::D, Face::L, Face::R];

const STATUS_COUNTER_AT: usize = 152;
const MOVE_COUNTER_AT: usize = 88;
const MOVE_SLOTS_AT: usize = 96;
const SLOT_WIDTH: usize = 5;
const BATTERY_AT: usize = 8;

/// Builds a plaintext request: the opcode followed by zero bytes.
pub fn request(opcode: u8) -> [u8; MESSAGE_LEN] {
    let mut req = [0u8; MESSAGE_LEN];
    req[0] = opcode;
    req
}

/// The requests sent right after subscribing: info, status, power.
pub fn handshake_requests() -> [[u8; MESSAGE_LEN]; 3] {
    [
        request(OPCODE_INFO),
        request(OPCODE_STATUS),
        request(OPCODE_POWER),
    ]
}

/// Maps a 5-bit slot code to a move.  Codes `0..12` are valid.
pub fn decode_move(code: u8) -> Option<Move> {
    let face = *SLOT_FACES.get(usize::from(code >> 1))?;
    let turn = if code & 1 == 1 {
        Turn::CounterClockwise
    } else {
        Turn::Clockwise
    };
    Some(Move::new(face, turn))
}

/// A decrypted MoYu32 message, classified by opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoYuMessage {
    Info,
    Status {
        counter: WrappingCounter,
    },
    Power {
        battery: u8,
    },
    Move {
        counter: WrappingCounter,
        /// Slot 0 (the move this frame was sent for) first.
        history: Vec<HistoryEntry<WrappingCounter>>,
    },
    Gyro,
    Other {
        opcode: u8,
    },
}

impl MoYuMessage {
    /// Classifies a decrypted message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooShort`] if the buffer is too short for the
    /// fields its opcode carries.
    pub fn parse(msg: &[u8]) -> Result<Self, FrameError> {
        let bits = BitReader::new(msg);
        let opcode = field(&bits, 0, 8)?;

        Ok(match opcode {
            OPCODE_INFO => MoYuMessage::Info,
            OPCODE_STATUS => MoYuMessage::Status {
                counter: WrappingCounter(field(&bits, STATUS_COUNTER_AT, 8)?),
            },
            OPCODE_POWER => MoYuMessage::Power {
                battery: field(&bits, BATTERY_AT, 8)?,
            },
            OPCODE_MOVE => {
                let counter = WrappingCounter(field(&bits, MOVE_COUNTER_AT, 8)?);
                let history = (0..MOVE_SLOTS)
                    .map(|i| {
                        let code = field(&bits, MOVE_SLOTS_AT + SLOT_WIDTH * i, SLOT_WIDTH)?;
                        Ok(HistoryEntry {
                            mv: decode_move(code),
                            code,
                            marker: WrappingCounter(counter.0.wrapping_sub(i as u8)),
                        })
                    })
                    .collect::<Result<Vec<_>, FrameError>>()?;
                MoYuMessage::Move { counter, history }
            }
            OPCODE_GYRO => MoYuMessage::Gyro,
            other => MoYuMessage::Other { opcode: other },
        })
    }
}

fn field(bits: &BitReader<'_>, start: usize, width: usize) -> Result<u8, FrameError> {
    bits.read_u8(start, width).ok_or(FrameError::TooShort {
        needed: (start + width).div_ceil(8),
        available: bits.len_bits() / 8,
    })
}
