//! QiYi message layout.
//!
//! QiYi frames use the standard [`frame`](super::frame) envelope, encrypted
//! block by block with the static QiYi key.  Once opened, a frame looks like:
//!
//! ```text
//! offset  0     1     2       3..7          7..34        34     35
//!        [FE] [len] [op] [timestamp BE] [facelets]  [move] [battery] ...
//!
//! state-change frames also carry nine history slots ending at offset 91:
//!         slot k (k = 1..9) at 91 - 5k: [timestamp BE:4][move:1]
//! ```
//!
//! Every hello and state-change frame must be acknowledged by echoing bytes
//! `2..7` (opcode + timestamp) back in a new frame.

use crate::domain::device::HardwareAddress;
use crate::domain::moves::{Face, Move, Turn};
use crate::domain::reconcile::{HistoryEntry, Timestamp};
use crate::protocol::frame::FrameError;

/// Cube hello, sent once after our own hello.
pub const OPCODE_HELLO: u8 = 0x02;

/// A face was turned.
pub const OPCODE_STATE_CHANGE: u8 = 0x03;

/// Number of history slots carried by a state-change frame.
pub const HISTORY_SLOTS: usize = 9;

/// The latest move plus its history slots.
pub const RECONCILE_WINDOW: usize = HISTORY_SLOTS + 1;

const HELLO_PREFIX: [u8; 11] = [
    0x00, 0x6B, 0x01, 0x00, 0x00, 0x22, 0x06, 0x00, 0x02, 0x08, 0x00,
];

const ACK_RANGE: std::ops::Range<usize> = 2..7;
const FACELETS_RANGE: std::ops::Range<usize> = 7..34;
const LATEST_MOVE_AT: usize = 34;
const BATTERY_AT: usize = 35;
const HISTORY_END: usize = 91;

const FACELET_COLOURS: &[u8; 6] = b"LRDUFB";

/// Maps a QiYi move code to a move.  Codes `1..=12` are valid; anything else
/// returns `None`.
pub fn decode_move(code: u8) -> Option<Move> {
    let face = match code {
        1 | 2 => Face::L,
        3 | 4 => Face::R,
        5 | 6 => Face::D,
        7 | 8 => Face::U,
        9 | 10 => Face::F,
        11 | 12 => Face::B,
        _ => return None,
    };
    let turn = if code % 2 == 1 {
        Turn::CounterClockwise
    } else {
        Turn::Clockwise
    };
    Some(Move::new(face, turn))
}

/// Content of our hello frame: a fixed prefix followed by the hardware
/// address, least significant byte first.
pub fn hello_content(address: &HardwareAddress) -> Vec<u8> {
    let mut content = HELLO_PREFIX.to_vec();
    content.extend_from_slice(&address.reversed());
    content
}

/// Content of the acknowledgement for an opened frame (`msg[2..7]`).
pub fn ack_content(msg: &[u8]) -> Option<&[u8]> {
    msg.get(ACK_RANGE)
}

/// Decodes the 54-sticker state packed two per byte, low nibble first.
///
/// Returns `None` if `packed` is shorter than 27 bytes or holds a nibble that
/// is not a colour.
pub fn decode_facelets(packed: &[u8]) -> Option<String> {
    let packed = packed.get(..27)?;
    (0..54)
        .map(|i| {
            let nibble = (packed[i >> 1] >> ((i % 2) << 2)) & 0x0F;
            FACELET_COLOURS.get(usize::from(nibble)).map(|&c| char::from(c))
        })
        .collect()
}

/// An opened QiYi frame, classified by opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QiYiMessage {
    Hello {
        timestamp: Timestamp,
        battery: Option<u8>,
        facelets: Option<String>,
    },
    StateChange {
        timestamp: Timestamp,
        /// Latest move first, then the history slots from newest to oldest.
        history: Vec<HistoryEntry<Timestamp>>,
        facelets: Option<String>,
    },
    Other {
        opcode: u8,
    },
}

impl QiYiMessage {
    /// Classifies an opened frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooShort`] if a hello or state-change frame is too
    /// short for the fields it must carry.
    pub fn parse(msg: &[u8]) -> Result<Self, FrameError> {
        let opcode = *msg.get(2).ok_or(FrameError::TooShort {
            needed: 3,
            available: msg.len(),
        })?;

        match opcode {
            OPCODE_HELLO => Ok(QiYiMessage::Hello {
                timestamp: timestamp_at(msg, 3)?,
                battery: msg.get(BATTERY_AT).copied(),
                facelets: msg.get(FACELETS_RANGE).and_then(decode_facelets),
            }),
            OPCODE_STATE_CHANGE => {
                let timestamp = timestamp_at(msg, 3)?;
                let latest = *msg.get(LATEST_MOVE_AT).ok_or(FrameError::TooShort {
                    needed: LATEST_MOVE_AT + 1,
                    available: msg.len(),
                })?;

                let mut history = Vec::with_capacity(RECONCILE_WINDOW);
                history.push(entry(latest, timestamp));
                for k in 1..=HISTORY_SLOTS {
                    let off = HISTORY_END - 5 * k;
                    let (Ok(ts), Some(&code)) = (timestamp_at(msg, off), msg.get(off + 4)) else {
                        break;
                    };
                    history.push(entry(code, ts));
                }

                Ok(QiYiMessage::StateChange {
                    timestamp,
                    history,
                    facelets: msg.get(FACELETS_RANGE).and_then(decode_facelets),
                })
            }
            other => Ok(QiYiMessage::Other { opcode: other }),
        }
    }
}

fn entry(code: u8, marker: Timestamp) -> HistoryEntry<Timestamp> {
    HistoryEntry {
        mv: decode_move(code),
        code,
        marker,
    }
}

fn timestamp_at(msg: &[u8], off: usize) -> Result<Timestamp, FrameError> {
    let bytes: [u8; 4] = msg
        .get(off..off + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or(FrameError::TooShort {
            needed: off + 4,
            available: msg.len(),
        })?;
    Ok(Timestamp(u32::from_be_bytes(bytes)))
}
