//! Move vocabulary.
//!
//! A move is a face plus a turn direction, written in the usual notation:
//! the face letter, then `'` for counter-clockwise or `2` for a half turn.
//! `R`, `U'` and `F2` are all moves.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One of the six faces of the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    U,
    R,
    F,
    D,
    L,
    B,
}

impl Face {
    /// All faces in `URFDLB` order.
    pub const ALL: [Face; 6] = [Face::U, Face::R, Face::F, Face::D, Face::L, Face::B];

    /// The face letter used in move notation.
    pub fn letter(self) -> char {
        match self {
            Face::U => 'U',
            Face::R => 'R',
            Face::F => 'F',
            Face::D => 'D',
            Face::L => 'L',
            Face::B => 'B',
        }
    }

    /// Parses a face letter.  Only upper-case letters are accepted.
    pub fn from_letter(letter: char) -> Option<Face> {
        Face::ALL.into_iter().find(|f| f.letter() == letter)
    }
}

/// Direction of a face turn, seen looking at the face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Turn {
    Clockwise,
    CounterClockwise,
    Double,
}

impl Turn {
    /// Suffix appended to the face letter: nothing, `'`, or `2`.
    pub fn suffix(self) -> &'static str {
        match self {
            Turn::Clockwise => "",
            Turn::CounterClockwise => "'",
            Turn::Double => "2",
        }
    }
}

/// A single face turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub face: Face,
    pub turn: Turn,
}

impl Move {
    pub const fn new(face: Face, turn: Turn) -> Self {
        Self { face, turn }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.face.letter(), self.turn.suffix())
    }
}

/// Error returned when a move token cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid move token {0:?}")]
pub struct MoveParseError(pub String);

impl FromStr for Move {
    type Err = MoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MoveParseError(s.to_string());
        let mut chars = s.chars();
        let face = chars.next().and_then(Face::from_letter).ok_or_else(err)?;
        let turn = match chars.as_str() {
            "" => Turn::Clockwise,
            "'" => Turn::CounterClockwise,
            "2" => Turn::Double,
            _ => return Err(err()),
        };
        Ok(Move::new(face, turn))
    }
}

/// A reconciled move, ready for the move sink.
///
/// `marker` is the device-local ordering value the move was reported with: a
/// millisecond timestamp on QiYi devices, an 8-bit counter on MoYu32 devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEvent {
    pub mv: Move,
    pub marker: u32,
}

impl fmt::Display for MoveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.mv.fmt(f)
    }
}
