//! Decoder for LZ-string "encoded URI component" text.
//!
//! The vendor key literals ship as LZ-string compressed JSON arrays using the
//! URI-safe alphabet.  Only decompression is needed here; the literals are
//! never re-compressed.
//!
//! The stream is a sequence of variable-width codes packed 6 bits per input
//! character, least significant bit of each code first.  Codes 0 and 1
//! introduce a new literal character (8 or 16 bits wide), code 2 ends the
//! stream, and every other code indexes the dictionary built so far.

use thiserror::Error;

/// The URI-safe LZ-string alphabet.  Only the first 64 characters carry
/// 6-bit values in practice; `$` at index 64 completes the upstream table.
const URI_ALPHABET: &[u8; 65] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+-$";

/// Each input character carries 6 bits; reading starts at the top one.
const FIRST_BIT: u32 = 32;

/// Errors produced while decompressing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LzStringError {
    #[error("character {0:?} is not in the URI alphabet")]
    InvalidCharacter(char),
    #[error("compressed stream ended before the end marker")]
    Truncated,
    #[error("dictionary code {0} is out of range")]
    InvalidCode(usize),
    #[error("decoded code unit 0x{0:04X} is not a valid character")]
    InvalidCodeUnit(u32),
}

/// Decompresses an LZ-string `compressToEncodedURIComponent` payload.
///
/// # Errors
///
/// Returns [`LzStringError`] for characters outside the alphabet, streams that
/// stop before their end marker, and references to unknown dictionary codes.
pub fn decompress_from_encoded_uri_component(input: &str) -> Result<String, LzStringError> {
    let values = input
        .chars()
        .map(|c| {
            // Spaces appear when '+' survives a form-encoding round trip.
            let c = if c == ' ' { '+' } else { c };
            URI_ALPHABET
                .iter()
                .position(|&a| a as char == c)
                .map(|p| p as u32)
                .ok_or(LzStringError::InvalidCharacter(c))
        })
        .collect::<Result<Vec<u32>, _>>()?;

    if values.is_empty() {
        return Ok(String::new());
    }

    decompress(&values)
}

struct BitStream<'a> {
    values: &'a [u32],
    index: usize,
    current: u32,
    position: u32,
}

impl<'a> BitStream<'a> {
    fn new(values: &'a [u32]) -> Self {
        Self {
            values,
            index: 1,
            current: values[0],
            position: FIRST_BIT,
        }
    }

    fn read(&mut self, width: u32) -> u32 {
        let mut bits = 0;
        for shift in 0..width {
            let bit = self.current & self.position;
            self.position >>= 1;
            if self.position == 0 {
                self.position = FIRST_BIT;
                // Reading past the end yields zero bits; the caller detects
                // truncation through `exhausted`.
                self.current = self.values.get(self.index).copied().unwrap_or(0);
                self.index += 1;
            }
            if bit != 0 {
                bits |= 1 << shift;
            }
        }
        bits
    }

    fn exhausted(&self) -> bool {
        self.index > self.values.len()
    }
}

fn to_char(unit: u32) -> Result<char, LzStringError> {
    char::from_u32(unit).ok_or(LzStringError::InvalidCodeUnit(unit))
}

fn decompress(values: &[u32]) -> Result<String, LzStringError> {
    let mut stream = BitStream::new(values);

    // Codes 0, 1 and 2 are reserved, so real entries start at index 3.
    let mut dictionary: Vec<String> = vec![String::new(); 3];
    let mut enlarge_in: u32 = 4;
    let mut num_bits: u32 = 3;

    let first = match stream.read(2) {
        0 => to_char(stream.read(8))?,
        1 => to_char(stream.read(16))?,
        2 => return Ok(String::new()),
        other => return Err(LzStringError::InvalidCode(other as usize)),
    };
    dictionary.push(first.to_string());
    let mut previous = first.to_string();
    let mut output = previous.clone();

    loop {
        if stream.exhausted() {
            return Err(LzStringError::Truncated);
        }

        let mut code = stream.read(num_bits) as usize;
        match code {
            0 | 1 => {
                let width = if code == 0 { 8 } else { 16 };
                dictionary.push(to_char(stream.read(width))?.to_string());
                code = dictionary.len() - 1;
                enlarge_in -= 1;
            }
            2 => return Ok(output),
            _ => {}
        }

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }

        let entry = if code < dictionary.len() {
            dictionary[code].clone()
        } else if code == dictionary.len() {
            // The "cScSc" case: the entry being defined refers to itself.
            let mut entry = previous.clone();
            entry.extend(previous.chars().next());
            entry
        } else {
            return Err(LzStringError::InvalidCode(code));
        };
        output.push_str(&entry);

        let mut new_entry = previous;
        new_entry.extend(entry.chars().next());
        dictionary.push(new_entry);
        enlarge_in -= 1;
        previous = entry;

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }
    }
}
