//! 16-byte block cipher (AES-128 compatible) used by both device families.
//!
//! # How the cipher is organised (for beginners)
//!
//! The cipher is a *substitution-permutation network*: every round replaces
//! each byte through a fixed 256-entry lookup table (the S-box), shuffles the
//! byte positions (shift rows), mixes the four bytes of each column together
//! (mix columns), and XORs in a 16-byte *round key*.
//!
//! The 16-byte user key is stretched into eleven round keys (176 bytes) once,
//! when [`Aes128::new`] is called.  After that, encrypting or decrypting a
//! block is just table lookups and XORs.
//!
//! The implementation fuses "add round key → substitute → shift" into a single
//! pass over the block using a precomputed position table, which is why the
//! shift table below is stored in its *inverse* order.
//!
//! # Contract
//!
//! Blocks and keys are `[u8; 16]`, so a wrong size is a compile error rather
//! than a runtime failure.  There is no error path.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Length of the expanded key schedule: 11 round keys of 16 bytes.
pub const EXPANDED_KEY_LEN: usize = 176;

const ROUNDS: usize = 10;

// ── Load-bearing tables ───────────────────────────────────────────────────────

const SBOX: [u8; 256] = [
    99, 124, 119, 123, 242, 107, 111, 197, 48, 1, 103, 43, 254, 215, 171, 118, 202, 130, 201, 125,
    250, 89, 71, 240, 173, 212, 162, 175, 156, 164, 114, 192, 183, 253, 147, 38, 54, 63, 247, 204,
    52, 165, 229, 241, 113, 216, 49, 21, 4, 199, 35, 195, 24, 150, 5, 154, 7, 18, 128, 226, 235,
    39, 178, 117, 9, 131, 44, 26, 27, 110, 90, 160, 82, 59, 214, 179, 41, 227, 47, 132, 83, 209,
    0, 237, 32, 252, 177, 91, 106, 203, 190, 57, 74, 76, 88, 207, 208, 239, 170, 251, 67, 77, 51,
    133, 69, 249, 2, 127, 80, 60, 159, 168, 81, 163, 64, 143, 146, 157, 56, 245, 188, 182, 218,
    33, 16, 255, 243, 210, 205, 12, 19, 236, 95, 151, 68, 23, 196, 167, 126, 61, 100, 93, 25, 115,
    96, 129, 79, 220, 34, 42, 144, 136, 70, 238, 184, 20, 222, 94, 11, 219, 224, 50, 58, 10, 73,
    6, 36, 92, 194, 211, 172, 98, 145, 149, 228, 121, 231, 200, 55, 109, 141, 213, 78, 169, 108,
    86, 244, 234, 101, 122, 174, 8, 186, 120, 37, 46, 28, 166, 180, 198, 232, 221, 116, 31, 75,
    189, 139, 138, 112, 62, 181, 102, 72, 3, 246, 14, 97, 53, 87, 185, 134, 193, 29, 158, 225,
    248, 152, 17, 105, 217, 142, 148, 155, 30, 135, 233, 206, 85, 40, 223, 140, 161, 137, 13, 191,
    230, 66, 104, 65, 153, 45, 15, 176, 84, 187, 22,
];

const INV_SBOX: [u8; 256] = invert_sbox(&SBOX);

/// Byte `i` of the state moves to position `SHIFT_TAB_INV[i]` during
/// encryption and is read back from there during decryption.
const SHIFT_TAB_INV: [usize; BLOCK_SIZE] = [0, 13, 10, 7, 4, 1, 14, 11, 8, 5, 2, 15, 12, 9, 6, 3];

/// Multiplication by 2 in GF(2^8) modulo x^8 + x^4 + x^3 + x + 1.
const XTIME: [u8; 256] = build_xtime();

const fn invert_sbox(sbox: &[u8; 256]) -> [u8; 256] {
    let mut inv = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inv[sbox[i] as usize] = i as u8;
        i += 1;
    }
    inv
}

const fn build_xtime() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 128 {
        table[i] = (i as u8) << 1;
        table[128 + i] = ((i as u8) << 1) ^ 0x1b;
        i += 1;
    }
    table
}

// ── Cipher ────────────────────────────────────────────────────────────────────

/// An expanded key schedule, ready to encrypt or decrypt single blocks.
///
/// The schedule is wiped from memory when the value is dropped.
///
/// # Examples
///
/// ```rust
/// use cube_core::Aes128;
///
/// let cipher = Aes128::new(&[0u8; 16]);
/// let mut block = *b"sixteen byte blk";
/// cipher.encrypt_block(&mut block);
/// cipher.decrypt_block(&mut block);
/// assert_eq!(&block, b"sixteen byte blk");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Aes128 {
    round_keys: [u8; EXPANDED_KEY_LEN],
}

impl Aes128 {
    /// Expands `key` into the 11 round keys.
    pub fn new(key: &[u8; BLOCK_SIZE]) -> Self {
        let mut round_keys = [0u8; EXPANDED_KEY_LEN];
        round_keys[..BLOCK_SIZE].copy_from_slice(key);

        let mut rcon = 1u8;
        for i in (BLOCK_SIZE..EXPANDED_KEY_LEN).step_by(4) {
            let mut word = [
                round_keys[i - 4],
                round_keys[i - 3],
                round_keys[i - 2],
                round_keys[i - 1],
            ];
            if i % BLOCK_SIZE == 0 {
                // RotWord + SubWord + round constant.
                word = [
                    SBOX[word[1] as usize] ^ rcon,
                    SBOX[word[2] as usize],
                    SBOX[word[3] as usize],
                    SBOX[word[0] as usize],
                ];
                rcon = XTIME[rcon as usize];
            }
            for j in 0..4 {
                round_keys[i + j] = round_keys[i + j - BLOCK_SIZE] ^ word[j];
            }
        }

        Self { round_keys }
    }

    /// Encrypts one block in place.
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        add_sub_shift(block, self.round_key(0));
        for round in 1..ROUNDS {
            mix_columns(block);
            add_sub_shift(block, self.round_key(round));
        }
        add_round_key(block, self.round_key(ROUNDS));
    }

    /// Decrypts one block in place.
    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        add_round_key(block, self.round_key(ROUNDS));
        for round in (1..ROUNDS).rev() {
            inv_shift_sub_add(block, self.round_key(round));
            inv_mix_columns(block);
        }
        inv_shift_sub_add(block, self.round_key(0));
    }

    fn round_key(&self, round: usize) -> &[u8] {
        let start = round * BLOCK_SIZE;
        &self.round_keys[start..start + BLOCK_SIZE]
    }
}

impl fmt::Debug for Aes128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aes128").finish_non_exhaustive()
    }
}

// ── Round primitives ──────────────────────────────────────────────────────────

fn add_round_key(state: &mut [u8; BLOCK_SIZE], round_key: &[u8]) {
    for (byte, k) in state.iter_mut().zip(round_key) {
        *byte ^= k;
    }
}

/// XOR the round key, substitute through the S-box and shift rows, in one pass.
fn add_sub_shift(state: &mut [u8; BLOCK_SIZE], round_key: &[u8]) {
    let input = *state;
    for i in 0..BLOCK_SIZE {
        state[SHIFT_TAB_INV[i]] = SBOX[(input[i] ^ round_key[i]) as usize];
    }
}

/// Inverse of [`add_sub_shift`]: unshift, inverse-substitute, XOR the round key.
fn inv_shift_sub_add(state: &mut [u8; BLOCK_SIZE], round_key: &[u8]) {
    let input = *state;
    for i in 0..BLOCK_SIZE {
        state[i] = INV_SBOX[input[SHIFT_TAB_INV[i]] as usize] ^ round_key[i];
    }
}

fn mix_columns(state: &mut [u8; BLOCK_SIZE]) {
    for column in state.chunks_exact_mut(4) {
        let [s0, s1, s2, s3] = [column[0], column[1], column[2], column[3]];
        let h = s0 ^ s1 ^ s2 ^ s3;
        column[0] ^= h ^ XTIME[(s0 ^ s1) as usize];
        column[1] ^= h ^ XTIME[(s1 ^ s2) as usize];
        column[2] ^= h ^ XTIME[(s2 ^ s3) as usize];
        column[3] ^= h ^ XTIME[(s3 ^ s0) as usize];
    }
}

fn inv_mix_columns(state: &mut [u8; BLOCK_SIZE]) {
    for column in state.chunks_exact_mut(4) {
        let [s0, s1, s2, s3] = [column[0], column[1], column[2], column[3]];
        let h = s0 ^ s1 ^ s2 ^ s3;
        let xh = XTIME[h as usize];
        let h1 = XTIME[XTIME[(xh ^ s0 ^ s2) as usize] as usize] ^ h;
        let h2 = XTIME[XTIME[(xh ^ s1 ^ s3) as usize] as usize] ^ h;
        column[0] ^= h1 ^ XTIME[(s0 ^ s1) as usize];
        column[1] ^= h2 ^ XTIME[(s1 ^ s2) as usize];
        column[2] ^= h1 ^ XTIME[(s2 ^ s3) as usize];
        column[3] ^= h2 ^ XTIME[(s3 ^ s0) as usize];
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
