//! CRC-16 frame trailer.
//!
//! The devices use the reflected CRC-16 variant commonly called "MODBUS":
//! initial value `0xFFFF`, polynomial `0xA001`, processed one bit at a time,
//! least significant bit first.  No lookup table is used.
//!
//! The trailer is appended low byte first.  A useful consequence is that
//! running the CRC over *frame + trailer* always yields zero, which is how
//! inbound frames are validated.

/// Computes the CRC-16 of `data`.
///
/// # Examples
///
/// ```rust
/// use cube_core::protocol::crc16_modbus;
///
/// assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
/// ```
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
        }
    }
    crc
}

/// Appends the CRC of `buf` to `buf`, low byte first.
pub fn append_checksum(buf: &mut Vec<u8>) {
    let crc = crc16_modbus(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Returns `true` if `frame` ends with a valid CRC trailer.
pub fn verify_checksum(frame: &[u8]) -> bool {
    crc16_modbus(frame) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_crc16_of_empty_input_is_initial_value() {
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_append_checksum_writes_low_byte_first() {
        // Arrange
        let mut buf = b"123456789".to_vec();

        // Act
        append_checksum(&mut buf);

        // Assert
        assert_eq!(&buf[9..], &[0x37, 0x4B]);
    }

    #[test]
    fn test_verify_checksum_rejects_flipped_bit() {
        let mut buf = vec![0xFE, 0x09, 0x03, 0x11, 0x22];
        append_checksum(&mut buf);
        buf[3] ^= 0x01;
        assert!(!verify_checksum(&buf));
    }

    proptest! {
        #[test]
        fn prop_frame_with_trailer_checksums_to_zero(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            let mut frame = data.clone();
            append_checksum(&mut frame);
            prop_assert_eq!(crc16_modbus(&frame), 0);
        }
    }
}
