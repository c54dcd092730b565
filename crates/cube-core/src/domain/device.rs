//! Device identity.
//!
//! A cube advertises itself with a name such as `QY-QYSC-S-1234` or
//! `WCU_MY32_ABCD`.  The name prefix tells us the device family, and the last
//! four hex digits are the low two bytes of its hardware address.  The upper
//! four bytes are fixed per family, so the full address can be rebuilt from
//! the name alone.  MoYu32 needs the address to derive its cipher key; QiYi
//! needs it for the hello frame.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Errors produced while building a hardware address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The device name is too short to contain the address digits.
    #[error("device name {0:?} is too short to carry an address")]
    NameTooShort(String),

    /// The address text does not have six colon-separated groups.
    #[error("address {0:?} must have six colon-separated bytes")]
    WrongGroupCount(String),

    /// One of the groups is not a two-digit hex byte.
    #[error("address group {0:?} is not a hex byte")]
    InvalidHex(String),
}

/// A 6-byte BLE hardware address, most significant byte first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// The address bytes in display order (`CC:A3:...` gives `[0xCC, 0xA3, ..]`).
    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// The address bytes in reverse order, as the devices put them on the wire.
    pub fn reversed(&self) -> [u8; 6] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardwareAddress({self})")
    }
}

impl FromStr for HardwareAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.split(':').collect();
        if groups.len() != 6 {
            return Err(AddressError::WrongGroupCount(s.to_string()));
        }
        let mut bytes = [0u8; 6];
        for (slot, group) in bytes.iter_mut().zip(&groups) {
            if group.len() != 2 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddressError::InvalidHex(group.to_string()));
            }
            *slot = u8::from_str_radix(group, 16)
                .map_err(|_| AddressError::InvalidHex(group.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

// ── Device families ───────────────────────────────────────────────────────────

/// Service, notify and write characteristic UUIDs for one device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattProfile {
    pub service: Uuid,
    pub notify: Uuid,
    pub write: Uuid,
}

const QIYI_SERVICE: Uuid = Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb);
const QIYI_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000fff6_0000_1000_8000_00805f9b34fb);

const MOYU32_SERVICE: Uuid = Uuid::from_u128(0x0783b03e_7735_b5a0_1760_a305d2795cb0);
const MOYU32_NOTIFY: Uuid = Uuid::from_u128(0x0783b03e_7735_b5a0_1760_a305d2795cb1);
const MOYU32_WRITE: Uuid = Uuid::from_u128(0x0783b03e_7735_b5a0_1760_a305d2795cb2);

/// The supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    QiYi,
    MoYu32,
}

impl DeviceModel {
    pub const ALL: [DeviceModel; 2] = [DeviceModel::QiYi, DeviceModel::MoYu32];

    /// Advertised-name prefix that identifies this family.
    pub fn name_prefix(self) -> &'static str {
        match self {
            DeviceModel::QiYi => "QY-QYSC",
            DeviceModel::MoYu32 => "WCU_MY32",
        }
    }

    /// Picks the family whose prefix starts `name`, if any.
    pub fn detect(name: &str) -> Option<DeviceModel> {
        Self::ALL
            .into_iter()
            .find(|m| name.starts_with(m.name_prefix()))
    }

    /// Fixed upper four bytes of every address in this family.
    fn address_prefix(self) -> [u8; 4] {
        match self {
            DeviceModel::QiYi => [0xCC, 0xA3, 0x00, 0x00],
            DeviceModel::MoYu32 => [0xCF, 0x30, 0x16, 0x00],
        }
    }

    /// Character offset in the advertised name where the address digits start.
    fn address_digits_at(self) -> usize {
        match self {
            DeviceModel::QiYi => 10,
            DeviceModel::MoYu32 => 9,
        }
    }

    /// Rebuilds the hardware address from an advertised name.
    ///
    /// QiYi: `CC:A3:00:00:` + `name[10..12]` + `:` + `name[12..14]`.
    /// MoYu32: `CF:30:16:00:` + `name[9..11]` + `:` + `name[11..13]`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] if the name is too short or the digits are not
    /// hex.
    pub fn address_from_name(self, name: &str) -> Result<HardwareAddress, AddressError> {
        let at = self.address_digits_at();
        let group = |start: usize| -> Result<u8, AddressError> {
            let digits = name
                .get(start..start + 2)
                .ok_or_else(|| AddressError::NameTooShort(name.to_string()))?;
            if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddressError::InvalidHex(digits.to_string()));
            }
            u8::from_str_radix(digits, 16).map_err(|_| AddressError::InvalidHex(digits.to_string()))
        };

        let [a, b, c, d] = self.address_prefix();
        Ok(HardwareAddress([a, b, c, d, group(at)?, group(at + 2)?]))
    }

    /// GATT service and characteristics used by this family.
    pub fn gatt_profile(self) -> GattProfile {
        match self {
            DeviceModel::QiYi => GattProfile {
                service: QIYI_SERVICE,
                notify: QIYI_CHARACTERISTIC,
                write: QIYI_CHARACTERISTIC,
            },
            DeviceModel::MoYu32 => GattProfile {
                service: MOYU32_SERVICE,
                notify: MOYU32_NOTIFY,
                write: MOYU32_WRITE,
            },
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceModel::QiYi => f.write_str("QiYi"),
            DeviceModel::MoYu32 => f.write_str("MoYu32"),
        }
    }
}
