//! GATT UUID helpers.
//!
//! BLE stacks report UUIDs in different shapes: 16-bit short forms such as
//! `fff6`, full 128-bit strings in upper or lower case, with or without
//! hyphens.  Everything is normalised through [`uuid::Uuid`] before comparing.

use uuid::Uuid;

/// Suffix that turns a 16-bit assigned number into a full 128-bit UUID.
const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805F9B34FB";

/// Expands `raw` into a full UUID.
///
/// Four hex digits are treated as a short form and expanded with the
/// Bluetooth base UUID (`0000XXXX-0000-1000-8000-00805F9B34FB`).  Anything
/// else is parsed as a full UUID.  Returns `None` if `raw` is neither.
pub fn expand_uuid(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Uuid::parse_str(&format!("0000{raw}{BASE_UUID_SUFFIX}")).ok();
    }
    Uuid::parse_str(raw).ok()
}

/// Returns `true` if `reported` names the same UUID as `expected`.
pub fn uuid_matches(reported: &str, expected: &Uuid) -> bool {
    expand_uuid(reported).is_some_and(|u| u == *expected)
}
