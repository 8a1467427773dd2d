//! Identifier helpers shared across room controller components.

use uuid::Uuid;

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Create a new random identifier rendered in base62.
///
/// Backed by a v4 UUID, so ids are 122 bits of randomness in at most 22
/// URL-safe characters. Used for anonymous user ids, client ids and call ids.
#[must_use]
pub fn new_base62_id() -> String {
    encode_base62(Uuid::new_v4().as_u128())
}

/// Encode a 128-bit value in base62 (most significant digit first).
#[must_use]
pub fn encode_base62(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(22);
    while value > 0 {
        // value % 62 is always < 62
        #[allow(clippy::cast_possible_truncation)]
        let index = (value % 62) as usize;
        if let Some(digit) = BASE62_ALPHABET.get(index) {
            digits.push(char::from(*digit));
        }
        value /= 62;
    }
    digits.iter().rev().collect()
}
