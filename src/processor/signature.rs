use base64::{Engine, prelude::BASE64_STANDARD};
use sha1::{Digest, Sha1};

/// `base64(sha1(private_key + value + private_key))`, the LiqPay signature scheme.
pub fn processor_hash(private_key: &str, value: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(private_key.as_bytes());
    hasher.update(value.as_bytes());
    hasher.update(private_key.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Constant-time comparison of two signatures.
pub fn signatures_match(expected: &str, received: &str) -> bool {
    let (expected, received) = (expected.as_bytes(), received.as_bytes());
    if expected.len() != received.len() {
        return false;
    }
    expected
        .iter()
        .zip(received)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
