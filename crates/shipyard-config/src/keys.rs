//! API key generation.

use rand::RngCore;

/// Generate a random API key: the given prefix followed by 40 hex chars
/// (20 bytes of OS-seeded randomness).
pub fn generate_api_key(prefix: &str) -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}{}", hex::encode(bytes))
}
