use sha2::{Digest, Sha256};

/// Content fingerprint of a captured screenshot, as lowercase hex SHA-256.
/// Identical bytes give identical fingerprints; any change gives a new one.
pub fn screen_fingerprint(frame: &[u8]) -> String {
    hex::encode(Sha256::digest(frame))
}
