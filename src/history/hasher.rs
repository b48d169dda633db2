//! MB-012: BLAKE3 fingerprints of run histories.
//!
//! Two runs of the same recipe under the same config produce the same
//! fingerprint; any change to a recorded value changes it.

use crate::core::types::{History, Snapshot};

fn update_snapshot(hasher: &mut blake3::Hasher, snapshot: &Snapshot) {
    for (key, value) in snapshot {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"\n");
}

/// Fingerprint of an ordered history. Returns `"blake3:{hex}"`.
pub fn fingerprint(history: &History) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(history.len() as u64).to_le_bytes());
    for snapshot in history {
        update_snapshot(&mut hasher, snapshot);
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}
