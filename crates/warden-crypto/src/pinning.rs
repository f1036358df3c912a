//! Certificate fingerprinting for trust bootstrap.
//!
//! A remote party pins the root certificate's SHA-256 fingerprint,
//! relayed out-of-band, and verifies the fetched root against it
//! before installing anything. Comparison is constant-time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compute the SHA-256 fingerprint of a DER-encoded certificate.
///
/// Returns a lowercase hex string — the canonical form used
/// everywhere in warden (wire, inventory, CLI output).
pub fn fingerprint_sha256(cert_der: &[u8]) -> String {
    hex::encode(Sha256::digest(cert_der))
}

/// Normalize an operator-supplied fingerprint: lowercase, with any
/// colon separators stripped. Dashboards and other CA tools print
/// fingerprints in both styles.
pub fn canonical(fingerprint: &str) -> String {
    fingerprint
        .trim()
        .chars()
        .filter(|c| *c != ':')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Compare two canonical fingerprints in constant time.
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() != b_bytes.len() {
        return false;
    }

    a_bytes.ct_eq(b_bytes).into()
}
