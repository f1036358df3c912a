//! Cryptographic primitives for the warden CA: root key generation,
//! certificate fingerprinting, and provisioner credential checks.

pub mod keys;
pub mod pinning;
pub mod provisioner;
