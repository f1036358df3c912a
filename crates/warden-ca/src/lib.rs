//! Warden CA core — an embedded minimal certificate authority for
//! IoT fleet mTLS.
//!
//! Issues ECDSA P-256 certificates against a self-signed root using
//! `rcgen`, tracks every issued certificate in a durable inventory,
//! archives revoked material instead of deleting it, and serves the
//! root certificate publicly so remote sites can bootstrap trust from
//! an out-of-band fingerprint.

pub mod artifacts;
pub mod engine;
pub mod error;
pub mod http;
pub mod inventory;
pub mod protocol;
pub mod service;
pub mod validate;

pub use error::CaError;
pub use service::{CaService, HealthStatus};
