//! Shared plumbing for the warden workspace: wire-level error codes,
//! data-directory layout, and atomic JSON persistence.

pub mod error;
pub mod paths;
pub mod persist;
