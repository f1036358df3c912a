//! Data-directory layout.
//!
//! All paths derive from a single injected root so tests and
//! deployments can relocate the whole tree. Root authority material
//! lives under `authority/` — a separate, more restricted namespace
//! than issued certificates under `certs/`.

use std::path::{Path, PathBuf};

const AUTHORITY_SUBDIR: &str = "authority";
const CERTS_SUBDIR: &str = "certs";
const ROOT_KEY_FILENAME: &str = "root-key.pem";
const ROOT_CERT_FILENAME: &str = "root-cert.pem";
const INVENTORY_FILENAME: &str = "inventory.json";

/// Suffix appended to a CN's artifact directory on revocation.
pub const REVOKED_SUFFIX: &str = ".revoked";

/// Resolved data directory for a warden instance.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location: `~/.warden` (or `./.warden` if HOME is unset).
    pub fn default_location() -> Self {
        let root = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".warden"))
            .unwrap_or_else(|| PathBuf::from(".warden"));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Restricted namespace holding the root key pair and certificate.
    pub fn authority_dir(&self) -> PathBuf {
        self.root.join(AUTHORITY_SUBDIR)
    }

    pub fn root_key_path(&self) -> PathBuf {
        self.authority_dir().join(ROOT_KEY_FILENAME)
    }

    pub fn root_cert_path(&self) -> PathBuf {
        self.authority_dir().join(ROOT_CERT_FILENAME)
    }

    /// Parent directory of all per-CN artifact directories.
    pub fn certs_dir(&self) -> PathBuf {
        self.root.join(CERTS_SUBDIR)
    }

    /// Artifact directory for an active CN.
    pub fn cn_dir(&self, cn: &str) -> PathBuf {
        self.certs_dir().join(cn)
    }

    /// Archival directory for a revoked CN.
    pub fn revoked_cn_dir(&self, cn: &str) -> PathBuf {
        self.certs_dir().join(format!("{cn}{REVOKED_SUFFIX}"))
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.root.join(INVENTORY_FILENAME)
    }
}
