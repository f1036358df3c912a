//! Certificate inventory — the CA's source of truth.
//!
//! Every issued certificate gets a record; revocation flips the
//! record's status and appends to the revocation list. Records are
//! never deleted. The explicit `status` field is authoritative — the
//! `.revoked` directory rename in the artifact layer is bookkeeping,
//! not state.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CaError;

/// What a certificate authenticates as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Parse a wire-level role string. Unknown roles are a policy
    /// violation, not a deserialization crash.
    pub fn parse(s: &str) -> Result<Self, CaError> {
        match s {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            other => Err(CaError::Validation(format!(
                "unknown role {other:?} (expected \"client\" or \"server\")"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Lifecycle state of a certificate record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CertStatus {
    Active,
    Revoked,
}

/// One issued certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub cn: String,
    pub role: Role,
    pub sans: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Decimal serial number string.
    pub serial: String,
    /// SHA-256 fingerprint of the leaf certificate DER.
    pub fingerprint: String,
    pub status: CertStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Audit entry appended when a certificate is revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedEntry {
    pub cn: String,
    pub serial: String,
    pub fingerprint: String,
    pub revoked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revoked_by: Option<String>,
}

/// Filter for inventory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    Active,
    Revoked,
    #[default]
    All,
}

impl StatusFilter {
    pub fn parse(s: &str) -> Result<Self, CaError> {
        match s {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "all" => Ok(Self::All),
            other => Err(CaError::Validation(format!(
                "unknown status filter {other:?} (expected \"active\", \"revoked\", or \"all\")"
            ))),
        }
    }

    fn matches(&self, status: CertStatus) -> bool {
        match self {
            Self::Active => status == CertStatus::Active,
            Self::Revoked => status == CertStatus::Revoked,
            Self::All => true,
        }
    }
}

/// The full inventory — serialized to `inventory.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub records: Vec<CertificateRecord>,
    #[serde(default)]
    pub revocation_list: Vec<RevokedEntry>,
}

impl Inventory {
    /// Insert or replace the active record for a CN.
    ///
    /// A reissue overwrites the previous active record (new serial,
    /// same CN); revoked records for the same CN are untouched — they
    /// belong to an earlier lineage.
    pub fn put(&mut self, record: CertificateRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.cn == record.cn && r.status == CertStatus::Active)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// The active record for a CN, if any.
    pub fn get(&self, cn: &str) -> Option<&CertificateRecord> {
        self.records
            .iter()
            .find(|r| r.cn == cn && r.status == CertStatus::Active)
    }

    /// Records matching the filter, ordered by issuance timestamp
    /// ascending so listings paginate deterministically.
    pub fn list(&self, filter: StatusFilter) -> Vec<&CertificateRecord> {
        let mut records: Vec<&CertificateRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.status))
            .collect();
        records.sort_by_key(|r| r.issued_at);
        records
    }

    /// Transition the active record for `cn` to revoked and append to
    /// the revocation list. Returns `None` if no active record exists.
    pub fn mark_revoked(
        &mut self,
        cn: &str,
        revoked_by: Option<String>,
    ) -> Option<&CertificateRecord> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.cn == cn && r.status == CertStatus::Active)?;

        let now = Utc::now();
        record.status = CertStatus::Revoked;
        record.revoked_at = Some(now);

        let entry = RevokedEntry {
            cn: record.cn.clone(),
            serial: record.serial.clone(),
            fingerprint: record.fingerprint.clone(),
            revoked_at: now,
            revoked_by,
        };
        self.revocation_list.push(entry);

        self.records
            .iter()
            .find(|r| r.cn == cn && r.status == CertStatus::Revoked)
    }

    /// Active records expiring within `window` of now.
    pub fn expiring_within(&self, window: Duration) -> Vec<&CertificateRecord> {
        let threshold = Utc::now() + window;
        let mut records: Vec<&CertificateRecord> = self
            .records
            .iter()
            .filter(|r| r.status == CertStatus::Active && r.expires_at <= threshold)
            .collect();
        records.sort_by_key(|r| r.issued_at);
        records
    }

    pub fn active_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == CertStatus::Active)
            .count()
    }
}

/// Load the inventory, starting empty when none exists yet.
pub fn load_inventory(path: &Path) -> Result<Inventory, std::io::Error> {
    warden_common::persist::read_json_or_default(path)
}

/// Persist the inventory atomically.
pub fn save_inventory(inventory: &Inventory, path: &Path) -> Result<(), std::io::Error> {
    warden_common::persist::write_json_atomic(path, inventory)?;
    tracing::debug!(path = %path.display(), "Inventory saved");
    Ok(())
}
