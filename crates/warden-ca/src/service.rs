//! Lifecycle service — the single entry point for issuance,
//! revocation, listing, trust bootstrap, and health.
//!
//! Issuance and revocation serialize per CN so concurrent requests for
//! the same name cannot interleave; different CNs proceed in parallel.
//! Inventory commits are all-or-nothing: the mutation is applied to a
//! copy, persisted, and only then swapped in, with artifact changes
//! rolled back when the persist fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use warden_common::paths::DataDir;
use warden_crypto::provisioner::{AuthToken, Authenticator, Provisioner};

use crate::artifacts;
use crate::engine::SigningEngine;
use crate::error::CaError;
use crate::inventory::{
    self, CertStatus, CertificateRecord, Inventory, Role, StatusFilter,
};
use crate::protocol::{IssueRequest, IssueResponse, RevokeRequest, RevokeResponse};
use crate::validate;

/// Engine health as seen by the service.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub active_certificates: usize,
    pub root_fingerprint: String,
    pub detail: Option<String>,
}

pub struct CaService {
    engine: Arc<dyn SigningEngine>,
    authenticator: Mutex<Authenticator>,
    data_dir: DataDir,
    inventory: Mutex<Inventory>,
    cn_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    default_validity: StdDuration,
}

/// Recover the guard even if a holder panicked; the inventory itself
/// is only mutated through the commit path, so a poisoned lock never
/// guards half-applied state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CaService {
    pub fn new(
        engine: Arc<dyn SigningEngine>,
        provisioner: Provisioner,
        data_dir: DataDir,
        default_validity: StdDuration,
    ) -> Result<Self, CaError> {
        let inventory = inventory::load_inventory(&data_dir.inventory_path())?;
        tracing::info!(
            active = inventory.active_count(),
            total = inventory.records.len(),
            "Inventory loaded"
        );
        Ok(Self {
            engine,
            authenticator: Mutex::new(Authenticator::new(provisioner)),
            data_dir,
            inventory: Mutex::new(inventory),
            cn_locks: Mutex::new(HashMap::new()),
            default_validity,
        })
    }

    fn authenticate(&self, secret: &str) -> Result<AuthToken, CaError> {
        let token = lock(&self.authenticator).authenticate(secret)?;
        Ok(token)
    }

    fn cn_lock(&self, cn: &str) -> Arc<AsyncMutex<()>> {
        lock(&self.cn_locks)
            .entry(cn.to_string())
            .or_default()
            .clone()
    }

    /// Issue a certificate for a CN.
    ///
    /// Order matters: credential first, then input policy, then the
    /// per-CN lock — nothing cryptographic happens for a request that
    /// will be rejected, and invalid CNs never allocate a lock entry.
    pub async fn issue(&self, req: IssueRequest) -> Result<IssueResponse, CaError> {
        let _token = self.authenticate(&req.provisioner_secret)?;
        let role = Role::parse(&req.role)?;
        validate::validate_cn(&req.cn)?;
        let validity = req.validity.unwrap_or(self.default_validity);

        let cn_guard = self.cn_lock(&req.cn);
        let _held = cn_guard.lock().await;

        let issued = self.engine.issue(&req.cn, role, &req.sans, validity)?;
        let sans = crate::engine::inspect(&issued.cert_pem)?.sans;

        let root_pem = self.engine.root_certificate_pem();

        // A reissue must not lose the previous record's artifacts if
        // anything below fails, so they are stashed aside first and
        // only discarded once the new record is committed.
        let had_previous = artifacts::stash_bundle(&self.data_dir, &req.cn)?;
        if let Err(e) = artifacts::write_bundle(&self.data_dir, &req.cn, &issued, &root_pem) {
            if had_previous {
                let _ = artifacts::restore_stashed(&self.data_dir, &req.cn);
            }
            return Err(e);
        }

        let record = CertificateRecord {
            cn: req.cn.clone(),
            role,
            sans,
            issued_at: issued.not_before,
            expires_at: issued.not_after,
            serial: issued.serial.clone(),
            fingerprint: issued.fingerprint.clone(),
            status: CertStatus::Active,
            revoked_at: None,
        };

        // Commit: persist a mutated copy, then swap it in. If the
        // persist fails the written artifacts are rolled back and the
        // previous inventory stays authoritative.
        {
            let mut guard = lock(&self.inventory);
            let mut next = guard.clone();
            next.put(record.clone());
            if let Err(e) = inventory::save_inventory(&next, &self.data_dir.inventory_path()) {
                let _ = artifacts::remove_bundle(&self.data_dir, &req.cn);
                if had_previous {
                    let _ = artifacts::restore_stashed(&self.data_dir, &req.cn);
                }
                return Err(CaError::Storage(e.to_string()));
            }
            *guard = next;
        }
        if had_previous {
            let _ = artifacts::discard_stashed(&self.data_dir, &req.cn);
        }

        Ok(IssueResponse {
            cn: record.cn,
            role: role.as_str().to_string(),
            serial: issued.serial,
            fingerprint: issued.fingerprint,
            not_before: issued.not_before,
            not_after: issued.not_after,
            cert_pem: issued.cert_pem,
            key_pem: issued.key_pem,
            ca_pem: root_pem,
            fullchain_pem: issued.fullchain_pem,
        })
    }

    /// Revoke the active certificate for a CN: archive its artifacts,
    /// flip the record, append to the revocation list.
    pub async fn revoke(&self, req: RevokeRequest) -> Result<RevokeResponse, CaError> {
        let token = self.authenticate(&req.provisioner_secret)?;
        validate::validate_cn(&req.cn)?;

        let cn_guard = self.cn_lock(&req.cn);
        let _held = cn_guard.lock().await;

        let serial = lock(&self.inventory)
            .get(&req.cn)
            .map(|r| r.serial.clone())
            .ok_or_else(|| CaError::NotFound(req.cn.clone()))?;

        artifacts::archive_revoked(&self.data_dir, &req.cn)?;

        let revoked_at;
        {
            let mut guard = lock(&self.inventory);
            let mut next = guard.clone();
            let record = next
                .mark_revoked(&req.cn, Some(token.provisioner().to_string()))
                .ok_or_else(|| CaError::NotFound(req.cn.clone()))?;
            revoked_at = record.revoked_at.unwrap_or_else(Utc::now);

            if let Err(e) = inventory::save_inventory(&next, &self.data_dir.inventory_path()) {
                let _ = artifacts::unarchive(&self.data_dir, &req.cn);
                return Err(CaError::Storage(e.to_string()));
            }
            *guard = next;
        }

        tracing::info!(cn = %req.cn, serial, by = token.provisioner(), "Certificate revoked");

        Ok(RevokeResponse {
            cn: req.cn,
            serial,
            revoked_at,
        })
    }

    /// Records matching the filter, issuance order.
    pub fn list(&self, filter: StatusFilter) -> Vec<CertificateRecord> {
        lock(&self.inventory)
            .list(filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Active records expiring within the window (already-expired
    /// included).
    pub fn expiring(&self, window: StdDuration) -> Result<Vec<CertificateRecord>, CaError> {
        let window = chrono::Duration::from_std(window)
            .map_err(|_| CaError::Validation("expiry window out of range".into()))?;
        Ok(lock(&self.inventory)
            .expiring_within(window)
            .into_iter()
            .cloned()
            .collect())
    }

    /// The root certificate PEM — public, served without credentials.
    pub fn root_certificate_pem(&self) -> String {
        self.engine.root_certificate_pem()
    }

    pub fn root_fingerprint(&self) -> String {
        self.engine.root_fingerprint()
    }

    /// Probe the signing engine. Degraded, not dead: the report always
    /// includes inventory counts even when the engine fails.
    pub fn health(&self) -> HealthStatus {
        let detail = self.engine.health_probe().err().map(|e| e.to_string());
        HealthStatus {
            healthy: detail.is_none(),
            active_certificates: lock(&self.inventory).active_count(),
            root_fingerprint: self.engine.root_fingerprint(),
            detail,
        }
    }
}
