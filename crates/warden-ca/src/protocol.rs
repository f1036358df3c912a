//! Request and response types for the lifecycle API.
//!
//! Durations cross the wire as humantime strings (`"720h"`, `"30d"`);
//! timestamps as RFC 3339. Requests carrying a provisioner secret
//! redact it from their `Debug` output.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::CertificateRecord;

/// Issuance request.
#[derive(Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub cn: String,
    /// `"client"` or `"server"` — parsed by the service so an unknown
    /// role is a validation error, not a malformed request.
    pub role: String,
    #[serde(default)]
    pub sans: Vec<String>,
    /// Requested validity; the service default applies when omitted.
    #[serde(default, with = "humantime_serde::option")]
    pub validity: Option<Duration>,
    pub provisioner_secret: String,
}

impl std::fmt::Debug for IssueRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueRequest")
            .field("cn", &self.cn)
            .field("role", &self.role)
            .field("sans", &self.sans)
            .field("validity", &self.validity)
            .field("provisioner_secret", &"<redacted>")
            .finish()
    }
}

/// Everything a site needs to participate in mTLS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    pub cn: String,
    pub role: String,
    pub serial: String,
    pub fingerprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub cert_pem: String,
    pub key_pem: String,
    pub ca_pem: String,
    pub fullchain_pem: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub cn: String,
    pub provisioner_secret: String,
}

impl std::fmt::Debug for RevokeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevokeRequest")
            .field("cn", &self.cn)
            .field("provisioner_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub cn: String,
    pub serial: String,
    pub revoked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub certificates: Vec<CertificateRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when the signing engine passed its probe, `"degraded"`
    /// otherwise.
    pub status: String,
    pub active_certificates: usize,
    pub root_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// JSON error envelope returned on every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: warden_common::error::ErrorCode,
    pub message: String,
}
