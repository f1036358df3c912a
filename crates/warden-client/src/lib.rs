//! HTTP client for a running warden CA.
//!
//! Uses blocking `ureq` — no async runtime dependency on the
//! enrollment path. Trust bootstrap never installs a fetched root
//! before its fingerprint matches the operator-supplied pin.

use std::time::Duration;

use warden_ca::protocol::{
    HealthResponse, InventoryResponse, IssueRequest, IssueResponse, RevokeRequest,
    RevokeResponse,
};
use warden_crypto::pinning;

/// TCP connection timeout for API requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout for API requests.
const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Attempts for transient failures during bootstrap and enrollment.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay between attempts, doubled each retry.
const RETRY_DELAY: Duration = Duration::from_millis(500);

// ── Error types ───────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("CA not reachable: {0}")]
    Unreachable(String),

    #[error("{error}: {message}")]
    Api { error: String, message: String },

    /// The fetched root's fingerprint did not match the pin. Never
    /// retried — the fetched material must not be trusted.
    #[error("root fingerprint mismatch: expected {expected}, got {actual}")]
    TrustMismatch { expected: String, actual: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Transient failures worth another attempt. A trust mismatch or
    /// an API rejection will not change on retry.
    fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Api { error, .. } => error == "engine_unavailable",
            Self::TrustMismatch { .. } | Self::Decode(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// A root certificate that passed fingerprint verification.
#[derive(Debug, Clone)]
pub struct VerifiedRoot {
    pub pem: String,
    pub fingerprint: String,
}

/// Verify a fetched root PEM against an operator-supplied fingerprint
/// pin (either bare hex or colon-separated form).
pub fn verify_root(root_pem: &str, expected_fingerprint: &str) -> Result<VerifiedRoot> {
    let parsed = pem::parse(root_pem)
        .map_err(|e| ClientError::Decode(format!("root certificate PEM: {e}")))?;
    let actual = pinning::fingerprint_sha256(parsed.contents());
    let expected = pinning::canonical(expected_fingerprint);

    if !pinning::fingerprints_match(&actual, &expected) {
        return Err(ClientError::TrustMismatch { expected, actual });
    }
    Ok(VerifiedRoot {
        pem: root_pem.to_string(),
        fingerprint: actual,
    })
}

// ── Client ────────────────────────────────────────────────────────

pub struct WardenClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl WardenClient {
    pub fn new(endpoint: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent,
        }
    }

    // ── Trust bootstrap ───────────────────────────────────────────

    /// Fetch the root certificate PEM. The response is untrusted until
    /// verified against a pin.
    pub fn fetch_root(&self) -> Result<String> {
        let url = format!("{}/v1/ca/root", self.endpoint);
        let resp = self.agent.get(&url).call().map_err(map_error)?;
        resp.into_string()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Fetch the root and verify it against the pinned fingerprint,
    /// retrying transient transport failures. A mismatch aborts
    /// immediately.
    pub fn bootstrap(&self, expected_fingerprint: &str) -> Result<VerifiedRoot> {
        self.with_retries("bootstrap", || {
            let pem = self.fetch_root()?;
            verify_root(&pem, expected_fingerprint)
        })
    }

    // ── Lifecycle operations ──────────────────────────────────────

    pub fn issue(&self, request: &IssueRequest) -> Result<IssueResponse> {
        self.with_retries("issue", || self.post_json("/v1/ca/issue", request))
    }

    pub fn revoke(&self, request: &RevokeRequest) -> Result<RevokeResponse> {
        self.post_json("/v1/ca/revoke", request)
    }

    pub fn inventory(&self, status: Option<&str>) -> Result<InventoryResponse> {
        let url = format!("{}/v1/ca/inventory", self.endpoint);
        let mut req = self.agent.get(&url);
        if let Some(status) = status {
            req = req.query("status", status);
        }
        let resp = req.call().map_err(map_error)?;
        resp.into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub fn expiring(&self, within: Option<&str>) -> Result<InventoryResponse> {
        let url = format!("{}/v1/ca/inventory/expiring", self.endpoint);
        let mut req = self.agent.get(&url);
        if let Some(within) = within {
            req = req.query("within", within);
        }
        let resp = req.call().map_err(map_error)?;
        resp.into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/v1/ca/health", self.endpoint);
        let resp = self.agent.get(&url).call().map_err(map_error)?;
        resp.into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    // ── Private helpers ───────────────────────────────────────────

    fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{path}", self.endpoint);
        let json =
            serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        let resp = self.agent.post(&url).send_json(json).map_err(map_error)?;
        resp.into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn with_retries<T>(&self, op: &str, mut call: impl FnMut() -> Result<T>) -> Result<T> {
        let mut delay = RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(op, attempt, error = %e, "Retrying after transient failure");
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Error helpers ─────────────────────────────────────────────────

fn map_error(e: ureq::Error) -> ClientError {
    match e {
        ureq::Error::Status(_status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
                let error = json
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let message = json
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&body)
                    .to_string();
                ClientError::Api { error, message }
            } else {
                ClientError::Api {
                    error: "http_error".into(),
                    message: body,
                }
            }
        }
        ureq::Error::Transport(t) => ClientError::Unreachable(t.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_root_pem(contents: &[u8]) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", contents.to_vec()))
    }

    #[test]
    fn client_new_strips_trailing_slash() {
        let client = WardenClient::new("http://10.0.0.1:8443///");
        assert_eq!(client.endpoint, "http://10.0.0.1:8443");
    }

    #[test]
    fn verify_root_accepts_matching_pin() {
        let root = fake_root_pem(b"root certificate der");
        let pin = pinning::fingerprint_sha256(b"root certificate der");

        let verified = verify_root(&root, &pin).unwrap();
        assert_eq!(verified.fingerprint, pin);
        assert_eq!(verified.pem, root);
    }

    #[test]
    fn verify_root_accepts_colon_uppercase_pin() {
        let root = fake_root_pem(b"root certificate der");
        let fp = pinning::fingerprint_sha256(b"root certificate der");
        let colon_form: String = fp
            .as_bytes()
            .chunks(2)
            .map(|c| std::str::from_utf8(c).unwrap().to_uppercase())
            .collect::<Vec<_>>()
            .join(":");

        verify_root(&root, &colon_form).unwrap();
    }

    #[test]
    fn verify_root_rejects_tampered_root() {
        let tampered = fake_root_pem(b"attacker certificate der");
        let pin = pinning::fingerprint_sha256(b"root certificate der");

        let err = verify_root(&tampered, &pin).unwrap_err();
        match &err {
            ClientError::TrustMismatch { expected, actual } => {
                assert_eq!(expected, &pin);
                assert_ne!(actual, &pin);
            }
            other => panic!("expected TrustMismatch, got {other:?}"),
        }
        // Mismatches are terminal, never retried
        assert!(!err.is_transient());
    }

    #[test]
    fn verify_root_rejects_garbage_pem() {
        let err = verify_root("not a pem", "ab".repeat(32).as_str()).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn transient_classification() {
        assert!(ClientError::Unreachable("refused".into()).is_transient());
        assert!(ClientError::Api {
            error: "engine_unavailable".into(),
            message: "probe failed".into()
        }
        .is_transient());
        assert!(!ClientError::Api {
            error: "auth_rejected".into(),
            message: "no".into()
        }
        .is_transient());
        assert!(!ClientError::Decode("bad json".into()).is_transient());
    }

    #[test]
    fn retries_stop_after_max_attempts() {
        let client = WardenClient::new("http://10.0.0.1:1");
        let mut calls = 0;
        let result: Result<()> = client.with_retries("test", || {
            calls += 1;
            Err(ClientError::Unreachable("refused".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[test]
    fn terminal_errors_fail_on_first_attempt() {
        let client = WardenClient::new("http://10.0.0.1:1");
        let mut calls = 0;
        let result: Result<()> = client.with_retries("test", || {
            calls += 1;
            Err(ClientError::Api {
                error: "validation_failed".into(),
                message: "bad cn".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
