//! Root authority creation and certificate issuance.
//!
//! Creates an ECDSA P-256 self-signed root using `rcgen` and issues
//! client/server leaf certificates against it. Inspection of issued
//! certificates goes through `x509-parser` so no private key is ever
//! needed to read metadata back.

use std::net::IpAddr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, SanType, SerialNumber,
};
use warden_common::paths::DataDir;
use warden_crypto::keys::{self, RootKeyPair};
use warden_crypto::pinning;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use crate::error::CaError;
use crate::inventory::Role;
use crate::validate;

/// Root certificate validity.
const ROOT_VALIDITY_YEARS: i64 = 10;

/// CN of the throwaway certificate signed by the health probe.
const PROBE_CN: &str = "warden-probe";

/// The self-signed root identity. Immutable after initialization; the
/// private key never leaves the `authority/` namespace.
pub struct RootAuthority {
    /// rcgen key pair for signing operations.
    rcgen_key: KeyPair,
    /// Issuer certificate used by `signed_by`.
    root_cert: rcgen::Certificate,
    /// Root certificate PEM as persisted — this exact encoding is what
    /// remote parties fingerprint, so it is read from disk, never
    /// re-derived.
    cert_pem: String,
    /// DER of the persisted root certificate, for fingerprinting.
    cert_der: Vec<u8>,
}

/// Result of issuing a leaf certificate.
#[derive(Debug)]
pub struct IssuedCert {
    pub cert_pem: String,
    pub key_pem: String,
    pub fullchain_pem: String,
    pub serial: String,
    pub fingerprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Certificate fields readable without any private key.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateMetadata {
    pub cn: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sans: Vec<String>,
    pub serial: String,
    pub fingerprint: String,
}

/// The signing capability behind the lifecycle service.
///
/// One in-process implementation exists ([`LocalEngine`]). An adapter
/// delegating to an external CA would implement the same trait; every
/// service contract holds regardless of the backing variant.
pub trait SigningEngine: Send + Sync {
    /// Build and sign a leaf certificate. Validates inputs before any
    /// key generation happens.
    fn issue(
        &self,
        cn: &str,
        role: Role,
        sans: &[String],
        validity: StdDuration,
    ) -> Result<IssuedCert, CaError>;

    /// The root certificate in PEM form, byte-for-byte as persisted.
    fn root_certificate_pem(&self) -> String;

    /// SHA-256 fingerprint of the root certificate DER — the
    /// out-of-band trust bootstrap token.
    fn root_fingerprint(&self) -> String;

    /// Sign a no-op probe to prove the root key is usable.
    fn health_probe(&self) -> Result<(), CaError>;
}

fn build_root_params(name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

    let not_before = Utc::now();
    let not_after = not_before + Duration::days(ROOT_VALIDITY_YEARS * 365);
    params.not_before = to_time(not_before);
    params.not_after = to_time(not_after);
    params
}

/// chrono → time conversion for rcgen's validity fields.
fn to_time(dt: DateTime<Utc>) -> time::OffsetDateTime {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
}

impl RootAuthority {
    /// Create a new root from scratch and persist it: key under
    /// `authority/root-key.pem` (0600), certificate alongside it.
    pub fn create(name: &str, data_dir: &DataDir) -> Result<Self, CaError> {
        let root_key = RootKeyPair::generate();
        let key_pem = root_key
            .private_key_pem()
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;

        let rcgen_key = KeyPair::from_pem(&key_pem)
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;

        let root_cert = build_root_params(name)
            .self_signed(&rcgen_key)
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;

        let cert_pem = root_cert.pem();
        let cert_der = root_cert.der().to_vec();

        keys::save_private_key_pem(&data_dir.root_key_path(), &key_pem)
            .map_err(|e| CaError::Storage(e.to_string()))?;
        std::fs::write(data_dir.root_cert_path(), &cert_pem)?;

        tracing::info!(
            fingerprint = %pinning::fingerprint_sha256(&cert_der),
            "Root authority created"
        );

        Ok(Self {
            rcgen_key,
            root_cert,
            cert_pem,
            cert_der,
        })
    }

    /// Load a previously created root from the data directory.
    pub fn load(name: &str, data_dir: &DataDir) -> Result<Self, CaError> {
        let key_path = data_dir.root_key_path();
        if !key_path.exists() {
            return Err(CaError::EngineUnavailable(format!(
                "root authority not initialized at {}",
                data_dir.root().display()
            )));
        }

        let root_key = keys::load_private_key(&key_path)
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;
        let key_pem = root_key
            .private_key_pem()
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;
        let rcgen_key = KeyPair::from_pem(&key_pem)
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;

        // The persisted PEM is authoritative for fingerprinting.
        let cert_pem = std::fs::read_to_string(data_dir.root_cert_path())?;
        let parsed =
            pem::parse(&cert_pem).map_err(|e| CaError::EngineUnavailable(e.to_string()))?;
        let cert_der = parsed.contents().to_vec();

        // Issuer certificate for signed_by(): same key, same subject DN,
        // so leaves chain to the persisted root.
        let root_cert = build_root_params(name)
            .self_signed(&rcgen_key)
            .map_err(|e| CaError::EngineUnavailable(e.to_string()))?;

        Ok(Self {
            rcgen_key,
            root_cert,
            cert_pem,
            cert_der,
        })
    }

    /// Load the root if it exists, create it otherwise.
    pub fn load_or_create(name: &str, data_dir: &DataDir) -> Result<Self, CaError> {
        if data_dir.root_key_path().exists() {
            Self::load(name, data_dir)
        } else {
            Self::create(name, data_dir)
        }
    }

    pub fn fingerprint(&self) -> String {
        pinning::fingerprint_sha256(&self.cert_der)
    }
}

/// In-process signing engine backed by a [`RootAuthority`].
pub struct LocalEngine {
    authority: RootAuthority,
    max_validity: StdDuration,
}

impl LocalEngine {
    pub fn new(authority: RootAuthority, max_validity: StdDuration) -> Self {
        Self {
            authority,
            max_validity,
        }
    }

    /// SAN set actually embedded for a request: empty for client
    /// certificates (submitted SANs are ignored); for server
    /// certificates the CN is included when it is a resolvable name.
    fn effective_sans(cn: &str, role: Role, sans: &[String]) -> Vec<String> {
        match role {
            Role::Client => {
                if !sans.is_empty() {
                    tracing::debug!(cn, "Ignoring SANs on client certificate request");
                }
                Vec::new()
            }
            Role::Server => {
                let mut effective: Vec<String> = Vec::new();
                if validate::cn_is_dns_safe(cn) && !sans.iter().any(|s| s == cn) {
                    effective.push(cn.to_string());
                }
                for san in sans {
                    let trimmed = san.trim();
                    if !trimmed.is_empty() && !effective.iter().any(|s| s == trimmed) {
                        effective.push(trimmed.to_string());
                    }
                }
                effective
            }
        }
    }
}

impl SigningEngine for LocalEngine {
    fn issue(
        &self,
        cn: &str,
        role: Role,
        sans: &[String],
        validity: StdDuration,
    ) -> Result<IssuedCert, CaError> {
        // Policy checks come first — no key material is generated for a
        // request that will be rejected.
        validate::validate_cn(cn)?;
        validate::validate_validity(validity, self.max_validity)?;

        let effective_sans = Self::effective_sans(cn, role, sans);
        let dns_sans: Vec<String> = effective_sans
            .iter()
            .filter(|s| s.parse::<IpAddr>().is_err())
            .cloned()
            .collect();

        let leaf_key =
            KeyPair::generate().map_err(|e| CaError::EngineUnavailable(e.to_string()))?;

        let mut params = CertificateParams::new(dns_sans)
            .map_err(|e| CaError::Validation(format!("invalid SAN: {e}")))?;
        params.distinguished_name.push(DnType::CommonName, cn);
        params.extended_key_usages = vec![match role {
            Role::Client => ExtendedKeyUsagePurpose::ClientAuth,
            Role::Server => ExtendedKeyUsagePurpose::ServerAuth,
        }];

        for san in &effective_sans {
            if let Ok(ip) = san.parse::<IpAddr>() {
                params.subject_alt_names.push(SanType::IpAddress(ip));
            }
        }

        let serial: u64 = rand::thread_rng().gen();
        params.serial_number = Some(SerialNumber::from(serial));

        let not_before = Utc::now();
        let not_after = not_before
            + Duration::from_std(validity)
                .map_err(|_| CaError::Validation("validity out of range".into()))?;
        params.not_before = to_time(not_before);
        params.not_after = to_time(not_after);

        let leaf_cert = params
            .signed_by(&leaf_key, &self.authority.root_cert, &self.authority.rcgen_key)
            .map_err(|e| CaError::EngineUnavailable(format!("signing failed: {e}")))?;

        let cert_pem = leaf_cert.pem();
        let fullchain_pem = format!("{cert_pem}{}", self.authority.cert_pem);
        let fingerprint = pinning::fingerprint_sha256(leaf_cert.der());

        tracing::info!(cn, role = role.as_str(), serial, %fingerprint, "Certificate issued");

        Ok(IssuedCert {
            cert_pem,
            key_pem: leaf_key.serialize_pem(),
            fullchain_pem,
            serial: serial.to_string(),
            fingerprint,
            // Second precision — matches the encoded validity fields.
            not_before: DateTime::from_timestamp(not_before.timestamp(), 0).unwrap_or(not_before),
            not_after: DateTime::from_timestamp(not_after.timestamp(), 0).unwrap_or(not_after),
        })
    }

    fn root_certificate_pem(&self) -> String {
        self.authority.cert_pem.clone()
    }

    fn root_fingerprint(&self) -> String {
        self.authority.fingerprint()
    }

    fn health_probe(&self) -> Result<(), CaError> {
        // Sign and discard a short-lived certificate; failure means the
        // root key is not usable for issuance.
        self.issue(PROBE_CN, Role::Client, &[], StdDuration::from_secs(300))
            .map(|_| ())
    }
}

/// Extract metadata from a PEM-encoded certificate.
pub fn inspect(cert_pem: &str) -> Result<CertificateMetadata, CaError> {
    let parsed = pem::parse(cert_pem)
        .map_err(|e| CaError::Validation(format!("unparseable certificate PEM: {e}")))?;
    let der = parsed.contents();

    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| CaError::Validation(format!("unparseable certificate DER: {e}")))?;

    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string();
    let issuer = cert.issuer().to_string();

    let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
        .ok_or_else(|| CaError::Validation("notBefore out of range".into()))?;
    let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| CaError::Validation("notAfter out of range".into()))?;

    let mut sans = Vec::new();
    if let Ok(Some(ext)) = cert.subject_alternative_name() {
        for name in &ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        sans.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Ok(CertificateMetadata {
        cn,
        issuer,
        not_before,
        not_after,
        sans,
        serial: cert.tbs_certificate.serial.to_string(),
        fingerprint: pinning::fingerprint_sha256(der),
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_data_dir(name: &str) -> DataDir {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        DataDir::new(std::env::temp_dir().join(format!("warden-engine-{name}-{nanos}")))
    }

    fn make_engine(name: &str) -> (LocalEngine, DataDir) {
        let dir = temp_data_dir(name);
        let authority = RootAuthority::create("Warden Test Root", &dir).unwrap();
        (
            LocalEngine::new(authority, validate::DEFAULT_MAX_VALIDITY),
            dir,
        )
    }

    fn cleanup(dir: &DataDir) {
        let _ = std::fs::remove_dir_all(dir.root());
    }

    const HOUR: u64 = 3600;

    #[test]
    fn create_persists_key_and_cert() {
        let dir = temp_data_dir("create");
        let authority = RootAuthority::create("Warden Test Root", &dir).unwrap();

        assert!(dir.root_key_path().exists());
        assert!(dir.root_cert_path().exists());
        assert_eq!(authority.fingerprint().len(), 64);
        cleanup(&dir);
    }

    #[test]
    fn load_preserves_fingerprint() {
        let dir = temp_data_dir("load");
        let created = RootAuthority::create("Warden Test Root", &dir).unwrap();
        let loaded = RootAuthority::load("Warden Test Root", &dir).unwrap();

        assert_eq!(created.fingerprint(), loaded.fingerprint());
        cleanup(&dir);
    }

    #[test]
    fn load_without_init_fails_engine_unavailable() {
        let dir = temp_data_dir("uninit");
        let result = RootAuthority::load("Warden Test Root", &dir);
        assert!(matches!(result, Err(CaError::EngineUnavailable(_))));
    }

    #[test]
    fn issue_then_inspect_round_trips() {
        let (engine, dir) = make_engine("roundtrip");
        let issued = engine
            .issue(
                "mqtt-broker",
                Role::Server,
                &["mqtt.example.com".to_string(), "10.0.0.1".to_string()],
                StdDuration::from_secs(720 * HOUR),
            )
            .unwrap();

        let meta = inspect(&issued.cert_pem).unwrap();
        assert_eq!(meta.cn, "mqtt-broker");
        assert_eq!(meta.serial, issued.serial);
        assert_eq!(meta.fingerprint, issued.fingerprint);
        assert_eq!(meta.not_before, issued.not_before);
        assert_eq!(meta.not_after, issued.not_after);
        // CN auto-included, then the requested SANs
        assert!(meta.sans.contains(&"mqtt-broker".to_string()));
        assert!(meta.sans.contains(&"mqtt.example.com".to_string()));
        assert!(meta.sans.contains(&"10.0.0.1".to_string()));
        assert!(meta.issuer.contains("Warden Test Root"));
        cleanup(&dir);
    }

    #[test]
    fn expiry_minus_issuance_equals_validity() {
        let (engine, dir) = make_engine("validity");
        let issued = engine
            .issue(
                "site-001",
                Role::Client,
                &[],
                StdDuration::from_secs(720 * HOUR),
            )
            .unwrap();

        assert_eq!(
            issued.not_after - issued.not_before,
            Duration::hours(720)
        );
        cleanup(&dir);
    }

    #[test]
    fn client_certificate_has_no_sans() {
        let (engine, dir) = make_engine("client-sans");
        let issued = engine
            .issue(
                "site-001",
                Role::Client,
                &["ignored.example.com".to_string()],
                StdDuration::from_secs(24 * HOUR),
            )
            .unwrap();

        let meta = inspect(&issued.cert_pem).unwrap();
        assert!(meta.sans.is_empty());
        cleanup(&dir);
    }

    #[test]
    fn underscore_cn_not_forced_into_sans() {
        let (engine, dir) = make_engine("underscore");
        let issued = engine
            .issue(
                "mqtt_bridge",
                Role::Server,
                &["bridge.example.com".to_string()],
                StdDuration::from_secs(24 * HOUR),
            )
            .unwrap();

        let meta = inspect(&issued.cert_pem).unwrap();
        assert_eq!(meta.sans, vec!["bridge.example.com".to_string()]);
        cleanup(&dir);
    }

    #[test]
    fn bad_cn_fails_before_any_crypto() {
        let (engine, dir) = make_engine("bad-cn");
        let err = engine
            .issue("bad cn!", Role::Client, &[], StdDuration::from_secs(HOUR))
            .unwrap_err();
        assert!(matches!(err, CaError::Validation(_)));
        cleanup(&dir);
    }

    #[test]
    fn excessive_validity_rejected() {
        let dir = temp_data_dir("ceiling");
        let authority = RootAuthority::create("Warden Test Root", &dir).unwrap();
        let engine = LocalEngine::new(authority, StdDuration::from_secs(720 * HOUR));

        let err = engine
            .issue(
                "site-001",
                Role::Client,
                &[],
                StdDuration::from_secs(721 * HOUR),
            )
            .unwrap_err();
        assert!(matches!(err, CaError::Validation(_)));
        cleanup(&dir);
    }

    #[test]
    fn issuance_never_reuses_keys_or_serials() {
        let (engine, dir) = make_engine("unique");
        let a = engine
            .issue("site-001", Role::Client, &[], StdDuration::from_secs(HOUR))
            .unwrap();
        let b = engine
            .issue("site-001", Role::Client, &[], StdDuration::from_secs(HOUR))
            .unwrap();

        assert_ne!(a.key_pem, b.key_pem);
        assert_ne!(a.serial, b.serial);
        assert_ne!(a.fingerprint, b.fingerprint);
        cleanup(&dir);
    }

    #[test]
    fn fullchain_contains_leaf_and_root() {
        let (engine, dir) = make_engine("fullchain");
        let issued = engine
            .issue("site-001", Role::Client, &[], StdDuration::from_secs(HOUR))
            .unwrap();

        assert!(issued.fullchain_pem.contains(&issued.cert_pem));
        assert!(issued
            .fullchain_pem
            .contains(&engine.root_certificate_pem()));
        assert_eq!(
            issued.fullchain_pem.matches("BEGIN CERTIFICATE").count(),
            2
        );
        cleanup(&dir);
    }

    #[test]
    fn health_probe_succeeds_on_working_engine() {
        let (engine, dir) = make_engine("probe");
        engine.health_probe().unwrap();
        cleanup(&dir);
    }

    #[test]
    fn root_fingerprint_is_stable() {
        let (engine, dir) = make_engine("stable-fp");
        assert_eq!(engine.root_fingerprint(), engine.root_fingerprint());
        cleanup(&dir);
    }

    #[test]
    fn inspect_rejects_garbage() {
        assert!(matches!(
            inspect("not a certificate"),
            Err(CaError::Validation(_))
        ));
    }
}
