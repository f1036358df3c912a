//! ECDSA P-256 key generation and on-disk storage.
//!
//! The root authority's private key is stored as PKCS#8 PEM with 0600
//! permissions under the restricted `authority/` namespace. Key
//! material is zeroized when the in-memory copy is dropped.

use std::path::Path;

use p256::ecdsa::SigningKey;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key encoding error: {0}")]
    KeyEncoding(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// ECDSA P-256 signing key. The inner scalar is zeroized by `p256`
/// when dropped.
pub struct RootKeyPair {
    signing_key: SigningKey,
}

impl RootKeyPair {
    /// Generate a fresh key pair from the OS CSPRNG.
    /// Key material is never reused across calls.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Export the private key in PKCS#8 PEM form.
    /// The returned buffer zeroizes on drop.
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }

    /// Export the public key in SPKI PEM form.
    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        Ok(Self { signing_key })
    }
}

/// Write a private key PEM to `path` with restrictive permissions.
pub fn save_private_key_pem(path: &Path, pem: &str) -> Result<(), CryptoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pem)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::debug!(path = %path.display(), "Private key saved");
    Ok(())
}

/// Load a private key from a PKCS#8 PEM file.
pub fn load_private_key(path: &Path) -> Result<RootKeyPair, CryptoError> {
    let pem = Zeroizing::new(std::fs::read_to_string(path)?);
    RootKeyPair::from_pkcs8_pem(&pem)
}
