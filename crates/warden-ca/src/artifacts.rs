//! Per-CN certificate artifacts on disk.
//!
//! Each active CN owns `certs/<cn>/` with `cert.pem`, `key.pem` (0600),
//! `ca.pem`, and `fullchain.pem`. Revocation renames the directory to
//! `certs/<cn>.revoked` so material is archived, never destroyed, and
//! the CN becomes free for re-issuance.

use std::path::PathBuf;

use warden_common::paths::DataDir;
use warden_crypto::keys;

use crate::engine::IssuedCert;
use crate::error::CaError;

const CERT_FILENAME: &str = "cert.pem";
const KEY_FILENAME: &str = "key.pem";
const CA_FILENAME: &str = "ca.pem";
const FULLCHAIN_FILENAME: &str = "fullchain.pem";

/// Suffix for the temporary stash of a CN's previous artifacts during
/// reissue. CNs cannot contain dots, so this never collides with
/// another CN's directory.
const STASH_SUFFIX: &str = ".prev";

fn stash_dir(data_dir: &DataDir, cn: &str) -> PathBuf {
    data_dir.certs_dir().join(format!("{cn}{STASH_SUFFIX}"))
}

/// Write the full artifact set for a freshly issued certificate.
/// Returns the CN directory so a failed commit can roll it back.
pub fn write_bundle(
    data_dir: &DataDir,
    cn: &str,
    issued: &IssuedCert,
    root_pem: &str,
) -> Result<PathBuf, CaError> {
    let dir = data_dir.cn_dir(cn);
    std::fs::create_dir_all(&dir)?;

    std::fs::write(dir.join(CERT_FILENAME), &issued.cert_pem)?;
    keys::save_private_key_pem(&dir.join(KEY_FILENAME), &issued.key_pem)
        .map_err(|e| CaError::Storage(e.to_string()))?;
    std::fs::write(dir.join(CA_FILENAME), root_pem)?;
    std::fs::write(dir.join(FULLCHAIN_FILENAME), &issued.fullchain_pem)?;

    tracing::debug!(cn, dir = %dir.display(), "Certificate bundle written");
    Ok(dir)
}

/// Remove a CN's artifact directory. Used to roll back a partially
/// completed issuance when the inventory commit fails.
pub fn remove_bundle(data_dir: &DataDir, cn: &str) -> Result<(), CaError> {
    let dir = data_dir.cn_dir(cn);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

/// Move a CN's current artifacts aside before a reissue overwrites
/// them. Returns whether anything was stashed. A failed commit
/// restores the stash so the previous active record keeps its backing
/// files; a successful commit discards it.
pub fn stash_bundle(data_dir: &DataDir, cn: &str) -> Result<bool, CaError> {
    let active = data_dir.cn_dir(cn);
    if !active.exists() {
        return Ok(false);
    }
    let stash = stash_dir(data_dir, cn);
    if stash.exists() {
        std::fs::remove_dir_all(&stash)?;
    }
    std::fs::rename(&active, &stash)?;
    Ok(true)
}

/// Put a stashed bundle back as the CN's active artifacts, replacing
/// whatever a failed reissue left behind.
pub fn restore_stashed(data_dir: &DataDir, cn: &str) -> Result<(), CaError> {
    let active = data_dir.cn_dir(cn);
    let stash = stash_dir(data_dir, cn);
    if !stash.exists() {
        return Ok(());
    }
    if active.exists() {
        std::fs::remove_dir_all(&active)?;
    }
    std::fs::rename(&stash, &active)?;
    Ok(())
}

/// Drop the stash after a successful commit.
pub fn discard_stashed(data_dir: &DataDir, cn: &str) -> Result<(), CaError> {
    let stash = stash_dir(data_dir, cn);
    if stash.exists() {
        std::fs::remove_dir_all(&stash)?;
    }
    Ok(())
}

/// Archive a revoked CN's artifacts by renaming the directory.
///
/// A stale archive from an earlier revocation of the same CN is
/// replaced, so the latest revoked material wins. A missing source
/// directory is logged and tolerated; the inventory record remains the
/// source of truth for revocation status.
pub fn archive_revoked(data_dir: &DataDir, cn: &str) -> Result<(), CaError> {
    let active = data_dir.cn_dir(cn);
    let archived = data_dir.revoked_cn_dir(cn);

    if !active.exists() {
        tracing::warn!(cn, "No artifact directory to archive for revoked certificate");
        return Ok(());
    }

    if archived.exists() {
        std::fs::remove_dir_all(&archived)?;
    }
    std::fs::rename(&active, &archived)?;

    tracing::info!(cn, archived = %archived.display(), "Revoked artifacts archived");
    Ok(())
}

/// Undo an archive rename, restoring the CN to active layout. Used to
/// roll back a revocation whose inventory commit failed.
pub fn unarchive(data_dir: &DataDir, cn: &str) -> Result<(), CaError> {
    let active = data_dir.cn_dir(cn);
    let archived = data_dir.revoked_cn_dir(cn);
    if archived.exists() && !active.exists() {
        std::fs::rename(&archived, &active)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_data_dir(name: &str) -> DataDir {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        DataDir::new(std::env::temp_dir().join(format!("warden-artifacts-{name}-{nanos}")))
    }

    fn fake_issued() -> IssuedCert {
        IssuedCert {
            cert_pem: "LEAF\n".into(),
            key_pem: "KEY\n".into(),
            fullchain_pem: "LEAF\nROOT\n".into(),
            serial: "12345".into(),
            fingerprint: "ab".repeat(32),
            not_before: Utc::now(),
            not_after: Utc::now(),
        }
    }

    fn cleanup(dir: &DataDir) {
        let _ = std::fs::remove_dir_all(dir.root());
    }

    #[test]
    fn bundle_contains_all_four_files() {
        let data = temp_data_dir("bundle");
        let dir = write_bundle(&data, "site-001", &fake_issued(), "ROOT\n").unwrap();

        for name in [CERT_FILENAME, KEY_FILENAME, CA_FILENAME, FULLCHAIN_FILENAME] {
            assert!(dir.join(name).exists(), "{name} missing");
        }
        assert_eq!(
            std::fs::read_to_string(dir.join(CA_FILENAME)).unwrap(),
            "ROOT\n"
        );
        cleanup(&data);
    }

    #[cfg(unix)]
    #[test]
    fn leaf_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let data = temp_data_dir("perms");
        let dir = write_bundle(&data, "site-001", &fake_issued(), "ROOT\n").unwrap();

        let mode = std::fs::metadata(dir.join(KEY_FILENAME))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        cleanup(&data);
    }

    #[test]
    fn archive_moves_directory_and_frees_cn() {
        let data = temp_data_dir("archive");
        write_bundle(&data, "site-001", &fake_issued(), "ROOT\n").unwrap();

        archive_revoked(&data, "site-001").unwrap();

        assert!(!data.cn_dir("site-001").exists());
        assert!(data.revoked_cn_dir("site-001").join(CERT_FILENAME).exists());
        cleanup(&data);
    }

    #[test]
    fn second_archive_replaces_stale_one() {
        let data = temp_data_dir("rearchive");
        write_bundle(&data, "site-001", &fake_issued(), "OLD-ROOT\n").unwrap();
        archive_revoked(&data, "site-001").unwrap();

        // Re-issue and revoke again; the archive must hold the newer material.
        write_bundle(&data, "site-001", &fake_issued(), "NEW-ROOT\n").unwrap();
        archive_revoked(&data, "site-001").unwrap();

        let ca = std::fs::read_to_string(data.revoked_cn_dir("site-001").join(CA_FILENAME))
            .unwrap();
        assert_eq!(ca, "NEW-ROOT\n");
        cleanup(&data);
    }

    #[test]
    fn archive_missing_source_is_tolerated() {
        let data = temp_data_dir("missing");
        archive_revoked(&data, "never-issued").unwrap();
    }

    #[test]
    fn remove_bundle_rolls_back_written_files() {
        let data = temp_data_dir("rollback");
        write_bundle(&data, "site-001", &fake_issued(), "ROOT\n").unwrap();

        remove_bundle(&data, "site-001").unwrap();
        assert!(!data.cn_dir("site-001").exists());
        cleanup(&data);
    }

    #[test]
    fn stash_then_restore_brings_back_previous_files() {
        let data = temp_data_dir("stash-restore");
        write_bundle(&data, "site-001", &fake_issued(), "OLD-ROOT\n").unwrap();

        assert!(stash_bundle(&data, "site-001").unwrap());
        assert!(!data.cn_dir("site-001").exists());

        // A replacement lands, then has to be rolled back
        write_bundle(&data, "site-001", &fake_issued(), "NEW-ROOT\n").unwrap();
        remove_bundle(&data, "site-001").unwrap();
        restore_stashed(&data, "site-001").unwrap();

        let ca = std::fs::read_to_string(data.cn_dir("site-001").join(CA_FILENAME)).unwrap();
        assert_eq!(ca, "OLD-ROOT\n");
        assert!(!stash_dir(&data, "site-001").exists());
        cleanup(&data);
    }

    #[test]
    fn stash_without_existing_bundle_is_a_noop() {
        let data = temp_data_dir("stash-none");
        assert!(!stash_bundle(&data, "never-issued").unwrap());
        restore_stashed(&data, "never-issued").unwrap();
    }

    #[test]
    fn discard_removes_stash_and_keeps_active() {
        let data = temp_data_dir("stash-discard");
        write_bundle(&data, "site-001", &fake_issued(), "OLD-ROOT\n").unwrap();
        stash_bundle(&data, "site-001").unwrap();
        write_bundle(&data, "site-001", &fake_issued(), "NEW-ROOT\n").unwrap();

        discard_stashed(&data, "site-001").unwrap();

        assert!(!stash_dir(&data, "site-001").exists());
        let ca = std::fs::read_to_string(data.cn_dir("site-001").join(CA_FILENAME)).unwrap();
        assert_eq!(ca, "NEW-ROOT\n");
        cleanup(&data);
    }

    #[test]
    fn unarchive_restores_active_layout() {
        let data = temp_data_dir("unarchive");
        write_bundle(&data, "site-001", &fake_issued(), "ROOT\n").unwrap();
        archive_revoked(&data, "site-001").unwrap();

        unarchive(&data, "site-001").unwrap();
        assert!(data.cn_dir("site-001").join(CERT_FILENAME).exists());
        assert!(!data.revoked_cn_dir("site-001").exists());
        cleanup(&data);
    }
}
