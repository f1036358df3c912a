//! Read-side commands: revoke, list, expiring, health, fingerprint.

use warden_ca::protocol::RevokeRequest;
use warden_client::WardenClient;
use warden_common::paths::DataDir;
use warden_crypto::pinning;

use crate::cli::{EndpointArgs, ExpiringArgs, FingerprintArgs, ListArgs, RevokeArgs};

pub fn revoke(args: RevokeArgs) -> anyhow::Result<()> {
    let client = WardenClient::new(&args.endpoint.endpoint);
    let response = client.revoke(&RevokeRequest {
        cn: args.cn,
        provisioner_secret: args.provisioner_secret,
    })?;
    println!(
        "revoked {} (serial {}) at {}",
        response.cn, response.serial, response.revoked_at
    );
    Ok(())
}

pub fn list(args: ListArgs, json: bool) -> anyhow::Result<()> {
    let client = WardenClient::new(&args.endpoint.endpoint);
    let inventory = client.inventory(args.status.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }
    if inventory.certificates.is_empty() {
        println!("no certificates");
        return Ok(());
    }
    println!(
        "{:<24} {:<8} {:<8} {:<22} {}",
        "CN", "ROLE", "STATUS", "SERIAL", "EXPIRES"
    );
    for record in &inventory.certificates {
        println!(
            "{:<24} {:<8} {:<8} {:<22} {}",
            record.cn,
            record.role.as_str(),
            match record.status {
                warden_ca::inventory::CertStatus::Active => "active",
                warden_ca::inventory::CertStatus::Revoked => "revoked",
            },
            record.serial,
            record.expires_at
        );
    }
    Ok(())
}

pub fn expiring(args: ExpiringArgs, json: bool) -> anyhow::Result<()> {
    let client = WardenClient::new(&args.endpoint.endpoint);
    let inventory = client.expiring(args.within.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }
    if inventory.certificates.is_empty() {
        println!("nothing approaching expiry");
        return Ok(());
    }
    for record in &inventory.certificates {
        println!("{:<24} expires {}", record.cn, record.expires_at);
    }
    Ok(())
}

pub fn health(args: EndpointArgs, json: bool) -> anyhow::Result<()> {
    let client = WardenClient::new(&args.endpoint);
    let health = client.health()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        println!("status             {}", health.status);
        println!("active certs       {}", health.active_certificates);
        println!("root fingerprint   {}", health.root_fingerprint);
        if let Some(detail) = &health.detail {
            println!("detail             {detail}");
        }
    }
    if health.status != "ok" {
        anyhow::bail!("CA is degraded");
    }
    Ok(())
}

/// Print the local root's fingerprint, for relaying to sites
/// out-of-band.
pub fn fingerprint(args: FingerprintArgs) -> anyhow::Result<()> {
    let data_dir = args
        .data_dir
        .map(DataDir::new)
        .unwrap_or_else(DataDir::default_location);
    let path = data_dir.root_cert_path();
    let pem_text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    let parsed = pem::parse(&pem_text)?;
    println!("{}", pinning::fingerprint_sha256(parsed.contents()));
    Ok(())
}
