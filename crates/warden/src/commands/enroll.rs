//! The `enroll` command — trust bootstrap plus certificate issuance
//! for a remote site.
//!
//! Nothing is written until the fetched root passes fingerprint
//! verification; a mismatch exits with code 2 so orchestration can
//! distinguish "do not trust this CA" from transient failures.

use warden_ca::protocol::IssueRequest;
use warden_client::{ClientError, WardenClient};

use crate::cli::EnrollArgs;

/// Exit code for a root fingerprint mismatch.
const EXIT_TRUST_MISMATCH: i32 = 2;

pub fn run(args: EnrollArgs, json: bool) -> anyhow::Result<()> {
    let client = WardenClient::new(&args.ca_url);

    let root = match client.bootstrap(&args.fingerprint) {
        Ok(root) => root,
        Err(e @ ClientError::TrustMismatch { .. }) => {
            eprintln!("{e}");
            eprintln!("refusing to enroll — the CA endpoint is not the one you pinned");
            std::process::exit(EXIT_TRUST_MISMATCH);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(fingerprint = %root.fingerprint, "Root certificate verified");

    let request = IssueRequest {
        cn: args.cn.clone(),
        role: args.role,
        sans: args.sans,
        validity: args.validity,
        provisioner_secret: args.provisioner_secret,
    };
    let response = client.issue(&request)?;

    std::fs::create_dir_all(&args.out)?;
    let ca_path = args.out.join("ca.crt");
    let cert_path = args.out.join(format!("{}.crt", args.cn));
    let key_path = args.out.join(format!("{}.key", args.cn));
    let chain_path = args.out.join(format!("{}.fullchain.crt", args.cn));

    std::fs::write(&ca_path, &root.pem)?;
    std::fs::write(&cert_path, &response.cert_pem)?;
    warden_crypto::keys::save_private_key_pem(&key_path, &response.key_pem)?;
    std::fs::write(&chain_path, &response.fullchain_pem)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "cn": response.cn,
                "serial": response.serial,
                "fingerprint": response.fingerprint,
                "not_after": response.not_after,
                "files": [ca_path, cert_path, key_path, chain_path],
            })
        );
    } else {
        println!("enrolled {} (serial {})", response.cn, response.serial);
        println!("  expires      {}", response.not_after);
        println!("  fingerprint  {}", response.fingerprint);
        for path in [&ca_path, &cert_path, &key_path, &chain_path] {
            println!("  wrote        {}", path.display());
        }
    }
    Ok(())
}
