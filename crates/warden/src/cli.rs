use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Default HTTP listen address for `warden serve`.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8443";

#[derive(Parser, Debug)]
#[command(
    name = "warden",
    version,
    about = "Minimal certificate authority for IoT fleet mTLS"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "WARDEN_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the CA lifecycle service
    Serve(ServeArgs),
    /// Bootstrap trust and obtain a certificate from a running CA
    Enroll(EnrollArgs),
    /// Revoke the active certificate for a CN
    Revoke(RevokeArgs),
    /// List the certificate inventory
    List(ListArgs),
    /// List active certificates approaching expiry
    Expiring(ExpiringArgs),
    /// Check CA health
    Health(EndpointArgs),
    /// Print the local root certificate's SHA-256 fingerprint
    Fingerprint(FingerprintArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address for the HTTP API
    #[arg(long, env = "WARDEN_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Data directory (default: ~/.warden)
    #[arg(long, env = "WARDEN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Common name of the root certificate created on first run
    #[arg(long, env = "WARDEN_ROOT_NAME", default_value = "Warden Root CA")]
    pub root_name: String,

    /// Provisioner principal authorized for issuance and revocation
    #[arg(long, env = "WARDEN_PROVISIONER", default_value = "iot-devices")]
    pub provisioner_name: String,

    /// Provisioner secret — inject via the environment in deployments
    #[arg(long, env = "WARDEN_PROVISIONER_SECRET", hide_env_values = true)]
    pub provisioner_secret: String,

    /// Validity applied when a request omits one
    #[arg(long, env = "WARDEN_DEFAULT_VALIDITY", default_value = "720h",
          value_parser = humantime::parse_duration)]
    pub default_validity: Duration,

    /// Ceiling on requested validity
    #[arg(long, env = "WARDEN_MAX_VALIDITY", default_value = "8760h",
          value_parser = humantime::parse_duration)]
    pub max_validity: Duration,
}

#[derive(Args, Debug)]
pub struct EndpointArgs {
    /// CA endpoint (e.g. "http://ca.internal:8443")
    #[arg(long, env = "WARDEN_ENDPOINT")]
    pub endpoint: String,
}

#[derive(Args, Debug)]
pub struct EnrollArgs {
    /// Site name to enroll (becomes the certificate CN)
    pub cn: String,

    /// CA endpoint (e.g. "http://ca.internal:8443")
    pub ca_url: String,

    /// Pinned root fingerprint, relayed out-of-band (hex, colons optional)
    pub fingerprint: String,

    /// Provisioner secret — inject via the environment in deployments
    #[arg(env = "WARDEN_PROVISIONER_SECRET", hide_env_values = true)]
    pub provisioner_secret: String,

    /// Certificate role: "client" or "server"
    #[arg(long, default_value = "client")]
    pub role: String,

    /// Subject alternative name (repeatable; server role only)
    #[arg(long = "san")]
    pub sans: Vec<String>,

    /// Requested validity (server default applies when omitted)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub validity: Option<Duration>,

    /// Directory to write ca.crt, <cn>.crt, <cn>.key, <cn>.fullchain.crt
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct RevokeArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Common name whose active certificate should be revoked
    #[arg(long)]
    pub cn: String,

    /// Provisioner secret — inject via the environment in deployments
    #[arg(long, env = "WARDEN_PROVISIONER_SECRET", hide_env_values = true)]
    pub provisioner_secret: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Filter: "active", "revoked", or "all"
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug)]
pub struct ExpiringArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Expiry window (e.g. "168h"; server default applies when omitted)
    #[arg(long)]
    pub within: Option<String>,
}

#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// Data directory (default: ~/.warden)
    #[arg(long, env = "WARDEN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn enroll_takes_positional_site_url_fingerprint_secret() {
        let cli = Cli::parse_from([
            "warden",
            "enroll",
            "site-001",
            "http://ca:8443",
            "ab:cd:ef",
            "hunter2",
            "--role",
            "server",
            "--san",
            "a.example.com",
            "--san",
            "b.example.com",
            "--validity",
            "720h",
        ]);
        match cli.command {
            Command::Enroll(args) => {
                assert_eq!(args.cn, "site-001");
                assert_eq!(args.ca_url, "http://ca:8443");
                assert_eq!(args.fingerprint, "ab:cd:ef");
                assert_eq!(args.provisioner_secret, "hunter2");
                assert_eq!(args.sans.len(), 2);
                assert_eq!(args.validity, Some(Duration::from_secs(720 * 3600)));
            }
            other => panic!("expected enroll, got {other:?}"),
        }
    }

    #[test]
    fn health_parses_endpoint_flag() {
        let cli = Cli::parse_from(["warden", "health", "--endpoint", "http://ca:8443"]);
        match cli.command {
            Command::Health(args) => assert_eq!(args.endpoint, "http://ca:8443"),
            other => panic!("expected health, got {other:?}"),
        }
    }
}
