pub(crate) mod cli;
mod commands;

use clap::Parser;

use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => cli.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => commands::serve::run(args),
        Command::Enroll(args) => commands::enroll::run(args, cli.json),
        Command::Revoke(args) => commands::inspect::revoke(args),
        Command::List(args) => commands::inspect::list(args, cli.json),
        Command::Expiring(args) => commands::inspect::expiring(args, cli.json),
        Command::Health(args) => commands::inspect::health(args, cli.json),
        Command::Fingerprint(args) => commands::inspect::fingerprint(args),
    }
}
