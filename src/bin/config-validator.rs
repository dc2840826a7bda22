//! # Shard Proxy Configuration Validator
//!
//! Loads a proxy configuration the same way the proxy does (defaults, optional
//! file, `SHARD_PROXY_*` environment overrides), validates it and prints the
//! effective result.

use anyhow::Context;
use clap::Parser;
use shard_proxy::config::ProxyConfig;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate shard proxy configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults and environment only when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the effective configuration as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match run(&cli) {
        Ok(()) => info!("✅ Configuration is valid"),
        Err(e) => {
            error!("❌ {e:#}");
            eprintln!("invalid configuration: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = ProxyConfig::load_from(cli.config.as_deref())
        .context("failed to load proxy configuration")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("failed to render configuration")?
        );
    } else {
        println!("mode:                       {:?}", config.mode);
        println!("show_sql:                   {}", config.show_sql);
        println!("refresh_metadata_on_ddl:    {}", config.refresh_metadata_on_ddl);
        println!(
            "backend.connection_timeout: {:?}",
            config.backend.connection_timeout()
        );
        println!(
            "backend.execution_timeout:  {:?}",
            config.backend.execution_timeout()
        );
        println!(
            "backend.max_connections:    {}",
            config.backend.max_connections_per_target
        );
    }
    Ok(())
}
