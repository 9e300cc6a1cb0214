//! fincrypt-compute: untrusted compute party
//!
//! Accepts owner sessions over TCP and evaluates budgeting pipelines on
//! encrypted inputs. Never sees a secret key or a plaintext amount.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fincrypt::session::run_server;
use fincrypt::{ServerConfig, SessionVariant};

#[derive(Parser)]
#[command(name = "fincrypt-compute")]
#[command(about = "Compute party for confidential budget sessions")]
#[command(version)]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Per-frame read/write deadline in seconds (0 disables it)
    #[arg(long)]
    io_timeout_secs: Option<u64>,

    /// Largest accepted frame in MiB
    #[arg(long)]
    max_frame_mib: Option<u64>,

    /// Accept the insecure test parameter set
    #[arg(long)]
    allow_insecure_params: bool,

    /// Savings rate applied by the budget pipelines
    #[arg(long)]
    savings_rate: Option<f64>,

    /// Restrict accepted variants (repeatable)
    #[arg(long = "variant")]
    variants: Vec<SessionVariant>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(secs) = self.io_timeout_secs {
            config.io_timeout_secs = secs;
        }
        if let Some(mib) = self.max_frame_mib {
            config.max_frame_len = mib.saturating_mul(1024 * 1024);
        }
        if self.allow_insecure_params {
            config.allow_insecure_params = true;
        }
        if let Some(rate) = self.savings_rate {
            config.savings_rate = rate;
        }
        if !self.variants.is_empty() {
            config.allowed_variants = self.variants;
        }

        config.validate().wrap_err("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Args::parse().into_config()?;

    info!("fincrypt compute party");
    info!("Bind address: {}", config.bind);
    info!(
        "Accepted variants: {}",
        config
            .allowed_variants
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("Savings rate: {}", config.savings_rate);
    if config.allow_insecure_params {
        info!("Insecure parameter sets are accepted");
    }

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    println!();
    println!("=== fincrypt compute party running ===");
    println!("Listening on: {}", config.bind);
    println!();

    let config = Arc::new(config);
    tokio::select! {
        served = run_server(listener, config) => served.wrap_err("Server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
