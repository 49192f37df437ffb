//! Ferry booking service CLI server
//!
//! Headless booking and payment reconciliation service suitable for
//! deployment as a systemd service, Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/ferry-booking/config.toml)
//! ferry-booking
//!
//! # Custom config path
//! ferry-booking --config /etc/ferry-booking/config.toml
//!
//! # Override port
//! ferry-booking --api-port 8080
//!
//! # Validate config without starting
//! ferry-booking --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use ferry_booking::config::AppConfig;
use ferry_booking::server::{init_tracing, ServerHandle, ServerOptions};

/// Ferry booking service with Midtrans payment reconciliation.
#[derive(Parser, Debug)]
#[command(
    name = "ferry-booking",
    version,
    about = "Ferry ticket booking and payment reconciliation service",
    long_about = "REST API server for ferry bookings: capacity-safe reservations, \
                  payment initiation and reconciliation against Midtrans, \
                  and automatic expiry of unpaid bookings.\n\n\
                  Default config: ~/.config/ferry-booking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "FERRY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(ferry_booking::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(mut cfg) => {
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(level))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            AppConfig::default()
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }
    if let Some(ref level) = cli.log_level {
        info!("CLI override: log_level = {}", level);
        config.logging.level = level.clone();
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Database    : {}", config.database.connection_url());
        println!(
            "   Gateway     : {} ({})",
            config.payment.api_base_url(),
            if config.payment.is_production { "production" } else { "sandbox" }
        );
        println!(
            "   Expiry      : {} {}",
            config.payment.expiry_duration,
            config.payment.expiry_unit.as_str()
        );
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
