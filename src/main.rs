//! bundle-scan: vulnerability scanning for compressed deployment packages
//!
//! Extracts SBOMs or root filesystems from OCI-based package archives and
//! runs an external vulnerability scanner against each extracted target.

use anyhow::Result;
use bundle_scan::cli::{self, ScanConfig};
use bundle_scan::scan::ScanMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bundle-scan")]
#[command(version)]
#[command(about = "Scan compressed deployment packages for vulnerabilities", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  All targets scanned successfully
    1  One or more targets failed to scan
    2  Error occurred

EXAMPLES:
    # Scan the SBOMs embedded in a package
    bundle-scan scan package.tar.zst

    # Scan reconstructed image root filesystems instead
    bundle-scan scan package.tar.zst --mode rootfs

    # Air-gapped scan with a local vulnerability database
    bundle-scan scan package.tar.zst --offline-db /var/lib/trivy-db -O report.csv")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments for the `scan` subcommand
#[derive(Parser)]
struct ScanArgs {
    /// Path to the compressed package archive
    archive: PathBuf,

    /// Artifact kind to extract and scan
    #[arg(long, value_enum, default_value = "sbom")]
    mode: ScanMode,

    /// Scanner binary name or path
    #[arg(long, env = "BUNDLE_SCAN_SCANNER", default_value = "trivy")]
    scanner: String,

    /// Offline vulnerability database directory (enables air-gapped scanning)
    #[arg(long, env = "BUNDLE_SCAN_OFFLINE_DB")]
    offline_db: Option<PathBuf>,

    /// CSV report output path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a package archive and scan its contents
    Scan(ScanArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Scan(args) => {
            let config = ScanConfig {
                archive: args.archive,
                mode: args.mode,
                scanner: args.scanner,
                offline_db: args.offline_db,
                output_file: args.output_file,
            };
            let exit_code = cli::run_scan(config)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}
