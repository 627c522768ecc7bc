//! # Snapshot Inspector
//!
//! Prints the commerce snapshots stored in the configured backends.
//!
//! ## Usage
//! ```bash
//! # Use the default config file (or defaults + environment)
//! cargo run -p vitrine-store --bin vitrine-inspect
//!
//! # Use a specific config file
//! cargo run -p vitrine-store --bin vitrine-inspect -- --config ./store.toml
//!
//! # Summary only, no JSON
//! cargo run -p vitrine-store --bin vitrine-inspect -- --summary
//! ```
//!
//! Set `RUST_LOG=debug` to see backend activity.

use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vitrine_core::Snapshot;
use vitrine_store::backend::{open_local, open_remote};
use vitrine_store::{LocalStore, StoreConfig, StoreResult};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut summary_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--summary" | "-s" => summary_only = true,
            "--help" | "-h" => {
                println!("Vitrine Snapshot Inspector");
                println!();
                println!("Usage: vitrine-inspect [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -s, --summary        Print summaries only");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    let config = StoreConfig::load(config_path)?;

    println!("Vitrine Snapshot Inspector");
    println!("==========================");
    match config.database_path() {
        Some(path) => println!("Local store:   {}", path.display()),
        None => println!("Local store:   (no data directory)"),
    }
    match config.replica_directory() {
        Some(dir) => println!("Replica:       {}", dir.display()),
        None => println!("Replica:       (in-memory, nothing to inspect)"),
    }
    println!();

    let local = open_local(&config).await?;
    if !local.health_check().await {
        eprintln!("⚠ Local store failed its health check");
    }
    let remote = open_remote(&config).await?;
    if let Err(e) = remote.synchronize().await {
        eprintln!("⚠ Replica synchronize failed: {}", e);
    }

    let local_blob = local.get(&config.keys.local).await;
    let written_at = local.updated_at(&config.keys.local).await.ok().flatten();
    report("local", &config.keys.local, local_blob, written_at, summary_only)?;

    let remote_blob = remote.get(&config.keys.remote).await;
    report("remote", &config.keys.remote, remote_blob, None, summary_only)?;

    local.close().await;
    Ok(())
}

/// Prints one stored blob.
fn report(
    label: &str,
    key: &str,
    blob: StoreResult<Option<Vec<u8>>>,
    written_at: Option<String>,
    summary_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("[{}] {}", label, key);
    if let Some(written_at) = written_at {
        println!("  last written: {}", written_at);
    }

    let bytes = match blob {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            println!("  (empty)");
            println!();
            return Ok(());
        }
        Err(e) => {
            println!("  ✗ read failed: {}", e);
            println!();
            return Ok(());
        }
    };

    match Snapshot::decode(&bytes) {
        Ok(snapshot) => {
            println!("  ✓ version {} ({} bytes)", snapshot.version, bytes.len());
            println!(
                "  acquired: {}  wishlist: {}  orders: {}  hidden: {}  badges: {}",
                snapshot.acquired.len(),
                snapshot.wishlist.len(),
                snapshot.orders.len(),
                snapshot.hidden_product_refs.len(),
                snapshot.badge_labels.len()
            );
            if let Some(featured) = &snapshot.featured_product_ref {
                println!("  featured: {}", featured);
            }
            if !summary_only {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        }
        Err(e) => println!("  ✗ unusable snapshot ({} bytes): {}", bytes.len(), e),
    }

    println!();
    Ok(())
}

/// Initializes tracing from `RUST_LOG`, quiet by default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,vitrine_store=info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
