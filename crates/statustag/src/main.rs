//! # statustag
//!
//! statustag server binary: wires settings, logging, the image store and the
//! device WebSocket server together.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use statustag_core::{DeviceId, ImageSource};
use statustag_server::{ServerConfig, StatustagServer, metrics};
use statustag_settings::StatustagSettings;
use statustag_store::{Database, MemoryImageSource, SqliteImageSource};

/// How long open device sessions get to close on Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream images to small WebSocket displays.
#[derive(Parser, Debug)]
#[command(name = "statustag", about = "Device image streaming server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the device server.
    Serve(ServeArgs),
    /// Store an image and make it a device's active image.
    Push {
        /// Device id the image is for.
        #[arg(long)]
        device: String,
        /// Image file (PNG, JPEG, GIF, ...).
        #[arg(long)]
        image: PathBuf,
        /// Path to the `SQLite` database.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,
    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,
    /// Serve from an in-memory image source instead of `SQLite`.
    #[arg(long, conflicts_with = "db_path")]
    memory: bool,
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_database(path: &Path) -> Result<Database> {
    ensure_parent_dir(path)?;
    Database::open(path).with_context(|| format!("Failed to open database: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = statustag_settings::load_settings().context("Failed to load settings")?;
    let _logging =
        statustag_logging::init_subscriber(&settings.logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::Serve(args) => serve(settings, args).await,
        Command::Push { device, image, db_path } => push(&settings, &device, &image, db_path),
    }
}

async fn serve(settings: StatustagSettings, args: ServeArgs) -> Result<()> {
    let mut config = ServerConfig::from_settings(&settings);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let source: Arc<dyn ImageSource> = if args.memory {
        tracing::info!("serving from in-memory image source");
        Arc::new(MemoryImageSource::new())
    } else {
        let db_path = args
            .db_path
            .unwrap_or_else(|| PathBuf::from(&settings.store.db_path));
        let db = open_database(&db_path)?;
        tracing::info!(path = %db_path.display(), "image store opened");
        Arc::new(SqliteImageSource::new(db, settings.streaming.default_max_file_size))
    };

    let mut server = StatustagServer::new(config, source);
    match metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    let (addr, serve_handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(%addr, "ready for devices");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    server.shutdown().graceful_shutdown(Some(SHUTDOWN_TIMEOUT)).await;
    serve_handle.await.context("Server task failed")?;
    tracing::info!("server stopped");
    Ok(())
}

fn push(settings: &StatustagSettings, device: &str, image: &Path, db_path: Option<PathBuf>) -> Result<()> {
    let data = std::fs::read(image).with_context(|| format!("Failed to read image: {}", image.display()))?;

    let db_path = db_path.unwrap_or_else(|| PathBuf::from(&settings.store.db_path));
    let db = open_database(&db_path)?;
    let source = SqliteImageSource::new(db, settings.streaming.default_max_file_size);

    let device = DeviceId::from(device);
    let row = source
        .images()
        .push(&device, &data)
        .with_context(|| format!("Failed to store image for device {device}"))?;

    tracing::info!(
        device_id = %device,
        image_id = row.id,
        format = row.format.as_str(),
        size = row.size,
        "image pushed"
    );
    println!("image {} is now active for {device}", row.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["statustag", "serve", "--host", "0.0.0.0", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
                assert_eq!(args.port, Some(9000));
                assert!(!args.memory);
            }
            Command::Push { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn memory_conflicts_with_db_path() {
        let result = Cli::try_parse_from(["statustag", "serve", "--memory", "--db-path", "/tmp/x.db"]);
        assert!(result.is_err());
    }

    #[test]
    fn push_requires_device_and_image() {
        assert!(Cli::try_parse_from(["statustag", "push", "--device", "d"]).is_err());
        let cli = Cli::try_parse_from(["statustag", "push", "--device", "d", "--image", "a.png"]).unwrap();
        assert!(matches!(cli.command, Command::Push { ref device, .. } if device == "d"));
    }

    #[test]
    fn push_stores_active_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.gif");
        std::fs::write(&image, b"GIF89a-not-really").unwrap();
        let mut settings = StatustagSettings::default();
        settings.store.db_path = dir.path().join("db").join("s.db").to_string_lossy().into_owned();

        push(&settings, "dev1", &image, None).unwrap();

        let db = Database::open(Path::new(&settings.store.db_path)).unwrap();
        let source = SqliteImageSource::new(db, 1_000);
        let rows = source.images().list_for_device(&DeviceId::from("dev1")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].format.as_str(), statustag_core::ImageFormat::Animated.as_str());
    }
}
