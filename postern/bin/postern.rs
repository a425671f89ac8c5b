#[cfg(not(unix))]
compile_error!("Only unix is currently supported");

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use postern::Postern;
use postern_common::{logging, record::TracingRecorder};

/// Receive one SMTP conversation on an inherited socket
#[derive(Parser, Debug)]
#[command(name = "postern")]
#[command(version)]
struct Cli {
    /// Configuration file to use instead of the default search
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Descriptor of the accepted connection
    #[arg(default_value_t = 0)]
    fd: i32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => find_config_file()?,
    };
    let postern = Postern::load(&config_path)?;

    logging::init(&postern.logging)?;

    // SAFETY: the supervisor passes us sole ownership of an accepted socket.
    let stream = unsafe { postern::socket::adopt(cli.fd) }?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr().ok();

    postern
        .serve(stream, peer, local, Arc::new(TracingRecorder))
        .await?;

    Ok(())
}

/// Find the configuration file using the following precedence:
/// 1. `POSTERN_CONFIG` environment variable
/// 2. ./postern.config.ron (current working directory)
/// 3. /etc/postern/postern.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("POSTERN_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "POSTERN_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./postern.config.ron"),
        PathBuf::from("/etc/postern/postern.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - POSTERN_CONFIG environment variable\n{paths_tried}"
    )
}
