mod config;
mod error;
mod handlers;
mod state;

use clap::Parser;
use framevault_core::framelog::FrameLog;
use framevault_core::FrameStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{parse_size, ServerSection};
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "framevault-server", version, about = "frame archive server for capture devices")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8787")]
    listen: String,

    /// Root directory for archived frames and the metadata log
    #[arg(short, long, default_value = "/var/lib/framevault")]
    data_dir: String,

    /// Maximum number of archived frames kept on disk
    #[arg(long, default_value_t = 2000)]
    max_keep: usize,

    /// Append one CSV metadata row per ingested frame
    #[arg(long, default_value_t = false)]
    frame_log: bool,

    /// Log output format: "json" or "pretty"
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// Maximum upload size (e.g. "10M", "512K", plain bytes)
    #[arg(long, default_value = "10M", value_parser = parse_size)]
    max_upload: usize,

    /// Maximum number of blocking threads for file I/O (minimum 1)
    #[arg(long, default_value_t = 6, value_parser = parse_min_one)]
    max_blocking_threads: usize,

    /// Number of tokio worker threads (minimum 1)
    #[arg(long, default_value_t = 4, value_parser = parse_min_one)]
    worker_threads: usize,
}

fn parse_min_one(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(n)
}

fn main() {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.worker_threads)
        .max_blocking_threads(cli.max_blocking_threads)
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to build tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(async_main(cli));
}

async fn async_main(cli: Cli) {
    // Shared upload token; an empty value disables the check
    let token = std::env::var("FRAMEVAULT_TOKEN").unwrap_or_default();

    let config = ServerSection {
        listen: cli.listen,
        data_dir: cli.data_dir,
        token,
        max_keep: cli.max_keep,
        log_format: cli.log_format,
        frame_log: cli.frame_log,
        max_upload_bytes: cli.max_upload,
    };

    // Initialize tracing
    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt().json().init();
        }
        _ => {
            tracing_subscriber::fmt().init();
        }
    }

    if config.token.is_empty() {
        warn!("FRAMEVAULT_TOKEN not set; token check disabled");
    }

    let data_dir = std::path::PathBuf::from(&config.data_dir);
    std::fs::create_dir_all(&data_dir).unwrap_or_else(|e| {
        eprintln!("Error: cannot create data directory '{}': {e}", config.data_dir);
        std::process::exit(1);
    });

    let mut store = FrameStore::new(data_dir.join("uploads"), config.max_keep);
    if config.frame_log {
        let log_path = data_dir.join("frames.csv");
        let log = FrameLog::open(&log_path).await.unwrap_or_else(|e| {
            eprintln!("Error: cannot open frame log '{}': {e}", log_path.display());
            std::process::exit(1);
        });
        store = store.with_frame_log(log);
    }
    store.init().await.unwrap_or_else(|e| {
        eprintln!("Error: cannot create upload directory: {e}");
        std::process::exit(1);
    });

    let listen_addr = config.listen.clone();
    let state = AppState::new(config, store);
    let app = handlers::router(state);

    info!("framevault-server listening on {listen_addr}");
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("Error: cannot bind to {listen_addr}: {e}");
        std::process::exit(1);
    });
    axum::serve(listener, app).await.unwrap();
}
