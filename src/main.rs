//! rootview: browse, search, preview and delete files under one directory
//! over a WebSocket connection.

mod daemon;
mod filesystem;
mod protocol;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use filesystem::config::FileSystemConfig;
use filesystem::FileSystemService;

/// Serve a sandboxed view of one directory to WebSocket clients.
#[derive(Parser, Debug)]
#[command(name = "rootview")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory to serve; nothing outside it is reachable
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = daemon::DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Refuse delete requests
    #[arg(long)]
    read_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = match cli.root {
        Some(root) => root,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("{} cannot determine current directory: {}", "Error:".red().bold(), e);
                return ExitCode::FAILURE;
            }
        },
    };

    let config = match FileSystemConfig::for_root(&root) {
        Ok(config) => config.read_only(cli.read_only),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let fs = Arc::new(FileSystemService::new(config));
    let addr = SocketAddr::new(cli.bind, cli.port);

    println!(
        "{} {} on ws://{}{}",
        "Serving".green().bold(),
        fs.config().root.display(),
        addr,
        if fs.config().read_only {
            " (read-only)".yellow().to_string()
        } else {
            String::new()
        }
    );

    if let Err(e) = daemon::run(addr, fs).await {
        tracing::error!("Server failed: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
