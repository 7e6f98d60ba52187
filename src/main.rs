//! Dungeons of Doom server binary.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dod::ServerConfig;
use dod::config::{DEFAULT_MAP_PATH, DEFAULT_PORT};
use tracing_subscriber::EnvFilter;

/// Dungeons of Doom - a multiplayer dungeon-crawl game server
#[derive(Parser, Debug)]
#[command(name = "dod")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Map description file
    #[arg(short, long, default_value = DEFAULT_MAP_PATH)]
    map: PathBuf,

    /// Spawn RNG seed (default: random)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_filter: String,
}

impl Args {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            port: self.port,
            map_path: self.map.clone(),
            seed: self.seed,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli::serve::execute(&args.config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
