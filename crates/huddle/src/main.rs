//! # huddle
//!
//! Chat hub binary: `huddle serve` runs the hub, `huddle chat` joins one from
//! the terminal.

#![deny(unsafe_code)]

mod chat;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Real-time chat hub.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "Real-time chat hub", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hub server.
    Serve(ServeArgs),
    /// Join a hub from the terminal.
    Chat(ChatArgs),
}

/// `huddle serve` flags. Each one overrides the loaded settings.
#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// `SQLite` database path, or `:memory:`.
    #[arg(long)]
    db_path: Option<String>,

    /// Settings file (defaults to `~/.huddle/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

/// `huddle chat` arguments.
#[derive(Args, Debug)]
struct ChatArgs {
    /// Username to join as; prompted for when omitted.
    username: Option<String>,

    /// Hub base URL.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Serve(args) => serve::run(args).await,
        Command::Chat(args) => chat::run(args).await,
    }
}
