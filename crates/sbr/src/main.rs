//! sandbridge - keep a local directory in sync with a sandboxed peer
//!
//! A thin CLI over the sandbridge engine: the sandbox connects to us over
//! WebSocket and both sides are kept bidirectionally consistent.

use clap::Parser;
use crossterm::style::Stylize;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    sandbridge_core::logging::init();
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}
