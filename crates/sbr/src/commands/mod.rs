//! CLI command dispatch and execution

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sandbridge_core::{BridgeConfig, MismatchPolicy};
use std::path::PathBuf;

mod run;
mod save_config;

/// sandbridge - synchronize a local directory with a sandboxed peer
#[derive(Parser, Debug)]
#[command(
    name = "sandbridge",
    version,
    about = "Synchronize a local directory with a sandboxed execution environment over WebSocket",
    long_about = "Runs a WebSocket server the sandbox connects to, then keeps the local \
                  directory and the sandbox file set bidirectionally consistent."
)]
pub struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line overrides layered over `sandbridge.toml`.
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Port to listen on for the sandbox peer
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Local directory to synchronize
    #[arg(long, global = true, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Definition file to write on connect ("skip" to disable)
    #[arg(long, global = true, value_name = "PATH")]
    def_file: Option<String>,

    /// Delay between sync cycles in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    poll_delay_ms: Option<u64>,

    /// Path prefix excluded from sync on both sides (repeatable)
    #[arg(long, global = true, value_name = "PREFIX")]
    ignore: Option<Vec<String>>,

    /// Action to take on file mismatch on first connection
    #[arg(long, global = true, value_name = "upload|download|fail")]
    on_mismatch: Option<MismatchPolicy>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(def_file) = &self.def_file {
            config.def_file = def_file.clone();
        }
        if let Some(poll_delay_ms) = self.poll_delay_ms {
            config.poll_delay_ms = poll_delay_ms;
        }
        if let Some(ignore) = &self.ignore {
            config.ignore = ignore.clone();
        }
        if let Some(on_mismatch) = self.on_mismatch {
            config.on_mismatch = on_mismatch;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bridge server and begin synchronizing files
    Run,

    /// Write the merged configuration to sandbridge.toml for future runs
    SaveConfig,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let mut config = BridgeConfig::load(&cwd)?;
        self.overrides.apply(&mut config);

        match self.command {
            Commands::Run => run::execute(config).await,
            Commands::SaveConfig => save_config::execute(&config, &cwd),
        }
    }
}
