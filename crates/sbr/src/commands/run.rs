//! Run the bridge and print sync activity to the console.

use crate::output;
use anyhow::{Result, anyhow};
use crossterm::style::Stylize;
use sandbridge_core::BridgeConfig;
use sandbridge_core::events;
use sandbridge_server::Bridge;
use std::io::BufRead;
use tokio_util::sync::CancellationToken;

pub async fn execute(config: BridgeConfig) -> Result<()> {
    let (tx, mut rx) = events::channel(64);
    let port = config.port;
    let shutdown = CancellationToken::new();
    let mut bridge_task = tokio::spawn(Bridge::new(config, tx).run(shutdown.clone()));

    spawn_quit_reader(shutdown.clone());

    println!("{}", "Press Ctrl-C or 'q' + Enter to exit.".bold());
    println!();
    println!(
        "{}",
        format!("Waiting for the sandbox to connect on port {port}...").white()
    );

    let mut events_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                shutdown.cancel();
            }
            event = rx.recv(), if events_open => match event {
                Some(event) => output::print_event(&event),
                None => events_open = false,
            },
            result = &mut bridge_task => {
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(anyhow!("bridge task panicked: {e}")),
                };
            }
        }
    }
}

/// Cancel the shutdown token when the user types `q`.
///
/// Plain line-buffered stdin; the thread dies with the process, so it is
/// never joined.
fn spawn_quit_reader(shutdown: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    shutdown.cancel();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}
