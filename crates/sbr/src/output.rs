//! Console presentation of bridge events.

use crossterm::style::Stylize;
use sandbridge_core::events::BridgeEvent;
use sandbridge_core::FileAction;

pub fn print_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::Connected => {
            println!("{}", "Sandbox connected.".green().bold());
        }
        BridgeEvent::Disconnected => {
            println!("{}", "Sandbox disconnected.".red().bold());
            println!("{}", "Waiting for the sandbox to connect...".white());
        }
        BridgeEvent::Error(message) => {
            eprintln!("{} {message}", "error:".red().bold());
        }
        BridgeEvent::FileChanges { changes, is_initial } => {
            if *is_initial && !changes.is_empty() {
                println!(
                    "{}",
                    format!("Initial sync: {} change(s) to reconcile.", changes.len()).white()
                );
            }
        }
        BridgeEvent::FileAction { file, action } => {
            let (marker, label) = match action {
                FileAction::Uploaded => ("↑".green(), "upload       "),
                FileAction::Downloaded => ("↓".green(), "download     "),
                FileAction::LocalDeleted => ("✗".red(), "delete local "),
                FileAction::RemoteDeleted => ("✗".red(), "delete remote"),
            };
            println!(
                "{marker} {} {}",
                label.dark_grey(),
                file.as_str().blue().underlined()
            );
        }
        BridgeEvent::DefinitionsWritten { path } => {
            println!(
                "{} {} {}",
                "←".green(),
                "definitions  ".dark_grey(),
                path.display().to_string().blue().underlined()
            );
        }
    }
}
