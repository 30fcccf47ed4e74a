mod config;
mod context;
mod dispatcher;
mod error;
mod heuristics;
mod matcher;
mod orchestrator;
mod platform;
mod scheduler;
mod ui_tree;
mod voice;

use crate::config::AutomationConfig;
use crate::orchestrator::{AutomationOrchestrator, EngineMsg, UiEvent, MESSAGING_PACKAGE};
use crate::platform::{ConsoleBridge, ConsoleGestures, PlatformBridge, ScriptedWindowSource, WindowSource};
use crate::voice::VoiceCommand;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Delay between the spoken confirmation and launching the messaging app.
const APP_LAUNCH_DELAY_MS: u64 = 1500;
const SETTINGS_PROMPT_DELAY_MS: u64 = 4000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("🎤 Meet Autopilot Started!");
    println!("--------------------------------------------------");
    println!("Type 'help' for commands.");
    println!("--------------------------------------------------");

    let bridge: Arc<dyn PlatformBridge> = Arc::new(ConsoleBridge);
    let windows = Arc::new(ScriptedWindowSource::new());
    let config = AutomationConfig::new();

    // 1. Start the engine on its own serial queue.
    let (tx, rx) = mpsc::channel::<EngineMsg>(32);
    let orchestrator = AutomationOrchestrator::new(
        AutomationConfig::new(),
        Arc::new(ConsoleGestures),
        bridge.clone(),
        windows.clone(),
        tx.clone(),
    );
    tokio::spawn(orchestrator.run(rx));

    // 2. User input loop (REPL)
    let stdin = io::stdin();
    let mut reader = io::BufReader::new(stdin);
    let mut buffer = String::new();

    print!("> ");
    let _ = io::stdout().flush().await;

    while reader.read_line(&mut buffer).await? > 0 {
        let input = buffer.trim().to_string();
        buffer.clear();

        if input.is_empty() {
            print!("> ");
            let _ = io::stdout().flush().await;
            continue;
        }

        let (cmd, rest) = match input.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (input.as_str(), ""),
        };

        match cmd {
            "help" => {
                println!("Available commands:");
                println!("  say <transcript>  - Feed a spoken command (e.g. 'say join class with Alice')");
                println!("  load <file.json>  - Install a UI tree dump as the active window");
                println!("  save <file.json>  - Write the active window tree as a dump");
                println!("  fg <package>      - Emit a UI-changed event for that package");
                println!("  dump              - Print the active window tree");
                println!("  target            - Show the configured target contact");
                println!("  quit              - Exit");
            }
            "quit" | "exit" => break,
            "say" => {
                handle_transcript(rest, &config, &bridge);
            }
            "load" => match std::fs::read_to_string(rest) {
                Ok(raw) => match ui_tree::parse_tree(&raw) {
                    Ok(root) => {
                        windows.set_tree(root);
                        println!("🌳 Loaded window tree from {}", rest);
                    }
                    Err(e) => println!("❌ Bad tree dump: {}", e),
                },
                Err(e) => println!("❌ Could not read {}: {}", rest, e),
            },
            "save" => match windows.active_root() {
                Some(root) => match std::fs::write(rest, ui_tree::tree_to_json(&root)) {
                    Ok(()) => println!("💾 Saved window tree to {}", rest),
                    Err(e) => println!("❌ Could not write {}: {}", rest, e),
                },
                None => println!("(no window tree loaded)"),
            },
            "fg" => {
                if rest.is_empty() {
                    println!("Usage: fg <package>");
                } else {
                    windows.set_package(rest);
                    let event = UiEvent {
                        package: Some(rest.to_string()),
                        root: windows.active_root(),
                    };
                    if tx.send(EngineMsg::Ui(event)).await.is_err() {
                        println!("❌ Engine stopped");
                        break;
                    }
                }
            }
            "dump" => match windows.active_root() {
                Some(root) => ui_tree::dump_tree(&root, 0),
                None => println!("(no window tree loaded)"),
            },
            "target" => match config.target_contact() {
                Some(name) => println!("🎯 Target contact: {}", name),
                None => println!("🎯 No target contact configured"),
            },
            _ => println!("Unknown command '{}'. Type 'help'.", cmd),
        }

        print!("> ");
        let _ = io::stdout().flush().await;
    }

    Ok(())
}

/// The voice path: parse the transcript, persist the target, talk back, and
/// launch the messaging app after a short delay. All platform effects are
/// fire-and-forget.
fn handle_transcript(transcript: &str, config: &AutomationConfig, bridge: &Arc<dyn PlatformBridge>) {
    match voice::parse_command(transcript) {
        Some(VoiceCommand::JoinClassWith { contact }) => {
            if let Err(e) = config.set_target_contact(&contact) {
                println!("❌ Could not save target contact: {}", e);
                return;
            }
            bridge.speak(&format!("Okay, joining class with {}", contact));
            bridge.toast("Opening WhatsApp...");

            let launcher = bridge.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(APP_LAUNCH_DELAY_MS)).await;
                launcher.launch_app(MESSAGING_PACKAGE);
            });

            if !bridge.automation_service_enabled() {
                let prompter = bridge.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(SETTINGS_PROMPT_DELAY_MS)).await;
                    prompter.speak("Please enable the accessibility service for automation");
                    prompter.open_accessibility_settings();
                });
            }
        }
        None => {
            bridge.speak("Sorry, I didn't understand that command.");
            bridge.toast("Command not recognized.");
        }
    }
}
