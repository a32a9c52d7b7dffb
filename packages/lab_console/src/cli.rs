use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use investigation_sync::{SseConnector, Synchronizer, replay};
use tracing::{info, warn};

use crate::config::{FileConfig, LabConfig};
use crate::render::{self, Progress};
use crate::transcript;

pub async fn watch_command(
    config: &LabConfig,
    file_config: &FileConfig,
    target: String,
    json: bool,
    record: bool,
) -> Result<()> {
    let connector = SseConnector::new(
        file_config.server.endpoint(),
        &file_config.server.user_agent,
    )
    .context("Failed to build HTTP client")?;

    let sync = Synchronizer::spawn(
        connector,
        file_config.reconnect.backoff(),
        Some(target.clone()),
    );
    let mut updates = sync.subscribe();
    let mut progress = Progress::default();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();

                if let Some(status) = progress.link_change(&snapshot) {
                    if !json {
                        eprintln!("[{}] {}", Local::now().format("%H:%M:%S"), status);
                    }
                }
                for event in progress.new_events(&snapshot) {
                    if json {
                        println!("{}", serde_json::to_string(event)?);
                    } else {
                        println!("{}", render::event_line(event, Some(Local::now())));
                    }
                }

                if snapshot.state.is_terminal() {
                    break;
                }
                if snapshot.gave_up {
                    warn!(investigation = %target, "gave up on the event stream");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
    }

    let snapshot = sync.snapshot();
    sync.shutdown().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("\n{}", render::summary(&snapshot.state));
    }

    if record {
        let path = config.transcript_path(&target);
        transcript::write(&path, &snapshot.state.events)?;
        info!(path = %path.display(), events = snapshot.state.events.len(), "transcript recorded");
    }

    Ok(())
}

pub fn replay_command(file: &Path, json: bool) -> Result<()> {
    let messages = transcript::read(file)?;
    let state = replay(messages);

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        for event in &state.events {
            println!("{}", render::event_line(event, None));
        }
        println!("\n{}", render::summary(&state));
    }

    Ok(())
}

pub fn config_command(config: &LabConfig, file_config: &FileConfig) -> Result<()> {
    println!("# {}", config.config_toml_path().display());
    print!(
        "{}",
        toml::to_string_pretty(file_config).context("Failed to serialize configuration")?
    );
    Ok(())
}
