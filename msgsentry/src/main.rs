//! msgsentry - messaging-app misinformation monitor
//!
//! Reads observation events as JSON lines on stdin and drives the detection
//! core with them. Marker actions come back out as JSON lines on stdout, so
//! a platform shim (or a test harness) can pipe a UI feed through the core
//! without linking against it.

mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use msgsentry_core::{
    Config, MessageClassifier, MonitorSession, NotificationEvent, Observation,
    ObservationPipeline, ScreenRect,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::LogRenderer;

#[derive(Parser)]
#[command(name = "msgsentry", about = "Messaging-app misinformation monitor")]
struct Args {
    /// Path to config file (default: ~/.config/msgsentry/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable full-decode image checks regardless of config
    #[arg(long)]
    deep_scan: bool,
}

/// One input event, as a JSON line on stdin.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputEvent {
    Observation {
        text: String,
        rect: ScreenRect,
        context_id: String,
    },
    Notification {
        text: String,
        app_id: String,
    },
    Image {
        path: PathBuf,
    },
    Click {
        key: String,
    },
    Acknowledge {
        key: String,
    },
    ContextLeft,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };
    if args.deep_scan {
        config.detection.deep_scan_enabled = true;
    }

    let _log_guard =
        msgsentry_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("msgsentry starting up");

    let classifier =
        MessageClassifier::from_config(&config.classify).context("failed to build classifier")?;
    let pipeline = Arc::new(ObservationPipeline::new(
        Arc::new(classifier),
        Arc::new(LogRenderer),
        &config,
    ));
    let session = MonitorSession::new(pipeline.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: InputEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed input line");
                continue;
            }
        };
        handle_event(&session, &pipeline, event);
    }

    // Input ended: let in-flight classifications settle, then report.
    pipeline.drain().await;
    let status = session.status();
    println!(
        "{}",
        serde_json::json!({
            "event": "session_summary",
            "session_id": session.id().to_string(),
            "flagged": status.flagged,
            "processed": status.processed,
        })
    );
    session.on_session_end();

    tracing::info!("msgsentry shutting down");
    Ok(())
}

fn handle_event(session: &MonitorSession, pipeline: &Arc<ObservationPipeline>, event: InputEvent) {
    match event {
        InputEvent::Observation {
            text,
            rect,
            context_id,
        } => session.on_observation(Observation {
            text,
            rect,
            context_id,
        }),
        InputEvent::Notification { text, app_id } => {
            session.on_notification(NotificationEvent { text, app_id })
        }
        InputEvent::Image { path } => match std::fs::read(&path) {
            Ok(bytes) => {
                let finding = pipeline.handle_image(&bytes);
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "image_finding",
                        "path": path.display().to_string(),
                        "detected": finding.detected,
                        "method": finding.method,
                        "details": finding.details,
                    })
                );
            }
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "failed to read image"),
        },
        InputEvent::Click { key } => {
            session.on_marker_click(&key, Instant::now());
        }
        InputEvent::Acknowledge { key } => {
            pipeline.acknowledge(&key);
        }
        InputEvent::ContextLeft => session.on_context_left(),
    }
}
