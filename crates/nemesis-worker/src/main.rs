//! Nemesis policy worker
//!
//! Runs the policy engine as a separate process, speaking the
//! length-prefixed JSON protocol over stdin/stdout. The simulator
//! launches this binary, sends `Init`, and then drives prediction,
//! experience storage, and training through messages; push events
//! (replay stats, training progress) arrive interleaved on stdout.
//!
//! Configuration via environment:
//! - `NEMESIS_ASSETS_DIR`: backbone + norm stats (default `assets`)
//! - `NEMESIS_DATA_DIR`: persisted weights (default `data`)

use anyhow::Result;
use nemesis_policy::EngineConfig;
use nemesis_worker::framing::{read_frame, write_frame};
use nemesis_worker::protocol::{WorkerRequest, serialize};
use nemesis_worker::{WorkerResponse, spawn};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries protocol frames.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let assets_dir =
        std::env::var("NEMESIS_ASSETS_DIR").unwrap_or_else(|_| "assets".to_string());
    let data_dir = std::env::var("NEMESIS_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    info!(assets_dir, data_dir, "nemesis policy worker starting");

    let handle = spawn(EngineConfig::new(assets_dir, data_dir));

    let mut stdin = tokio::io::stdin();
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));

    // Forward push events to stdout alongside responses.
    let mut event_rx = handle.subscribe_events();
    let stdout_for_events = stdout.clone();
    let _event_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => match serialize(&event) {
                    Ok(data) => {
                        let mut out = stdout_for_events.lock().await;
                        if let Err(e) = write_frame(&mut *out, &data).await {
                            error!("failed to write event frame: {e}");
                            break;
                        }
                    }
                    Err(e) => warn!("failed to serialize event: {e}"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("event forwarder lagged, missed {n} events");
                }
            }
        }
    });

    loop {
        let data = match read_frame(&mut stdin).await {
            Ok(data) => data,
            Err(e) => {
                // EOF or broken pipe: the simulator went away.
                info!("stdin closed ({e}), exiting");
                break;
            }
        };

        let request: WorkerRequest = match serde_json::from_slice(&data) {
            Ok(request) => request,
            Err(e) => {
                error!("failed to parse request: {e}");
                let response = WorkerResponse::Error {
                    message: format!("malformed request: {e}"),
                };
                let data = serialize(&response)?;
                let mut out = stdout.lock().await;
                write_frame(&mut *out, &data).await?;
                continue;
            }
        };

        let shutdown = matches!(request, WorkerRequest::Shutdown);
        match request {
            // Fire-and-forget messages; stats show up as push events.
            WorkerRequest::StoreExperience { .. } | WorkerRequest::SetDifficulty { .. } => {
                if handle.send(request).await.is_err() {
                    error!("worker task gone");
                    break;
                }
            }
            request => match handle.request(request).await {
                Ok(response) => {
                    let data = serialize(&response)?;
                    let mut out = stdout.lock().await;
                    write_frame(&mut *out, &data).await?;
                }
                Err(e) => {
                    error!("worker request failed: {e}");
                    let response = WorkerResponse::Error {
                        message: e.to_string(),
                    };
                    let data = serialize(&response)?;
                    let mut out = stdout.lock().await;
                    write_frame(&mut *out, &data).await?;
                }
            },
        }
        if shutdown {
            break;
        }
    }

    Ok(())
}
