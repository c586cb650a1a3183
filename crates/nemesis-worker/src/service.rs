//! The policy worker service
//!
//! The engine runs on its own task and is driven exclusively through
//! message passing; the simulation loop never shares memory with
//! tensor computation. Requests are processed strictly in arrival
//! order, so an `Init` completes (or fails) before any `Predict` is
//! serviced, and training never interleaves with inference.
//!
//! Request/response pairs travel over a oneshot per request; push
//! events (replay stats, training progress) go out on a broadcast
//! channel, mirroring how the state-update stream works in the game
//! bridges this service is modeled on.

use crate::protocol::{WorkerRequest, WorkerResponse};
use nemesis_core::{DifficultyProfile, FightAction, PolicyError, PredictionToken};
use nemesis_policy::engine::StoreOutcome;
use nemesis_policy::{EngineConfig, PolicyEngine};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

enum Command {
    /// Request expecting a response.
    Request(WorkerRequest, oneshot::Sender<WorkerResponse>),
    /// Fire-and-forget request.
    Fire(WorkerRequest),
}

/// Handle to a running policy worker.
///
/// `predict` resolves only when its response arrives, which gives the
/// caller the at-most-one-in-flight backpressure the simulator needs:
/// do not issue a new prediction until the previous one resolved.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<WorkerResponse>,
}

/// Spawn the worker task and return its handle.
pub fn spawn(config: EngineConfig) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(64);
    let (events, _) = broadcast::channel(256);
    let event_tx = events.clone();
    tokio::spawn(worker_task(config, rx, event_tx));
    WorkerHandle { tx, events }
}

impl WorkerHandle {
    /// Send a request and await its response.
    pub async fn request(&self, request: WorkerRequest) -> Result<WorkerResponse, PolicyError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(Command::Request(request, response_tx))
            .await
            .map_err(|_| PolicyError::ChannelClosed)?;
        response_rx.await.map_err(|_| PolicyError::ChannelClosed)
    }

    /// Send a request without waiting for a response.
    pub async fn send(&self, request: WorkerRequest) -> Result<(), PolicyError> {
        self.tx
            .send(Command::Fire(request))
            .await
            .map_err(|_| PolicyError::ChannelClosed)
    }

    /// Subscribe to push events (stats, training progress).
    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkerResponse> {
        self.events.subscribe()
    }

    /// Initialize the engine; maps an `Error` response to a typed
    /// failure.
    pub async fn init(&self) -> Result<(), PolicyError> {
        match self.request(WorkerRequest::Init).await? {
            WorkerResponse::Ready => Ok(()),
            WorkerResponse::Error { message } => Err(PolicyError::InitializationFailure(message)),
            other => Err(PolicyError::ProtocolError(format!(
                "unexpected init response: {other:?}"
            ))),
        }
    }

    /// Convenience wrapper for `Predict`.
    pub async fn predict(&self, observation: Vec<f32>) -> Result<WorkerResponse, PolicyError> {
        self.request(WorkerRequest::Predict { observation }).await
    }

    /// Fire-and-forget experience storage; periodic stats arrive on
    /// the event stream.
    pub async fn store_experience(
        &self,
        token: u64,
        action: usize,
        reward: f32,
        done: bool,
    ) -> Result<(), PolicyError> {
        self.send(WorkerRequest::StoreExperience {
            token,
            action,
            reward,
            done,
        })
        .await
    }

    /// Run a training pass; progress events arrive on the event
    /// stream, the returned response is the completion report.
    pub async fn train(&self) -> Result<WorkerResponse, PolicyError> {
        self.request(WorkerRequest::Train).await
    }
}

async fn worker_task(
    config: EngineConfig,
    mut rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<WorkerResponse>,
) {
    let mut engine: Option<PolicyEngine> = None;

    while let Some(command) = rx.recv().await {
        let (request, responder) = match command {
            Command::Request(request, tx) => (request, Some(tx)),
            Command::Fire(request) => (request, None),
        };

        let shutdown = matches!(request, WorkerRequest::Shutdown);
        let response = handle_request(&config, &mut engine, request, &events);
        if let Some(tx) = responder {
            // Receiver may have gone away; that is its problem.
            let _ = tx.send(response);
        }
        if shutdown {
            info!("worker shutting down");
            break;
        }
    }
    debug!("worker task exiting");
}

fn handle_request(
    config: &EngineConfig,
    engine: &mut Option<PolicyEngine>,
    request: WorkerRequest,
    events: &broadcast::Sender<WorkerResponse>,
) -> WorkerResponse {
    match request {
        WorkerRequest::Init => match PolicyEngine::init(config.clone()) {
            Ok(ready) => {
                info!("policy engine initialized");
                *engine = Some(ready);
                WorkerResponse::Ready
            }
            Err(e) => {
                error!("engine init failed: {e}");
                *engine = None;
                WorkerResponse::Error {
                    message: e.to_string(),
                }
            }
        },

        WorkerRequest::SetDifficulty { profile } => {
            let Some(engine) = engine.as_mut() else {
                return WorkerResponse::NotReady;
            };
            match profile.parse::<DifficultyProfile>() {
                Ok(parsed) => {
                    engine.set_difficulty(parsed);
                    WorkerResponse::DifficultySet { profile }
                }
                Err(e) => {
                    warn!("{e}");
                    WorkerResponse::Error {
                        message: e.to_string(),
                    }
                }
            }
        }

        WorkerRequest::ResetWeights => {
            let Some(engine) = engine.as_mut() else {
                return WorkerResponse::NotReady;
            };
            match engine.reset_weights() {
                Ok(()) => WorkerResponse::WeightsReset,
                Err(e) => {
                    error!("weight reset failed: {e}");
                    WorkerResponse::Error {
                        message: e.to_string(),
                    }
                }
            }
        }

        WorkerRequest::Predict { observation } => {
            let Some(engine) = engine.as_mut() else {
                return WorkerResponse::NotReady;
            };
            match engine.predict(&observation) {
                Ok(prediction) => WorkerResponse::Action {
                    action: prediction.action.index(),
                    confidence: prediction.confidence,
                    probabilities: prediction.probabilities,
                    token: prediction.token.0,
                },
                Err(e) => {
                    // Single bad request; engine state stays intact.
                    error!("prediction failed: {e}");
                    WorkerResponse::Error {
                        message: e.to_string(),
                    }
                }
            }
        }

        WorkerRequest::StoreExperience {
            token,
            action,
            reward,
            done,
        } => {
            let Some(engine) = engine.as_mut() else {
                return WorkerResponse::NotReady;
            };
            let Some(action) = FightAction::from_index(action) else {
                warn!(action, "unknown action index, dropping experience");
                return WorkerResponse::Error {
                    message: format!("unknown action index {action}"),
                };
            };
            match engine.store_experience(PredictionToken(token), action, reward, done) {
                Ok(StoreOutcome::StatsDue { len }) => {
                    let _ = events.send(WorkerResponse::Stats { buffer_size: len });
                    WorkerResponse::Stats { buffer_size: len }
                }
                Ok(StoreOutcome::Stored { .. }) => WorkerResponse::ExperienceStored,
                Ok(StoreOutcome::Ignored) => WorkerResponse::ExperienceIgnored,
                Err(e) => {
                    error!("store_experience failed: {e}");
                    WorkerResponse::Error {
                        message: e.to_string(),
                    }
                }
            }
        }

        WorkerRequest::Train => {
            let Some(engine) = engine.as_mut() else {
                return WorkerResponse::NotReady;
            };
            // Announced from the first progress tick; a pass skipped
            // for lack of data stays silent on the event stream.
            let events_for_progress = events.clone();
            let mut started = false;
            match engine.train(move |current, total| {
                if !started {
                    started = true;
                    let _ = events_for_progress.send(WorkerResponse::TrainingStart {
                        total_iterations: total,
                    });
                }
                let _ = events_for_progress.send(WorkerResponse::TrainingProgress { current, total });
            }) {
                Ok(report) => WorkerResponse::TrainingComplete {
                    iterations: report.iterations,
                },
                Err(PolicyError::InsufficientData { have, need }) => {
                    info!(have, need, "skipping training, not enough data");
                    WorkerResponse::TrainingComplete { iterations: 0 }
                }
                Err(e) => {
                    error!("training failed: {e}");
                    WorkerResponse::Error {
                        message: e.to_string(),
                    }
                }
            }
        }

        WorkerRequest::ResetEpisode => {
            let Some(engine) = engine.as_mut() else {
                return WorkerResponse::NotReady;
            };
            engine.reset_episode();
            WorkerResponse::EpisodeReset
        }

        WorkerRequest::Shutdown => WorkerResponse::ShutdownComplete,
    }
}
