//! End-to-end tests driving the worker service over its channels,
//! the way the simulator process does over stdio.

use nemesis_core::{FEATURES, STACK};
use nemesis_policy::EngineConfig;
use nemesis_worker::{WorkerRequest, WorkerResponse, spawn};
use serde_json::json;
use std::path::Path;

/// Identity-flavored backbone small enough to hand-check: actor latent
/// mirrors the oldest frame's first 9 features, critic latent is the
/// stack mean.
fn write_test_assets(dir: &Path) {
    let input = FEATURES * STACK;
    let actor_weights: Vec<Vec<f32>> = (0..input)
        .map(|i| (0..9).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let critic_weights: Vec<Vec<f32>> = (0..input).map(|_| vec![1.0 / input as f32]).collect();
    let action_net: Vec<Vec<f32>> = (0..9)
        .map(|i| (0..9).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let doc = json!({
        "input_dim": input,
        "actor_trunk": [
            {"weights": actor_weights, "bias": vec![0.0; 9], "activation": "linear"}
        ],
        "critic_trunk": [
            {"weights": critic_weights, "bias": [0.0], "activation": "linear"}
        ],
        "params": {
            "action_net": {"weights": action_net, "bias": vec![0.0; 9]},
            "value_net": {"weights": [[1.0]], "bias": [0.0]}
        }
    });
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("backbone.json"), doc.to_string()).unwrap();
    let stats = json!({
        "mean": vec![0.0; FEATURES],
        "variance": vec![1.0; FEATURES],
        "epsilon": 0.0
    });
    std::fs::write(dir.join("norm_stats.json"), stats.to_string()).unwrap();
}

fn test_config(tag: &str) -> EngineConfig {
    let root = std::env::temp_dir().join(format!(
        "nemesis-worker-{tag}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&root);
    let assets = root.join("assets");
    write_test_assets(&assets);
    EngineConfig::new(assets, root.join("data"))
}

fn observation() -> Vec<f32> {
    let mut obs = vec![0.0; FEATURES];
    obs[2] = 1.0;
    obs
}

#[tokio::test]
async fn requests_before_init_are_not_ready() {
    let handle = spawn(test_config("notready"));
    let response = handle.predict(observation()).await.unwrap();
    assert!(matches!(response, WorkerResponse::NotReady));
    let response = handle.train().await.unwrap();
    assert!(matches!(response, WorkerResponse::NotReady));
}

#[tokio::test]
async fn init_failure_reports_error_and_stays_down() {
    let mut config = test_config("badinit");
    config.backbone_path = config.backbone_path.with_file_name("missing.json");
    let handle = spawn(config);

    let err = handle.init().await.unwrap_err();
    assert!(err.to_string().contains("Initialization failed"));

    let response = handle.predict(observation()).await.unwrap();
    assert!(matches!(response, WorkerResponse::NotReady));
}

#[tokio::test]
async fn full_session_flow() {
    let handle = spawn(test_config("session"));
    let mut events = handle.subscribe_events();

    handle.init().await.unwrap();

    // Difficulty applies immediately.
    let response = handle
        .request(WorkerRequest::SetDifficulty {
            profile: "hard".into(),
        })
        .await
        .unwrap();
    assert!(matches!(response, WorkerResponse::DifficultySet { .. }));

    // Deterministic argmax on the crafted observation: feature 2 peaks.
    let response = handle.predict(observation()).await.unwrap();
    let WorkerResponse::Action {
        action,
        probabilities,
        token,
        ..
    } = response
    else {
        panic!("expected Action, got {response:?}");
    };
    assert_eq!(action, 2);
    assert_eq!(probabilities.len(), 9);

    // Feed 100 experiences; the 100th insert pushes a stats event.
    let mut token = token;
    for _ in 0..100 {
        handle.store_experience(token, action, 0.5, false).await.unwrap();
        let WorkerResponse::Action { token: t, .. } =
            handle.predict(observation()).await.unwrap()
        else {
            panic!("expected Action");
        };
        token = t;
    }

    let response = handle.train().await.unwrap();
    assert!(matches!(
        response,
        WorkerResponse::TrainingComplete { iterations: 5 }
    ));

    // All push events are queued by now: one stats report plus the
    // training series.
    let mut saw_stats = false;
    let mut saw_start = false;
    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            WorkerResponse::Stats { buffer_size } => {
                assert_eq!(buffer_size, 100);
                saw_stats = true;
            }
            WorkerResponse::TrainingStart { total_iterations } => {
                assert_eq!(total_iterations, 5);
                saw_start = true;
            }
            WorkerResponse::TrainingProgress { current, total } => {
                progress.push((current, total));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(saw_stats);
    assert!(saw_start);
    assert_eq!(progress, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);

    // Round boundary and weight reset.
    let response = handle.request(WorkerRequest::ResetEpisode).await.unwrap();
    assert!(matches!(response, WorkerResponse::EpisodeReset));
    let response = handle.request(WorkerRequest::ResetWeights).await.unwrap();
    assert!(matches!(response, WorkerResponse::WeightsReset));

    // Shutdown stops the task; later requests fail fast.
    let response = handle.request(WorkerRequest::Shutdown).await.unwrap();
    assert!(matches!(response, WorkerResponse::ShutdownComplete));
    assert!(handle.predict(observation()).await.is_err());
}

#[tokio::test]
async fn training_without_data_is_a_reported_noop() {
    let handle = spawn(test_config("nodata"));
    handle.init().await.unwrap();

    let mut events = handle.subscribe_events();
    let response = handle.train().await.unwrap();
    assert!(matches!(
        response,
        WorkerResponse::TrainingComplete { iterations: 0 }
    ));
    // A skipped pass announces nothing, not even a start.
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn request_path_store_acks_without_stats() {
    let handle = spawn(test_config("storeack"));
    handle.init().await.unwrap();

    let WorkerResponse::Action { action, token, .. } =
        handle.predict(observation()).await.unwrap()
    else {
        panic!("expected Action");
    };

    let response = handle
        .request(WorkerRequest::StoreExperience {
            token,
            action,
            reward: 0.5,
            done: false,
        })
        .await
        .unwrap();
    assert!(matches!(response, WorkerResponse::ExperienceStored));

    // A mismatched token drops the record and reports that, not stats.
    let response = handle
        .request(WorkerRequest::StoreExperience {
            token: token + 1,
            action,
            reward: 0.5,
            done: false,
        })
        .await
        .unwrap();
    assert!(matches!(response, WorkerResponse::ExperienceIgnored));
}
