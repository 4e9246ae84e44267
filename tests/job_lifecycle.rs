mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use common::*;
use skystack::config::Config;
use skystack::error::{AppError, JobError, ValidationError};
use skystack::infrastructure::{ChannelEvent, HeadlessSurface};
use skystack::models::{JobPhase, LayerOrigin, LayerSource, NoticeLevel, Scene, StatusSnapshot, VisualizationInfo};
use skystack::orchestrator::JobOrchestrator;
use skystack::services::LayerRegistry;

fn scene() -> Scene {
    Scene {
        id: "scene_a".to_string(),
        name: "scene_a".to_string(),
        files: Vec::new(),
        manifest: None,
        created_at: Local::now(),
    }
}

fn setup(api: FakeApi, events: Vec<ChannelEvent>) -> (JobOrchestrator, Arc<FakeApi>, Arc<FakeConnector>) {
    let api = Arc::new(api);
    let connector = Arc::new(FakeConnector::new(events));
    let orchestrator = JobOrchestrator::new(&test_config(), api.clone(), connector.clone());
    (orchestrator, api, connector)
}

fn registry() -> (LayerRegistry, HeadlessSurface) {
    let surface = HeadlessSurface::new();
    let registry = LayerRegistry::new(&test_config(), Box::new(surface.clone())).unwrap();
    (registry, surface)
}

#[tokio::test]
async fn test_blank_expression_is_rejected_without_network_call() {
    let (mut orchestrator, api, connector) = setup(FakeApi::new(), Vec::new());

    let err = orchestrator.submit("   ", Some(&scene())).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::BlankExpression)));

    let err = orchestrator.submit("B1+B2", None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::MissingScene)));

    assert!(api.state().submitted.is_empty());
    assert_eq!(connector.connect_count(), 0);
    assert_eq!(orchestrator.job().phase, JobPhase::Idle);
    assert!(orchestrator.take_notices().is_empty());
}

#[tokio::test]
async fn test_existence_timeout_never_opens_channel() {
    let (mut orchestrator, api, connector) = setup(FakeApi::new(), Vec::new());
    api.script_checks(&[CheckResponse::NotFound; 10]);

    let err = orchestrator.submit("B1-B2", Some(&scene())).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Job(JobError::InitializationTimeout { attempts: 10, .. })
    ));
    assert_eq!(api.state().check_calls, 10);
    assert_eq!(connector.connect_count(), 0);
    assert_eq!(orchestrator.job().phase, JobPhase::Failed);
    assert!(orchestrator.job().message.as_deref().unwrap().contains("初始化超时"));
}

#[tokio::test(start_paused = true)]
async fn test_existence_polling_uses_default_delays() {
    let api = Arc::new(FakeApi::new());
    let connector = Arc::new(FakeConnector::new(Vec::new()));
    let mut orchestrator = JobOrchestrator::new(&Config::default(), api.clone(), connector.clone());
    api.script_checks(&[CheckResponse::NotFound; 10]);

    let started = tokio::time::Instant::now();
    let err = orchestrator.submit("B1-B2", Some(&scene())).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        AppError::Job(JobError::InitializationTimeout { attempts: 10, .. })
    ));
    assert!(
        elapsed >= Duration::from_millis(9500) && elapsed < Duration::from_millis(9520),
        "elapsed {:?}",
        elapsed
    );

    let times = api.state().check_times.clone();
    assert_eq!(times.len(), 10);
    let first = times[0] - started;
    assert!(first >= Duration::from_millis(5000) && first < Duration::from_millis(5002));
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(500) && gap < Duration::from_millis(502), "gap {:?}", gap);
    }
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_existence_retries_on_not_found_then_subscribes() {
    let (mut orchestrator, api, connector) = setup(FakeApi::new(), Vec::new());
    api.script_checks(&[CheckResponse::NotFound, CheckResponse::NotFound, CheckResponse::Exists]);

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();

    assert_eq!(api.state().check_calls, 3);
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(orchestrator.job().phase, JobPhase::Subscribed);
    assert_eq!(orchestrator.job_id(), Some("job-42"));
    assert!(orchestrator.is_subscribed());
}

#[tokio::test]
async fn test_non_404_existence_error_aborts_immediately() {
    let (mut orchestrator, api, connector) = setup(FakeApi::new(), Vec::new());
    api.script_checks(&[CheckResponse::NotFound, CheckResponse::ServerError]);

    let err = orchestrator.submit("B1-B2", Some(&scene())).await.unwrap_err();

    assert!(!err.is_not_found());
    assert_eq!(api.state().check_calls, 2);
    assert_eq!(connector.connect_count(), 0);
    assert_eq!(orchestrator.job().phase, JobPhase::Failed);
    assert_eq!(orchestrator.job().message.as_deref(), Some("database unavailable"));
}

#[tokio::test]
async fn test_create_job_failure_surfaces_server_message() {
    let api = FakeApi::new();
    api.state().create_job_error = Some((503, "SQS queue not configured".to_string()));
    let (mut orchestrator, api, _) = setup(api, Vec::new());

    assert!(orchestrator.submit("B1-B2", Some(&scene())).await.is_err());

    assert_eq!(api.state().submitted.len(), 1);
    assert_eq!(api.state().check_calls, 0);
    assert_eq!(orchestrator.job().phase, JobPhase::Failed);
    let notices = orchestrator.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "SQS queue not configured");
}

#[tokio::test]
async fn test_submission_carries_band_math_request() {
    let (mut orchestrator, api, _) = setup(FakeApi::new(), Vec::new());
    orchestrator.submit("(nir-vis)/(nir+vis)", Some(&scene())).await.unwrap();

    let state = api.state();
    let request = &state.submitted[0];
    assert_eq!(request.dataset_id, "scene_a");
    assert_eq!(request.tasks[0].operation, "band_math");
    assert_eq!(request.tasks[0].parameters.formula, "(nir-vis)/(nir+vis)");
}

#[tokio::test]
async fn test_full_lifecycle_builds_single_visible_result_layer() {
    let events = vec![
        processing(50, 100),
        processing(100, 100),
        status("MERGE_STARTED", None),
        mosaic_created("job-42"),
    ];
    let (mut orchestrator, api, connector) = setup(FakeApi::new().with_statistics("-0.5,0.9"), events);
    let (mut registry, surface) = registry();
    registry.add_workflow_result_layer(Some("older"), "http://api.test/viz/older/x".into(), None);

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    let job = orchestrator.run_to_completion(&mut registry).await;

    assert_eq!(job.phase, JobPhase::Complete);
    assert_eq!(job.progress_history, vec![50, 100, 100, 100]);

    let result_id = job.result_layer.clone().unwrap();
    let active = registry.active_layer().unwrap();
    assert_eq!(active.id, result_id);
    assert_eq!(active.origin(), LayerOrigin::WorkflowResult);
    assert_eq!(registry.visible_count(), 1);
    assert_eq!(surface.visible_count(), 1);

    assert!(active.tile_url().contains("colormap_name=viridis"));
    assert!(!active.tile_url().contains("colormap_name=gray"));
    assert!(active.tile_url().ends_with("&rescale=-0.5,0.9"));
    match &active.source {
        LayerSource::WorkflowResult { job_id, rescale, .. } => {
            assert_eq!(job_id.as_deref(), Some("job-42"));
            assert_eq!(rescale.as_deref(), Some("-0.5,0.9"));
        }
        other => panic!("unexpected source: {:?}", other),
    }

    assert_eq!(api.state().statistics_calls, 1);
    assert!(connector.all_sessions_closed());
    assert!(!orchestrator.is_subscribed());
}

#[tokio::test]
async fn test_progress_never_regresses_after_merge() {
    let events = vec![
        processing(20, 100),
        ChannelEvent::MergeStarted,
        processing(30, 100),
        status("MERGE_FAILED", Some("Merge worker crashed")),
    ];
    let (mut orchestrator, _, connector) = setup(FakeApi::new(), events);
    let (mut registry, _) = registry();

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    let job = orchestrator.run_to_completion(&mut registry).await;

    assert_eq!(job.progress_history, vec![20, 100, 100, 100]);
    let merge_at = 1;
    assert!(job.progress_history[merge_at..].iter().all(|p| *p >= 100));
    assert_eq!(job.phase, JobPhase::Failed);
    assert_eq!(job.message.as_deref(), Some("Merge worker crashed"));

    assert!(registry.is_empty());
    assert!(connector.all_sessions_closed());
    let notices = orchestrator.take_notices();
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));
}

#[tokio::test]
async fn test_each_remote_failure_status_is_terminal() {
    for failure in ["FAILED", "MOSAIC_INCOMPLETE", "MERGE_FAILED"] {
        let (mut orchestrator, _, connector) =
            setup(FakeApi::new(), vec![processing(10, 40), status(failure, None)]);
        let (mut registry, _) = registry();

        orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
        let job = orchestrator.run_to_completion(&mut registry).await;

        assert_eq!(job.phase, JobPhase::Failed, "{}", failure);
        assert_eq!(job.message.as_deref(), Some(failure));
        assert!(connector.all_sessions_closed());
    }
}

#[tokio::test]
async fn test_statistics_failure_still_completes() {
    let (mut orchestrator, api, _) = setup(FakeApi::new(), vec![mosaic_created("job-42")]);
    let (mut registry, _) = registry();

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    let job = orchestrator.run_to_completion(&mut registry).await;

    assert_eq!(job.phase, JobPhase::Complete);
    let layer = registry.active_layer().unwrap();
    assert!(!layer.tile_url().contains("rescale="));
    assert_eq!(api.state().statistics_calls, 1);

    let notices = orchestrator.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_warning());
}

#[tokio::test]
async fn test_incomplete_visualization_fails_job() {
    let event = ChannelEvent::Status(StatusSnapshot {
        status: Some("MOSAIC_CREATED".to_string()),
        visualization: Some(VisualizationInfo {
            tiles_url: Some("http://api.test/viz/job-42/tiles/{z}/{x}/{y}.png".to_string()),
            statistics_url: None,
        }),
        ..Default::default()
    });
    let (mut orchestrator, _, _) = setup(FakeApi::new(), vec![event]);
    let (mut registry, _) = registry();

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    let job = orchestrator.run_to_completion(&mut registry).await;

    assert_eq!(job.phase, JobPhase::Failed);
    assert!(job.message.as_deref().unwrap().contains("statistics_url"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_channel_error_fails_running_job() {
    let events = vec![processing(10, 100), ChannelEvent::Error("socket reset".to_string())];
    let (mut orchestrator, _, connector) = setup(FakeApi::new(), events);
    let (mut registry, _) = registry();

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    let job = orchestrator.run_to_completion(&mut registry).await;

    assert_eq!(job.phase, JobPhase::Failed);
    assert!(job.message.as_deref().unwrap().contains("socket reset"));
    assert!(connector.all_sessions_closed());
}

#[tokio::test]
async fn test_unexpected_close_fails_running_job() {
    let (mut orchestrator, _, _) =
        setup(FakeApi::new(), vec![processing(10, 100), ChannelEvent::Closed]);
    let (mut registry, _) = registry();

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    let job = orchestrator.run_to_completion(&mut registry).await;

    assert_eq!(job.phase, JobPhase::Failed);
    assert_eq!(job.progress, 10);
}

#[tokio::test]
async fn test_new_submission_closes_previous_channel() {
    let (mut orchestrator, _, connector) = setup(FakeApi::new(), vec![processing(10, 100)]);
    let (mut registry, _) = registry();

    orchestrator.submit("B1-B2", Some(&scene())).await.unwrap();
    assert_eq!(orchestrator.next_update(&mut registry).await, Some(JobPhase::Processing));
    assert!(!connector.session_closed(0));

    orchestrator.submit("B2-B1", Some(&scene())).await.unwrap();
    assert!(connector.session_closed(0));
    assert!(!connector.session_closed(1));
    assert_eq!(orchestrator.job().progress, 0);

    drop(orchestrator);
    assert!(connector.all_sessions_closed());
}

#[tokio::test]
async fn test_teardown_without_session_is_noop() {
    let (mut orchestrator, _, _) = setup(FakeApi::new(), Vec::new());
    let (mut registry, _) = registry();

    orchestrator.teardown();
    orchestrator.teardown();
    assert_eq!(orchestrator.next_update(&mut registry).await, None);
}
