//! End-to-end viewer scenarios: state machine, loop lifecycle, switching

mod common;

use axum::http::header;
use axum::routing::get;
use axum::Router;
use cctv_viewer::camera_registry::{CameraDefinition, CameraRegistry};
use cctv_viewer::polling_controller::PollingController;
use cctv_viewer::snapshot_fetcher::{FetchErrorKind, SnapshotFetcher, SnapshotResult};
use common::{jpeg_bytes, serve};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Generous bound: one fetch timeout plus scheduling slack
const RESULT_DEADLINE: Duration = Duration::from_secs(9);

/// One full refresh period plus slack, for next-tick assertions
const TICK_DEADLINE: Duration = Duration::from_secs(15);

async fn two_camera_server() -> SocketAddr {
    let router = Router::new()
        .route(
            "/a.jpg",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], jpeg_bytes(320, 240)) }),
        )
        .route(
            "/b.jpg",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], jpeg_bytes(320, 240)) }),
        );
    serve(router).await
}

async fn setup(addr: SocketAddr) -> (Arc<CameraRegistry>, Arc<PollingController>) {
    let registry = Arc::new(CameraRegistry::new());
    registry
        .load(vec![
            CameraDefinition::new("cam_a", "Camera A", format!("http://{addr}/a.jpg")),
            CameraDefinition::new("cam_b", "Camera B", format!("http://{addr}/b.jpg")),
        ])
        .await
        .unwrap();
    let fetcher = Arc::new(SnapshotFetcher::new().unwrap());
    let controller = Arc::new(PollingController::new(registry.clone(), fetcher));
    (registry, controller)
}

#[tokio::test]
async fn power_on_publishes_frame_then_power_off_silences() {
    let addr = two_camera_server().await;
    let (_registry, controller) = setup(addr).await;
    let mut results = controller.subscribe();

    controller.power_on("cam_a").await.unwrap();

    let result = timeout(RESULT_DEADLINE, results.recv())
        .await
        .expect("a result must be published within one fetch timeout")
        .unwrap();
    assert_eq!(result.camera_id(), "cam_a");
    assert!(result.is_frame());

    controller.power_off().await;

    // the loop is joined before power_off returns; drain anything already
    // queued, then nothing further may arrive
    while let Ok(r) = results.try_recv() {
        assert_eq!(r.camera_id(), "cam_a");
    }
    assert!(
        timeout(Duration::from_secs(2), results.recv()).await.is_err(),
        "no results may be published after power off"
    );
}

#[tokio::test]
async fn switching_source_publishes_new_camera_without_waiting_a_period() {
    let addr = two_camera_server().await;
    let (_registry, controller) = setup(addr).await;
    let mut results = controller.subscribe();

    controller.power_on("cam_a").await.unwrap();
    let first = timeout(RESULT_DEADLINE, results.recv()).await.unwrap().unwrap();
    assert_eq!(first.camera_id(), "cam_a");

    let switched_at = tokio::time::Instant::now();
    controller.select_source("cam_b").await.unwrap();

    let next = timeout(RESULT_DEADLINE, results.recv()).await.unwrap().unwrap();
    assert_eq!(next.camera_id(), "cam_b");
    assert!(
        switched_at.elapsed() < Duration::from_secs(9),
        "first fetch for the new source must not wait out the refresh period"
    );

    controller.power_off().await;
}

#[tokio::test]
async fn rapid_switching_leaves_exactly_one_loop() {
    let addr = two_camera_server().await;
    let (_registry, controller) = setup(addr).await;
    let mut results = controller.subscribe();

    // adversarial rapid switching; each call cancels and joins the
    // previous loop before starting the replacement
    controller.power_on("cam_a").await.unwrap();
    for i in 0..10 {
        let id = if i % 2 == 0 { "cam_b" } else { "cam_a" };
        controller.select_source(id).await.unwrap();
    }
    // final selection ends on cam_a
    assert_eq!(
        controller.state().await.selected_camera_id.as_deref(),
        Some("cam_a")
    );

    // discard everything published during the switching burst
    tokio::time::sleep(Duration::from_millis(500)).await;
    while results.try_recv().is_ok() {}

    // observe past one full refresh period: a leaked loop from the burst
    // would tick within 10s of its start and show up here
    let deadline = tokio::time::Instant::now() + Duration::from_secs(12);
    let mut observed = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, results.recv()).await {
            Ok(Ok(result)) => observed.push(result),
            Ok(Err(_)) | Err(_) => break,
        }
    }

    assert!(
        observed.iter().all(|r| r.camera_id() == "cam_a"),
        "a cancelled loop kept publishing: {:?}",
        observed
            .iter()
            .map(|r| r.camera_id().to_string())
            .collect::<Vec<_>>()
    );
    assert!(
        observed.len() <= 2,
        "more results than one loop can produce in the window: {}",
        observed.len()
    );

    controller.power_off().await;
}

#[tokio::test]
async fn loop_survives_http_404_and_polls_again() {
    let router = Router::new(); // no routes: everything is 404
    let addr = serve(router).await;

    let registry = Arc::new(CameraRegistry::new());
    registry
        .load(vec![CameraDefinition::new(
            "cam_a",
            "Camera A",
            format!("http://{addr}/gone.jpg"),
        )])
        .await
        .unwrap();
    let fetcher = Arc::new(SnapshotFetcher::new().unwrap());
    let controller = Arc::new(PollingController::new(registry, fetcher));
    let mut results = controller.subscribe();

    controller.power_on("cam_a").await.unwrap();

    for _ in 0..2 {
        let result = timeout(TICK_DEADLINE, results.recv()).await.unwrap().unwrap();
        match result {
            SnapshotResult::Failure(f) => {
                assert_eq!(f.kind, FetchErrorKind::HttpError { code: 404 });
            }
            SnapshotResult::Frame(_) => panic!("expected 404 failure"),
        }
    }

    controller.power_off().await;
}

#[tokio::test]
async fn camera_removed_by_reload_reports_not_found_and_loop_continues() {
    let addr = two_camera_server().await;
    let (registry, controller) = setup(addr).await;
    let mut results = controller.subscribe();

    controller.power_on("cam_a").await.unwrap();
    let first = timeout(RESULT_DEADLINE, results.recv()).await.unwrap().unwrap();
    assert!(first.is_frame());

    // reconfiguration drops cam_a while it is being viewed
    registry
        .load(vec![CameraDefinition::new(
            "cam_b",
            "Camera B",
            format!("http://{addr}/b.jpg"),
        )])
        .await
        .unwrap();

    let next = timeout(TICK_DEADLINE, results.recv()).await.unwrap().unwrap();
    match next {
        SnapshotResult::Failure(f) => {
            assert_eq!(f.camera_id, "cam_a");
            assert_eq!(f.kind, FetchErrorKind::NotFound);
        }
        SnapshotResult::Frame(_) => panic!("removed camera must report not_found"),
    }

    // controller does not auto-reassign; an explicit switch recovers
    controller.select_source("cam_b").await.unwrap();
    let recovered = timeout(RESULT_DEADLINE, results.recv()).await.unwrap().unwrap();
    assert_eq!(recovered.camera_id(), "cam_b");
    assert!(recovered.is_frame());

    controller.power_off().await;
}

#[tokio::test]
async fn last_result_and_status_track_poll_outcomes() {
    let addr = two_camera_server().await;
    let (registry, controller) = setup(addr).await;
    let mut results = controller.subscribe();

    controller.power_on("cam_a").await.unwrap();
    timeout(RESULT_DEADLINE, results.recv()).await.unwrap().unwrap();
    controller.power_off().await;

    let last = controller.last_result("cam_a").await.unwrap();
    assert!(last.is_frame());
    assert_eq!(
        registry.resolve("cam_a").await.unwrap().last_known_status,
        cctv_viewer::camera_registry::CameraStatus::Ok
    );
    assert!(controller.last_result("cam_b").await.is_none());
}
