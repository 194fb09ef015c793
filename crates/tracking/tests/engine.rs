//! End to end scenarios for the tracking engine: session lifecycle, fan-out,
//! stop command routing and the concurrency invariants around them.


use futures::future::join_all;
use pretty_assertions::assert_eq;
use tracking::model::EventKind;
use tracking::{Error, IngestOutcome, TrackingEvent};

use crate::provider::{
    engine_with, expect_silence, next_event, position, start_request, test_config,
};

#[tokio::test]
async fn lifecycle_accumulates_distance_and_publishes_in_order() {
    let (engine, _, store) = engine_with(&["v-1"]);
    let dashboard = engine.register_subscriber();
    engine.subscribe_all(dashboard.id());

    let session = engine.start_session(start_request("v-1"), None).await.expect("start");
    assert!(session.is_active);
    assert_eq!(session.positions_count, 0);

    engine.submit_position(position("v-1", 0.0, 0.0), None).await.expect("first report");
    // 0.0009 degrees of latitude is just over 100 m
    let outcome =
        engine.submit_position(position("v-1", 0.0009, 0.0), None).await.expect("second report");
    let IngestOutcome::Applied(updated) = outcome else {
        panic!("second report should be applied");
    };
    assert_eq!(updated.positions_count, 2);
    assert!((updated.total_distance_meters - 100.0).abs() < 1.0);

    assert!(engine.stop_vehicle("v-1").await.expect("stop"));
    let ended = engine.session(session.session_id).expect("session kept in history");
    assert!(!ended.is_active);
    assert!(ended.ended_at.is_some());
    assert_eq!(ended.positions_count, 2);

    // the dashboard saw every transition in order
    let kinds = [
        EventKind::SessionStarted,
        EventKind::PositionUpdate,
        EventKind::SessionUpdated,
        EventKind::PositionUpdate,
        EventKind::SessionUpdated,
        EventKind::SessionStopped,
    ];
    for expected in kinds {
        assert_eq!(next_event(&dashboard).await.kind(), expected);
    }

    assert_eq!(store.position_rows().await, 2);
}

#[tokio::test]
async fn start_rejects_unknown_vehicle() {
    let (engine, _, store) = engine_with(&["v-1"]);

    let err = engine.start_session(start_request("ghost"), None).await.unwrap_err();
    assert!(matches!(err, Error::UnknownVehicle(_)));
    assert!(engine.active_sessions().is_empty());
    assert_eq!(store.position_rows().await, 0);
}

#[tokio::test]
async fn start_rejects_blank_input() {
    let (engine, _, _) = engine_with(&["v-1"]);

    let mut request = start_request("v-1");
    request.driver_name = "  ".to_string();
    let err = engine.start_session(request, None).await.unwrap_err();
    assert_eq!(err.code(), "invalid_format");
}

#[tokio::test]
async fn directory_outage_fails_start() {
    let (engine, directory, _) = engine_with(&["v-1"]);
    directory.set_fail(true);

    let err = engine.start_session(start_request("v-1"), None).await.unwrap_err();
    assert!(matches!(err, Error::Directory(_)));
}

#[tokio::test]
async fn unknown_mission_does_not_block_start() {
    let (engine, _, _) = engine_with(&["v-1"]);

    let mut request = start_request("v-1");
    request.mission_id = Some("m-404".to_string());
    let session = engine.start_session(request, None).await.expect("start");
    assert_eq!(session.mission_id.as_deref(), Some("m-404"));
}

#[tokio::test]
async fn double_start_displaces_the_first_session() {
    let (engine, _, _) = engine_with(&["v-1"]);
    let dashboard = engine.register_subscriber();
    engine.subscribe(dashboard.id(), "v-1");

    let first = engine.start_session(start_request("v-1"), None).await.expect("first start");
    let second = engine.start_session(start_request("v-1"), None).await.expect("second start");
    assert_ne!(first.session_id, second.session_id);

    let active = engine.active_session_for("v-1").expect("one session active");
    assert_eq!(active.session_id, second.session_id);
    assert_eq!(engine.history("v-1", None).len(), 2);

    // stop for the displaced session arrives before the new start
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStarted);
    match next_event(&dashboard).await {
        TrackingEvent::SessionStopped { session_id, .. } => {
            assert_eq!(session_id, first.session_id);
        }
        other => panic!("expected SessionStopped, got {other:?}"),
    }
    match next_event(&dashboard).await {
        TrackingEvent::SessionStarted { session } => {
            assert_eq!(session.session_id, second.session_id);
        }
        other => panic!("expected SessionStarted, got {other:?}"),
    }
}

#[tokio::test]
async fn positions_without_session_are_dropped_silently() {
    let (engine, _, store) = engine_with(&["v-1"]);
    let dashboard = engine.register_subscriber();
    engine.subscribe_all(dashboard.id());

    let outcome = engine.submit_position(position("v-1", 0.0, 0.0), None).await.expect("submit");
    assert!(matches!(outcome, IngestOutcome::Dropped));
    assert_eq!(store.position_rows().await, 0);
    expect_silence(&dashboard).await;
}

#[tokio::test]
async fn stops_are_idempotent() {
    let (engine, _, _) = engine_with(&["v-1"]);
    let session = engine.start_session(start_request("v-1"), None).await.expect("start");

    assert!(engine.stop_session(session.session_id).await.expect("first stop"));
    assert!(!engine.stop_session(session.session_id).await.expect("second stop"));
    assert!(!engine.stop_vehicle("v-1").await.expect("stop by vehicle"));
    assert!(!engine.force_stop_vehicle("v-1", None).await.expect("force stop"));
}

#[tokio::test]
async fn force_stop_routes_command_to_the_producer_only() {
    let (engine, _, _) = engine_with(&["v-1"]);

    let producer = engine.register_subscriber();
    let dashboard = engine.register_subscriber();
    engine.subscribe_all(dashboard.id());

    engine.start_session(start_request("v-1"), Some(producer.id())).await.expect("start");
    engine
        .submit_position(position("v-1", 0.0, 0.0), Some(producer.id()))
        .await
        .expect("report");

    assert!(
        engine
            .force_stop_vehicle("v-1", Some("vehicle recalled".to_string()))
            .await
            .expect("force stop")
    );

    // the producer connection gets the targeted stop command
    match next_event(&producer).await {
        TrackingEvent::StopTrackingRequested { vehicle_id, reason } => {
            assert_eq!(vehicle_id, "v-1");
            assert_eq!(reason.as_deref(), Some("vehicle recalled"));
        }
        other => panic!("expected StopTrackingRequested, got {other:?}"),
    }

    // the dashboard sees the session end but never the stop command
    let mut saw_stopped = false;
    for _ in 0..4 {
        let event = next_event(&dashboard).await;
        assert_ne!(event.kind(), EventKind::StopTrackingRequested);
        if event.kind() == EventKind::SessionStopped {
            saw_stopped = true;
            break;
        }
    }
    assert!(saw_stopped);
    expect_silence(&dashboard).await;
}

#[tokio::test]
async fn force_stop_without_session_is_a_noop() {
    let (engine, _, _) = engine_with(&["v-1"]);
    let dashboard = engine.register_subscriber();
    engine.subscribe_all(dashboard.id());

    assert!(!engine.force_stop_vehicle("v-1", None).await.expect("force stop"));
    expect_silence(&dashboard).await;
}

#[tokio::test]
async fn persistence_failure_changes_nothing() {
    let (engine, _, store) = engine_with(&["v-1"]);
    let dashboard = engine.register_subscriber();
    engine.subscribe_all(dashboard.id());

    engine.start_session(start_request("v-1"), None).await.expect("start");
    engine.submit_position(position("v-1", 0.0, 0.0), None).await.expect("report");
    // drain the events of the successful operations
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStarted);
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::PositionUpdate);
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionUpdated);

    store.set_fail_writes(true);
    let err =
        engine.submit_position(position("v-1", 0.0009, 0.0), None).await.unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));

    let session = engine.active_session_for("v-1").expect("still active");
    assert_eq!(session.positions_count, 1);
    assert!(session.total_distance_meters.abs() < f64::EPSILON);
    expect_silence(&dashboard).await;

    let err = engine.stop_vehicle("v-1").await.unwrap_err();
    assert!(matches!(err, Error::Persistence(_)));
    assert!(engine.active_session_for("v-1").is_some());
    expect_silence(&dashboard).await;

    // once the store recovers the same stop goes through
    store.set_fail_writes(false);
    assert!(engine.stop_vehicle("v-1").await.expect("stop after recovery"));
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStopped);
}

#[tokio::test]
async fn disconnect_clears_scopes_and_producer_mapping() {
    let (engine, _, _) = engine_with(&["v-1"]);

    let producer = engine.register_subscriber();
    engine.subscribe(producer.id(), "v-1");
    engine.start_session(start_request("v-1"), Some(producer.id())).await.expect("start");

    engine.disconnect(producer.id());
    assert!(producer.recv().await.is_none());

    // session is still stopped, the command simply has nowhere to go
    assert!(engine.force_stop_vehicle("v-1", None).await.expect("force stop"));
    assert!(engine.active_session_for("v-1").is_none());
}

#[tokio::test]
async fn history_pages_are_clamped() {
    let (engine, _, _) = engine_with(&["v-1"]);

    for _ in 0..3 {
        engine.start_session(start_request("v-1"), None).await.expect("start");
    }

    assert_eq!(engine.history("v-1", Some(2)).len(), 2);
    assert_eq!(engine.history("v-1", None).len(), 3);

    let mut config = test_config();
    config.history_limit_max = 1;
    let capped = tracking::TrackingEngine::new(
        config,
        crate::provider::MockDirectory::with_vehicles(&["v-1"]),
        crate::provider::MockTrackStore::default(),
    );
    capped.start_session(start_request("v-1"), None).await.expect("start");
    capped.start_session(start_request("v-1"), None).await.expect("start");
    assert_eq!(capped.history("v-1", Some(50)).len(), 1);
}

#[tokio::test]
async fn reap_ends_stale_sessions_exactly_once() {
    let (engine, _, _) = engine_with(&["v-1", "v-2"]);
    let dashboard = engine.register_subscriber();
    engine.subscribe_all(dashboard.id());

    engine.start_session(start_request("v-1"), None).await.expect("start v-1");
    engine.start_session(start_request("v-2"), None).await.expect("start v-2");
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStarted);
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStarted);

    // both sessions are fresh, the sweep leaves them alone
    assert!(engine.reap_stale(chrono::Utc::now()).await.is_empty());
    assert_eq!(engine.active_sessions().len(), 2);
    expect_silence(&dashboard).await;

    // sweep from past the timeout ends both, one stop event each
    let later = chrono::Utc::now() + chrono::Duration::seconds(61);
    let reaped = engine.reap_stale(later).await;
    assert_eq!(reaped.len(), 2);
    assert!(engine.active_sessions().is_empty());
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStopped);
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStopped);

    // already-ended sessions are not reaped again
    assert!(engine.reap_stale(later).await.is_empty());
    expect_silence(&dashboard).await;
}

#[tokio::test]
async fn spawned_reaper_sweeps_and_shuts_down() {
    let mut config = test_config();
    config.session_timeout = chrono::Duration::zero();
    config.reaper_interval = std::time::Duration::from_millis(50);
    let engine = tracking::TrackingEngine::new(
        config,
        crate::provider::MockDirectory::with_vehicles(&["v-1"]),
        crate::provider::MockTrackStore::default(),
    );
    let dashboard = engine.register_subscriber();
    engine.subscribe(dashboard.id(), "v-1");

    let reaper = tracking::reaper::spawn(engine.clone());
    engine.start_session(start_request("v-1"), None).await.expect("start");
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStarted);

    // zero timeout makes the session stale on the next tick
    assert_eq!(next_event(&dashboard).await.kind(), EventKind::SessionStopped);
    assert!(engine.active_session_for("v-1").is_none());

    reaper.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_keep_at_most_one_session_active() {
    let (engine, _, _) = engine_with(&["v-1"]);

    let starts = (0..8).map(|_| {
        let engine = engine.clone();
        async move { engine.start_session(start_request("v-1"), None).await }
    });
    let outcomes = join_all(starts).await;
    assert!(outcomes.iter().all(Result::is_ok));

    let history = engine.history("v-1", None);
    assert_eq!(history.len(), 8);
    assert_eq!(history.iter().filter(|session| session.is_active).count(), 1);
    assert_eq!(engine.active_sessions().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reports_are_all_counted() {
    let (engine, _, store) = engine_with(&["v-1"]);
    engine.start_session(start_request("v-1"), None).await.expect("start");

    let reports = (0..20).map(|step| {
        let engine = engine.clone();
        let latitude = f64::from(step) * 0.0001;
        async move { engine.submit_position(position("v-1", latitude, 0.0), None).await }
    });
    let outcomes = join_all(reports).await;
    assert!(outcomes.iter().all(Result::is_ok));

    let session = engine.active_session_for("v-1").expect("active");
    assert_eq!(session.positions_count, 20);
    assert_eq!(store.position_rows().await, 20);
    assert!(session.total_distance_meters > 0.0);
}
