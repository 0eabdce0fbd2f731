use super::*;
use crate::test_support::{
    memory_store, unreachable_backend, FailingStore, FakeServer, TestCamera, RECOGNIZED_BUDI,
    REJECTED_UNKNOWN,
};
use shared::domain::Score;
use std::time::Duration;

async fn controller_for(backend: Arc<dyn RecognitionBackend>) -> (AttendanceController, Arc<ActivityLog>, ConnectivityIndicator) {
    let log = Arc::new(ActivityLog::load(memory_store().await).await.expect("log"));
    let connectivity = ConnectivityIndicator::new();
    let controller = AttendanceController::new(
        backend,
        log.clone(),
        connectivity.clone(),
        capture::DEFAULT_JPEG_QUALITY,
    );
    (controller, log, connectivity)
}

#[tokio::test]
async fn recognized_face_is_logged_once() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, RECOGNIZED_BUDI).await;
    let (controller, log, connectivity) = controller_for(server.backend()).await;
    controller.enter(&TestCamera::default()).await.expect("camera");

    let before = Utc::now();
    let result = controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect("verify");

    let AttendanceResult::Success {
        identity,
        model,
        observed_at,
    } = &result
    else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(identity.name, "Budi");
    assert_eq!(identity.nim, "21001");
    assert_eq!(identity.confidence, Score::new("98.2"));
    assert_eq!(identity.distance, Score::new("0.21"));
    assert_eq!(*model, RecognitionModel::Facenet);
    assert!(*observed_at >= before);

    let entries = log.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(Some(entries[0].clone()), result.log_entry());
    assert_eq!(controller.state().await, AttendanceState::Succeeded);
    assert!(connectivity.is_connected());
    assert_eq!(server.hits("verify").await, 1);
}

#[tokio::test]
async fn rejected_face_leaves_log_untouched() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, REJECTED_UNKNOWN).await;
    let (controller, log, connectivity) = controller_for(server.backend()).await;
    controller.enter(&TestCamera::default()).await.expect("camera");

    let result = controller
        .submit_verification(RecognitionModel::Facenet512)
        .await
        .expect("verify");

    assert_eq!(
        result,
        AttendanceResult::Failure {
            kind: ErrorKind::BackendRejected,
            reason: "Wajah tidak dikenali".into(),
        }
    );
    assert!(log.is_empty().await);
    assert_eq!(controller.state().await, AttendanceState::Failed);
    assert!(connectivity.is_connected());
}

#[tokio::test]
async fn rejection_without_message_uses_default_reason() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, r#"{"status":"failed"}"#).await;
    let (controller, _log, _connectivity) = controller_for(server.backend()).await;
    controller.enter(&TestCamera::default()).await.expect("camera");

    let result = controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect("verify");
    assert_eq!(
        result,
        AttendanceResult::Failure {
            kind: ErrorKind::BackendRejected,
            reason: "Wajah tidak dikenali.".into(),
        }
    );
}

#[tokio::test]
async fn network_failure_flags_backend_disconnected() {
    let (controller, log, connectivity) = controller_for(unreachable_backend().await).await;
    let mut banner = connectivity.subscribe();
    controller.enter(&TestCamera::default()).await.expect("camera");

    let result = controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect("verify");

    assert_eq!(
        result,
        AttendanceResult::Failure {
            kind: ErrorKind::ConnectivityFailure,
            reason: CONNECTIVITY_FAILURE_MESSAGE.into(),
        }
    );
    assert!(!connectivity.is_connected());
    assert!(banner.has_changed().expect("sender alive"));
    assert!(log.is_empty().await);
}

#[tokio::test]
async fn malformed_success_is_a_connectivity_failure() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, r#"{"status":"success"}"#).await;
    let (controller, log, connectivity) = controller_for(server.backend()).await;
    controller.enter(&TestCamera::default()).await.expect("camera");

    let result = controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect("verify");
    assert!(matches!(
        result,
        AttendanceResult::Failure {
            kind: ErrorKind::ConnectivityFailure,
            ..
        }
    ));
    assert!(!connectivity.is_connected());
    assert!(log.is_empty().await);
}

#[tokio::test]
async fn later_success_restores_connectivity() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, RECOGNIZED_BUDI).await;
    let (controller, _log, connectivity) = controller_for(server.backend()).await;
    controller.enter(&TestCamera::default()).await.expect("camera");
    connectivity.set_connected(false);

    controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect("verify");
    assert!(connectivity.is_connected());
}

#[tokio::test]
async fn verifying_without_camera_is_camera_unavailable() {
    let server = FakeServer::spawn().await;
    let (controller, log, _connectivity) = controller_for(server.backend()).await;

    let err = controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect_err("no stream");
    assert!(matches!(err, WorkflowError::CameraUnavailable(_)));
    assert_eq!(controller.state().await, AttendanceState::Idle);
    assert_eq!(server.hits("verify").await, 0);
    assert!(log.is_empty().await);
}

#[tokio::test]
async fn unavailable_camera_fails_enter() {
    let server = FakeServer::spawn().await;
    let (controller, _log, _connectivity) = controller_for(server.backend()).await;
    let err = controller
        .enter(&TestCamera::unavailable())
        .await
        .expect_err("denied");
    assert!(matches!(err, WorkflowError::CameraUnavailable(_)));
}

#[tokio::test]
async fn concurrent_submission_is_rejected_as_busy() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, RECOGNIZED_BUDI).await;
    server.set_delay(Duration::from_millis(300)).await;
    let (controller, log, _connectivity) = controller_for(server.backend()).await;
    controller.enter(&TestCamera::default()).await.expect("camera");

    let first = controller.submit_verification(RecognitionModel::Facenet);
    let second = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.is_submitting());
        controller.submit_verification(RecognitionModel::Facenet).await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.expect("first").is_success());
    assert_eq!(second.expect_err("second"), WorkflowError::Busy);
    assert_eq!(server.hits("verify").await, 1);
    assert_eq!(log.len().await, 1);
    assert!(!controller.is_submitting());
}

#[tokio::test]
async fn exit_and_drop_release_the_camera_once() {
    let server = FakeServer::spawn().await;
    let camera = TestCamera::default();
    let (controller, _log, _connectivity) = controller_for(server.backend()).await;

    controller.enter(&camera).await.expect("camera");
    controller.exit().await;
    controller.exit().await;
    assert_eq!(camera.release_count(), 1);

    controller.enter(&camera).await.expect("camera again");
    drop(controller);
    assert_eq!(camera.open_count(), 2);
    assert_eq!(camera.release_count(), 2);
}

#[tokio::test]
async fn log_persistence_failure_keeps_success_result() {
    let server = FakeServer::spawn().await;
    server.respond("verify", 200, RECOGNIZED_BUDI).await;
    let log = Arc::new(ActivityLog::load(Arc::new(FailingStore)).await.expect("log"));
    let controller = AttendanceController::new(
        server.backend(),
        log.clone(),
        ConnectivityIndicator::new(),
        capture::DEFAULT_JPEG_QUALITY,
    );
    controller.enter(&TestCamera::default()).await.expect("camera");

    let result = controller
        .submit_verification(RecognitionModel::Facenet)
        .await
        .expect("verify");
    assert!(result.is_success());
    assert_eq!(log.len().await, 1);
}
