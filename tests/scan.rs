//! Scan session and controller integration tests

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use spotter_gateway::scan::{
    CycleOutcome, ScanConfig, ScanController, ScanSession, ScanState,
};

mod common;
use common::{CountingFeedback, FakeCamera, FakeSpeech, ScriptedDetector, Step};

fn build_session(
    speech_available: bool,
    camera_fails: bool,
    script: Vec<Step>,
    config: ScanConfig,
) -> (ScanSession, common::Handles) {
    let mut camera = FakeCamera::new();
    camera.fail_open = camera_fails;
    let feedback = CountingFeedback::new();
    let detector = Arc::new(ScriptedDetector::new(script));

    let handles = common::Handles {
        camera_open: Arc::clone(&camera.opened),
        beeps: Arc::clone(&feedback.beeps),
        vibrations: Arc::clone(&feedback.vibrations),
        detector_calls: Arc::clone(&detector.calls),
    };

    let session = ScanSession::new(
        Box::new(FakeSpeech {
            available: speech_available,
        }),
        Box::new(camera),
        Box::new(feedback),
        detector,
        config,
    );

    (session, handles)
}

#[tokio::test]
async fn start_recording_without_speech_reports_and_aborts() {
    let (mut session, _handles) =
        build_session(false, false, vec![], ScanConfig::default());

    assert!(session.start_recording().is_err());
    assert_eq!(session.state(), ScanState::Idle);
    assert!(session.status().contains("not available"));
}

#[tokio::test]
async fn camera_failure_keeps_session_listening() {
    let (mut session, handles) = build_session(true, true, vec![], ScanConfig::default());

    session.start_recording().unwrap();
    session.on_transcript("the bottles");

    assert!(session.stop_recording().is_err());
    assert_eq!(session.state(), ScanState::Listening);
    assert!(session.status().contains("camera unavailable"));
    assert!(!handles.camera_open.load(Ordering::SeqCst));

    // No silent retry: ticks do nothing while listening
    assert_eq!(session.tick().await, CycleOutcome::Inactive);
    assert_eq!(handles.detector_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn found_feedback_refires_every_positive_cycle() {
    let script = vec![Step::NotFound, Step::Found, Step::Found, Step::NotFound];
    let (mut session, handles) = build_session(true, false, script, ScanConfig::default());

    session.start_recording().unwrap();
    session.on_transcript("The Bottles!");
    assert_eq!(session.target().as_str(), "bottle");
    session.stop_recording().unwrap();
    assert_eq!(session.state(), ScanState::Scanning);

    assert_eq!(session.tick().await, CycleOutcome::Done { found: false });
    assert_eq!(session.state(), ScanState::Scanning);
    assert_eq!(handles.beeps.load(Ordering::SeqCst), 0);

    assert_eq!(session.tick().await, CycleOutcome::Done { found: true });
    assert_eq!(session.state(), ScanState::Found);
    assert_eq!(handles.beeps.load(Ordering::SeqCst), 1);
    assert_eq!(handles.vibrations.load(Ordering::SeqCst), 1);

    // Level-triggered: a second positive cycle fires feedback again
    assert_eq!(session.tick().await, CycleOutcome::Done { found: true });
    assert_eq!(handles.beeps.load(Ordering::SeqCst), 2);

    // Target drifts out of frame: the search re-arms
    assert_eq!(session.tick().await, CycleOutcome::Done { found: false });
    assert_eq!(session.state(), ScanState::Scanning);
    assert_eq!(handles.beeps.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn beep_disabled_still_vibrates() {
    let config = ScanConfig {
        beep_enabled: false,
        ..ScanConfig::default()
    };
    let (mut session, handles) = build_session(true, false, vec![Step::Found], config);

    session.start_recording().unwrap();
    session.on_transcript("cup");
    session.stop_recording().unwrap();

    session.tick().await;
    assert_eq!(handles.beeps.load(Ordering::SeqCst), 0);
    assert_eq!(handles.vibrations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn detector_errors_do_not_stop_the_loop() {
    let script = vec![Step::Fail, Step::Found];
    let (mut session, handles) = build_session(true, false, script, ScanConfig::default());

    session.start_recording().unwrap();
    session.on_transcript("a chair");
    session.stop_recording().unwrap();

    let outcome = session.tick().await;
    assert!(matches!(outcome, CycleOutcome::Failed(_)));
    assert_eq!(session.state(), ScanState::Scanning);
    assert!(session.status().contains("detection failed"));

    // Next cycle still fires and succeeds
    assert_eq!(session.tick().await, CycleOutcome::Done { found: true });
    assert_eq!(handles.detector_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_detecting_releases_camera_and_keeps_target() {
    let (mut session, handles) =
        build_session(true, false, vec![Step::NotFound], ScanConfig::default());

    session.start_recording().unwrap();
    session.on_transcript("an apple");
    session.stop_recording().unwrap();
    assert!(handles.camera_open.load(Ordering::SeqCst));

    session.stop_detecting();
    assert_eq!(session.state(), ScanState::Idle);
    assert!(!handles.camera_open.load(Ordering::SeqCst));
    assert_eq!(session.target().as_str(), "apple");

    // Resume without re-recording
    session.start_scanning().unwrap();
    assert_eq!(session.state(), ScanState::Scanning);
    assert!(handles.camera_open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn new_recording_tears_down_running_scan() {
    let (mut session, handles) =
        build_session(true, false, vec![Step::Found], ScanConfig::default());

    session.start_recording().unwrap();
    session.on_transcript("dog");
    session.stop_recording().unwrap();
    session.tick().await;
    assert_eq!(session.state(), ScanState::Found);

    session.start_recording().unwrap();
    assert_eq!(session.state(), ScanState::Listening);
    assert!(!handles.camera_open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn debug_history_is_bounded_and_most_recent_first() {
    let config = ScanConfig {
        debug_enabled: true,
        ..ScanConfig::default()
    };
    let mut script = Vec::new();
    for _ in 0..24 {
        script.push(Step::NotFound);
    }
    script.push(Step::Found);
    let (mut session, _handles) = build_session(true, false, script, config);

    session.start_recording().unwrap();
    session.on_transcript("cat");
    session.stop_recording().unwrap();

    for _ in 0..25 {
        session.tick().await;
    }

    assert_eq!(session.history().len(), 20);
    assert!(session.history().latest().unwrap().found);
    assert!(session.history().iter().skip(1).all(|e| !e.found));
}

#[tokio::test]
async fn empty_target_still_scans() {
    let (mut session, handles) =
        build_session(true, false, vec![Step::NotFound], ScanConfig::default());

    session.start_recording().unwrap();
    session.on_transcript("   ");
    assert!(session.target().is_empty());
    session.stop_recording().unwrap();

    assert_eq!(session.tick().await, CycleOutcome::Done { found: false });
    assert_eq!(handles.detector_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_detection_never_piles_up_requests() {
    // Detection takes 350ms against a 100ms capture interval; with
    // at-most-one-in-flight the loop completes ~3 cycles per second
    // instead of 10.
    let detector = Arc::new(ScriptedDetector::with_delay(
        vec![Step::NotFound],
        Duration::from_millis(350),
    ));
    let calls = Arc::clone(&detector.calls);

    let camera = FakeCamera::new();
    let feedback = CountingFeedback::new();
    let config = ScanConfig {
        scan_interval: Duration::from_millis(100),
        ..ScanConfig::default()
    };

    let session = ScanSession::new(
        Box::new(FakeSpeech { available: true }),
        Box::new(camera),
        Box::new(feedback),
        detector,
        config,
    );

    let mut controller = ScanController::new(session);
    controller.start_recording().await.unwrap();
    controller.on_transcript("keyboard").await;
    controller.stop_recording().await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    controller.stop_detecting().await;

    let total = calls.load(Ordering::SeqCst);
    assert!(total >= 2, "loop did not run: {total} calls");
    assert!(total <= 4, "requests piled up: {total} calls");
}

#[tokio::test(start_paused = true)]
async fn interval_change_reschedules_single_timer() {
    let detector = Arc::new(ScriptedDetector::new(vec![Step::NotFound]));
    let calls = Arc::clone(&detector.calls);

    let session = ScanSession::new(
        Box::new(FakeSpeech { available: true }),
        Box::new(FakeCamera::new()),
        Box::new(CountingFeedback::new()),
        detector,
        ScanConfig {
            scan_interval: Duration::from_millis(100),
            ..ScanConfig::default()
        },
    );

    let mut controller = ScanController::new(session);
    controller.start_recording().await.unwrap();
    controller.on_transcript("mouse").await;
    controller.stop_recording().await.unwrap();

    tokio::time::sleep(Duration::from_millis(450)).await;
    let at_old_cadence = calls.load(Ordering::SeqCst);
    assert!(
        (3..=5).contains(&at_old_cadence),
        "unexpected cadence: {at_old_cadence}"
    );

    controller
        .set_config(ScanConfig {
            scan_interval: Duration::from_millis(300),
            ..ScanConfig::default()
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    controller.stop_detecting().await;

    let at_new_cadence = calls.load(Ordering::SeqCst) - at_old_cadence;
    // Old cadence would have produced ~9 captures; two live timers even
    // more. The rebuilt timer fires at the new period only.
    assert!(
        (2..=4).contains(&at_new_cadence),
        "unexpected cadence after change: {at_new_cadence}"
    );
}

#[tokio::test]
async fn invalid_interval_is_rejected() {
    let (mut session, _handles) = build_session(true, false, vec![], ScanConfig::default());

    let bad = ScanConfig {
        scan_interval: Duration::ZERO,
        ..ScanConfig::default()
    };
    assert!(session.set_config(bad).is_err());
    // Old config still in effect
    assert_eq!(session.config().scan_interval, Duration::from_secs(2));
}
