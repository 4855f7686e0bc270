//! Capture sequencing and option translation against the simulated backend.

use std::time::Duration;

use tracing_test::traced_test;

use gcam::{Camera, Error};
use gcam_capture::{
    AcquisitionMode, BalanceChannel, BalanceSetting, BufferPolicy, CameraSession, CollectOptions,
    DimensionSetting, ExposureSetting, TriggerFlag,
};
use gcam_sim::{PullOutcome, SimCamera, SimModule};
use gcam_types::ExposurePreset;

fn open_session() -> CameraSession<SimCamera> {
    let mut module = SimModule::with_cameras(1);
    CameraSession::open(&mut module, "sim-0").unwrap()
}

fn fire_after(trigger: &TriggerFlag, delay: Duration) -> std::thread::JoinHandle<()> {
    let trigger = trigger.clone();
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        trigger.fire();
    })
}

#[test]
fn triggered_capture_discards_one_frame_and_returns_the_next() {
    let mut session = open_session();
    let trigger = TriggerFlag::new();
    let firer = fire_after(&trigger, Duration::from_millis(50));

    let frame = session.capture_on_trigger(&trigger).unwrap();
    firer.join().unwrap();

    // No pulls happen before the flag fires, so the discarded in-flight frame
    // is id 1 and the first post-trigger frame is id 2.
    assert_eq!(frame.frame_id, 2);

    let cam = session.camera().unwrap();
    assert_eq!(cam.writes_to("AcquisitionMode"), 1);
    assert_eq!(cam.writes_to("StreamBufferHandlingMode"), 1);
    assert!(cam
        .write_log()
        .contains(&"StreamBufferHandlingMode=NewestOnly".to_string()));
}

#[test]
fn incomplete_in_flight_frame_does_not_abort_the_sequence() {
    let mut session = open_session();
    session
        .camera_mut()
        .unwrap()
        .plan_pulls(&[PullOutcome::Incomplete]);

    let trigger = TriggerFlag::new();
    trigger.fire();
    let frame = session.capture_on_trigger(&trigger).unwrap();
    assert_eq!(frame.frame_id, 2);
}

#[test]
fn incomplete_target_frame_is_a_detectable_capture_error() {
    let mut session = open_session();
    session
        .camera_mut()
        .unwrap()
        .plan_pulls(&[PullOutcome::Complete, PullOutcome::Incomplete]);

    let trigger = TriggerFlag::new();
    trigger.fire();
    assert!(matches!(
        session.capture_on_trigger(&trigger),
        Err(Error::IncompleteFrame(_))
    ));
    // the sequencer stopped the acquisition it started
    assert!(session.camera_mut().unwrap().next_frame(None).is_err());
}

#[test]
fn two_cameras_share_one_trigger() {
    let mut module = SimModule::with_cameras(2);
    let mut sessions = vec![
        CameraSession::open(&mut module, "sim-0").unwrap(),
        CameraSession::open(&mut module, "sim-1").unwrap(),
    ];

    let trigger = TriggerFlag::new();
    let firer = fire_after(&trigger, Duration::from_millis(50));
    let results = gcam_capture::capture_all_on_trigger(&mut sessions, &trigger);
    firer.join().unwrap();

    assert_eq!(results.len(), 2);
    for result in results {
        assert_eq!(result.unwrap().frame_id, 2);
    }
}

#[test]
fn single_capture_uses_single_frame_mode() {
    let mut session = open_session();
    let frame = session.capture_single().unwrap();
    assert_eq!(frame.frame_id, 1);
    let cam = session.camera().unwrap();
    assert!(cam
        .write_log()
        .contains(&"AcquisitionMode=SingleFrame".to_string()));
}

#[test]
fn collection_reports_gaps_and_lost_frames() {
    let mut session = open_session();
    session.camera_mut().unwrap().plan_pulls(&[
        PullOutcome::Complete,
        PullOutcome::Incomplete,
        PullOutcome::Complete,
        PullOutcome::Incomplete,
        PullOutcome::Complete,
    ]);

    let collection = session
        .collect_frames(5, &CollectOptions::default())
        .unwrap();
    assert_eq!(collection.requested, 5);
    assert_eq!(collection.frames.len(), 3);
    assert!(collection.lost_count >= 2);
    let ids: Vec<u64> = collection.frames.iter().map(|f| f.frame_id).collect();
    assert_eq!(ids, vec![1, 3, 5]);

    let cam = session.camera().unwrap();
    assert!(cam
        .write_log()
        .contains(&"StreamBufferCountMode=Manual".to_string()));
    assert!(cam
        .write_log()
        .contains(&"StreamBufferHandlingMode=OldestFirst".to_string()));
    assert!(cam
        .write_log()
        .contains(&"StreamBufferCountManual=100".to_string()));
}

#[test]
fn collection_tolerates_timeouts() {
    let mut session = open_session();
    session.camera_mut().unwrap().plan_pulls(&[
        PullOutcome::Timeout,
        PullOutcome::Complete,
        PullOutcome::Complete,
    ]);
    let collection = session
        .collect_frames(
            3,
            &CollectOptions {
                frame_timeout: Duration::from_millis(10),
                ..CollectOptions::default()
            },
        )
        .unwrap();
    assert_eq!(collection.frames.len(), 2);
}

#[test]
fn parallel_burst_collects_on_every_camera() {
    let mut module = SimModule::with_cameras(2);
    let mut sessions = vec![
        CameraSession::open(&mut module, "sim-0").unwrap(),
        CameraSession::open(&mut module, "sim-1").unwrap(),
    ];
    let results = gcam_capture::collect_all_frames(&mut sessions, 3, &CollectOptions::default());
    assert_eq!(results.len(), 2);
    for result in results {
        let collection = result.unwrap();
        assert_eq!(collection.frames.len(), 3);
        let ids: Vec<u64> = collection.frames.iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}

#[test]
fn acquisition_mode_and_buffer_policy_are_settable() {
    let mut session = open_session();
    session.set_acquisition_mode(AcquisitionMode::MultiFrame);
    session.set_buffer_policy(BufferPolicy::NewestFirst);
    let cam = session.camera().unwrap();
    assert_eq!(cam.feature_enum("AcquisitionMode").unwrap(), "MultiFrame");
    assert!(cam
        .write_log()
        .contains(&"StreamBufferHandlingMode=NewestFirst".to_string()));
}

#[test]
fn collection_works_inside_an_existing_acquisition() {
    let mut session = open_session();
    session.start_acquisition().unwrap();
    let collection = session
        .collect_frames(2, &CollectOptions::default())
        .unwrap();
    assert_eq!(collection.frames.len(), 2);
    // acquisition was not started by the collector, so it stays active
    assert!(session.camera_mut().unwrap().next_frame(None).is_ok());
    session.stop_acquisition().unwrap();
}

#[test]
fn shutdown_is_idempotent_and_terminal() {
    let mut session = open_session();
    session.start_acquisition().unwrap();
    session.shutdown().unwrap();
    session.shutdown().unwrap();
    assert!(!session.is_open());
    assert!(matches!(session.capture_single(), Err(Error::CameraClosed)));
    assert!(matches!(
        session.start_acquisition(),
        Err(Error::CameraClosed)
    ));
    // setting calls after shutdown are diagnostic no-ops
    session.set_exposure(ExposureSetting::Manual(1000.0));
}

#[traced_test]
#[test]
fn exposure_requests_clamp_to_the_device_range() {
    let mut session = open_session();

    session.set_exposure(ExposureSetting::Preset(ExposurePreset::Shutter1_1000));
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_float("ExposureTime")
            .unwrap(),
        1_000.0
    );

    session.set_exposure(ExposureSetting::Preset(ExposurePreset::S20));
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_float("ExposureTime")
            .unwrap(),
        20_000_000.0
    );

    session.set_exposure(ExposureSetting::Manual(50_000_000.0));
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_float("ExposureTime")
            .unwrap(),
        30_000_000.0
    );
    assert!(logs_contain("clamping"));
}

#[test]
fn exposure_auto_switches_the_auto_node() {
    let mut session = open_session();
    session.set_exposure(ExposureSetting::Manual(1_000.0));
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_enum("ExposureAuto")
            .unwrap(),
        "Off"
    );
    session.set_exposure(ExposureSetting::Auto);
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_enum("ExposureAuto")
            .unwrap(),
        "Continuous"
    );
    // auto mode performs no manual value write
    assert_eq!(session.camera().unwrap().writes_to("ExposureTime"), 1);
}

#[traced_test]
#[test]
fn unknown_preset_names_write_nothing() {
    let mut session = open_session();
    let writes_before = session.camera().unwrap().write_log().len();
    session.apply_named("ExposureTime", "Shutter_1_7");
    session.apply_named("FocusDistance", "Auto");
    assert_eq!(session.camera().unwrap().write_log().len(), writes_before);
    assert!(logs_contain("unknown value"));
}

#[test]
fn named_settings_reach_the_device() {
    let mut session = open_session();
    session.apply_named("Gain", "ISO_1600");
    assert_eq!(
        session.camera().unwrap().feature_float("Gain").unwrap(),
        24.0
    );
    session.apply_named("PixelFormat", "Mono8");
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_enum("PixelFormat")
            .unwrap(),
        "Mono8"
    );
}

#[test]
fn defaults_apply_the_documented_values() {
    let mut session = open_session();
    session.set_defaults();
    let cam = session.camera().unwrap();
    assert_eq!(cam.feature_float("ExposureTime").unwrap(), 33_333.0);
    assert_eq!(cam.feature_float("Gain").unwrap(), 24.0);
    assert_eq!(cam.feature_float("Gamma").unwrap(), 0.75);
    assert_eq!(cam.feature_float("BlackLevel").unwrap(), 0.25);
    assert_eq!(cam.feature_int("Width").unwrap(), 1440);
    assert_eq!(cam.feature_int("OffsetX").unwrap(), 0);
    // the blue ratio was written last, with the selector on Blue
    assert_eq!(cam.feature_enum("BalanceRatioSelector").unwrap(), "Blue");
    assert_eq!(cam.feature_float("BalanceRatio").unwrap(), 2.25);
}

#[test]
fn custom_dimensions_clamp_offsets_to_the_sensor() {
    let mut session = open_session();
    session.set_dimensions(DimensionSetting::Custom {
        width: 640,
        height: 480,
        offset_x: 5_000,
        offset_y: -3,
    });
    let cam = session.camera().unwrap();
    assert_eq!(cam.feature_int("Width").unwrap(), 640);
    assert_eq!(cam.feature_int("Height").unwrap(), 480);
    assert_eq!(cam.feature_int("OffsetX").unwrap(), 1440 - 640);
    assert_eq!(cam.feature_int("OffsetY").unwrap(), 0);
}

#[test]
fn preset_dimensions_center_the_region() {
    let mut session = open_session();
    session.apply_named("ImageDimensions", "Preset_640x480");
    let cam = session.camera().unwrap();
    assert_eq!(cam.feature_int("Width").unwrap(), 640);
    assert_eq!(cam.feature_int("OffsetX").unwrap(), (1440 - 640) / 2);
    assert_eq!(cam.feature_int("OffsetY").unwrap(), (1080 - 480) / 2);
}

#[traced_test]
#[test]
fn read_only_nodes_are_skipped_with_a_diagnostic() {
    let mut session = open_session();
    session.camera_mut().unwrap().make_read_only("ExposureTime");
    session.set_exposure(ExposureSetting::Manual(1_000.0));
    // the auto-mode switch still happens; the value write is skipped
    assert_eq!(session.camera().unwrap().writes_to("ExposureTime"), 0);
    assert_eq!(
        session
            .camera()
            .unwrap()
            .feature_enum("ExposureAuto")
            .unwrap(),
        "Off"
    );
    assert!(logs_contain("not writable"));
}

#[test]
fn balance_applies_per_channel_through_the_selector() {
    let mut session = open_session();
    session.set_balance(BalanceChannel::Red, BalanceSetting::Manual(1.5));
    let cam = session.camera().unwrap();
    assert_eq!(cam.feature_enum("BalanceRatioSelector").unwrap(), "Red");
    assert_eq!(cam.feature_float("BalanceRatio").unwrap(), 1.5);
    assert_eq!(cam.feature_enum("BalanceWhiteAuto").unwrap(), "Off");

    session.set_balance(BalanceChannel::Blue, BalanceSetting::Auto);
    let cam = session.camera().unwrap();
    assert_eq!(cam.feature_enum("BalanceWhiteAuto").unwrap(), "Continuous");
}

#[test]
fn settings_report_reads_back_current_values() {
    let mut session = open_session();
    session.set_defaults();
    let report = session.settings_report();
    assert!(report.contains("PixelFormat: BayerRG8"));
    assert!(report.contains("ExposureTime: 33333 us"));
    assert!(report.contains("Gain: 24 dB"));
    assert!(report.contains("RedBalanceRatio: 1.25"));
    assert!(report.contains("BlueBalanceRatio: 2.25"));
}
