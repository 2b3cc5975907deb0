//! End-to-end tests driving the full pipeline against the nullables.

use rollcall_crypto::TemplateCipher;
use rollcall_nullables::{session_fixture, CollectingNotifier, MemoryStore, NullClock, NullExtractor};
use rollcall_store::SecurityStateStore;
use rollcall_types::{CourseId, Frame, PipelineParams, SessionId, StudentId};
use rollcall_verification::{
    AttendancePipeline, EnrollError, MarkFailure, MarkRequest, NetworkAllowList, PipelineStores,
    VoucherRejection,
};
use std::sync::Arc;

const STUDENT: StudentId = StudentId(1);
const COURSE: CourseId = CourseId(20);
const SESSION: SessionId = SessionId(300);
const SITE_LAT: f64 = 12.9716;
const SITE_LON: f64 = 77.5946;
const CLIENT_IP: &str = "203.0.113.5";

struct World {
    store: Arc<MemoryStore>,
    notifier: Arc<CollectingNotifier>,
    clock: NullClock,
    pipeline: AttendancePipeline,
}

fn world_with(params: PipelineParams) -> World {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(CollectingNotifier::new());
    let stores = PipelineStores {
        vouchers: store.clone(),
        templates: store.clone(),
        attendance: store.clone(),
        sessions: store.clone(),
        enrollments: store.clone(),
        alerts: store.clone(),
        security: store.clone(),
    };
    let pipeline = AttendancePipeline::new(
        stores,
        Arc::new(NullExtractor::new()),
        TemplateCipher::new([11u8; 32]),
        notifier.clone(),
        NetworkAllowList::parse(&["10.0.0.0/24"]).unwrap(),
        &params,
    );

    let clock = NullClock::new(1_000_000);
    // A one-hour session, open as of the clock's start, sited on campus.
    store.add_session(session_fixture(
        SESSION,
        COURSE,
        clock.now(),
        3600,
        SITE_LAT,
        SITE_LON,
        150.0,
    ));
    store.enroll_student(STUDENT, COURSE);

    World {
        store,
        notifier,
        clock,
        pipeline,
    }
}

fn world() -> World {
    world_with(PipelineParams::defaults())
}

/// A capture with the texture profile of a real camera frame: slow ramp
/// plus mild sensor noise. Passes the liveness and quality gates.
fn live_frame(seed: u32) -> Frame {
    let mut state = seed | 1;
    let pixels: Vec<u8> = (0..4096)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let base = 90 + (i % 64) as i32;
            let noise = (state >> 24) as i32 % 17 - 8;
            (base + noise).clamp(0, 255) as u8
        })
        .collect();
    Frame::new(64, 64, pixels).unwrap()
}

/// A different spatial structure (vertical ramp): live, but not the
/// enrolled face.
fn other_face_frame(seed: u32) -> Frame {
    let mut state = seed | 1;
    let pixels: Vec<u8> = (0..4096)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let base = 90 + ((i / 64) % 64) as i32;
            let noise = (state >> 24) as i32 % 17 - 8;
            (base + noise).clamp(0, 255) as u8
        })
        .collect();
    Frame::new(64, 64, pixels).unwrap()
}

/// Blank white frame: reads as a screen replay to the liveness gate.
fn spoof_frame() -> Frame {
    Frame::new(64, 64, vec![255; 4096]).unwrap()
}

fn enroll(world: &World) {
    world
        .pipeline
        .enroll_biometric(
            STUDENT,
            &[live_frame(7), live_frame(7), live_frame(7)],
            world.clock.now(),
        )
        .unwrap();
}

fn request<'a>(token: &'a str, image: &'a [u8]) -> MarkRequest<'a> {
    MarkRequest {
        identity: STUDENT,
        session: SESSION,
        latitude: SITE_LAT,
        longitude: SITE_LON,
        voucher_token: token,
        image,
        client_ip: CLIENT_IP,
    }
}

#[test]
fn valid_attempt_marks_attendance_and_replay_is_rejected() {
    let w = world();
    enroll(&w);

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let image = live_frame(7).encode();

    let success = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap();
    assert!(success.similarity >= 0.7);
    assert!(success.distance_m <= 150.0);

    let records = w.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "face+geo+token+liveness");
    assert_eq!(records[0].client_ip, CLIENT_IP);

    // The identical call again: the consumed voucher is the signal, and
    // no second record appears.
    w.clock.advance(1);
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(
        err,
        MarkFailure::InvalidVoucher(VoucherRejection::AlreadyUsed)
    ));
    assert_eq!(w.store.records().len(), 1);
}

#[test]
fn fresh_voucher_after_success_reports_already_marked() {
    let w = world();
    enroll(&w);
    let image = live_frame(7).encode();

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    w.pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap();

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(err, MarkFailure::AlreadyMarked));
    assert_eq!(w.store.records().len(), 1);
}

#[test]
fn expired_voucher_then_retry_reports_already_used() {
    let w = world();
    enroll(&w);
    let image = live_frame(7).encode();

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();

    w.clock.advance(121);
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(
        err,
        MarkFailure::InvalidVoucher(VoucherRejection::Expired)
    ));

    // Expiry consumed the voucher; the retry is a replay.
    w.clock.advance(1);
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(
        err,
        MarkFailure::InvalidVoucher(VoucherRejection::AlreadyUsed)
    ));
}

#[test]
fn repeated_voucher_abuse_locks_the_account_until_the_window_passes() {
    let w = world();
    enroll(&w);
    let image = live_frame(7).encode();

    // Two replay-weight failures: the second crosses the alert threshold,
    // and with the two direct violations the biometric lock engages.
    for _ in 0..2 {
        let err = w
            .pipeline
            .mark_attendance(&request("forged-token", &image), w.clock.now())
            .unwrap_err();
        assert!(matches!(err, MarkFailure::InvalidVoucher(_)));
        w.clock.advance(1);
    }
    assert_eq!(w.notifier.delivered_count(), 1);
    assert_eq!(w.store.alerts().len(), 1);

    let err = w
        .pipeline
        .mark_attendance(&request("forged-token", &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(err, MarkFailure::AccountLocked));

    // The lock self-expires; afterwards the pipeline answers normally.
    w.clock.advance(601);
    let err = w
        .pipeline
        .mark_attendance(&request("forged-token", &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(
        err,
        MarkFailure::InvalidVoucher(VoucherRejection::NotFound)
    ));
}

#[test]
fn spoofed_frame_fails_liveness_and_counts_as_a_violation() {
    let w = world();
    enroll(&w);

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let image = spoof_frame().encode();
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(err, MarkFailure::LivenessFailed));

    let state = w.store.get_security_state(STUDENT).unwrap();
    assert_eq!(state.biometric_violations, 1);
    assert_eq!(w.store.records().len(), 0);
}

#[test]
fn wrong_face_is_rejected_below_threshold() {
    let w = world();
    enroll(&w);

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let image = other_face_frame(99).encode();
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(err, MarkFailure::BiometricMismatch));
}

#[test]
fn far_coordinates_are_rejected_unless_the_network_is_trusted() {
    let w = world();
    enroll(&w);
    let image = live_frame(7).encode();

    // ~11 km north of campus: outside every distance rule.
    let far_lat = SITE_LAT + 0.1;

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let mut req = request(&token, &image);
    req.latitude = far_lat;
    let err = w.pipeline.mark_attendance(&req, w.clock.now()).unwrap_err();
    assert!(matches!(err, MarkFailure::OutsideCampus));

    // The same coordinates from a campus network are accepted, and the
    // true distance is preserved in the record.
    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let mut req = request(&token, &image);
    req.latitude = far_lat;
    req.client_ip = "10.0.0.42";
    let success = w.pipeline.mark_attendance(&req, w.clock.now()).unwrap();
    assert!(success.distance_m > 10_000.0);
    assert_eq!(w.store.records().len(), 1);
    assert!(w.store.records()[0].distance_m > 10_000.0);
}

#[test]
fn malformed_images_rate_limit_the_identity() {
    // Raise the lockout threshold so the limiter is what answers.
    let mut params = PipelineParams::defaults();
    params.biometric_lock_threshold = 10;
    let w = world_with(params);
    enroll(&w);

    for _ in 0..3 {
        let token = w
            .pipeline
            .issue_voucher(STUDENT, SESSION, w.clock.now())
            .unwrap();
        let err = w
            .pipeline
            .mark_attendance(&request(&token, b"not a frame"), w.clock.now())
            .unwrap_err();
        assert!(matches!(err, MarkFailure::BadImage));
    }

    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let image = live_frame(7).encode();
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    match err {
        MarkFailure::RateLimited { retry_after_secs } => assert!(retry_after_secs > 0),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[test]
fn session_window_gates_marking_and_issuance() {
    let w = world();
    enroll(&w);
    let image = live_frame(7).encode();

    // A session that opens two hours from now.
    let later = SessionId(301);
    w.store.add_session(session_fixture(
        later,
        COURSE,
        w.clock.now().plus(7200),
        3600,
        SITE_LAT,
        SITE_LON,
        150.0,
    ));
    assert!(matches!(
        w.pipeline.issue_voucher(STUDENT, later, w.clock.now()),
        Err(rollcall_verification::IssueFailure::SessionNotOpen)
    ));

    let mut req = request("irrelevant", &image);
    req.session = later;
    assert!(matches!(
        w.pipeline.mark_attendance(&req, w.clock.now()).unwrap_err(),
        MarkFailure::SessionNotOpen
    ));

    // The open session stops accepting past its grace period.
    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    w.clock.advance(3600 + 31);
    assert!(matches!(
        w.pipeline
            .mark_attendance(&request(&token, &image), w.clock.now())
            .unwrap_err(),
        MarkFailure::SessionNotOpen
    ));
}

#[test]
fn unknown_and_unenrolled_paths() {
    let w = world();
    enroll(&w);
    let image = live_frame(7).encode();

    let mut req = request("whatever", &image);
    req.session = SessionId(999);
    assert!(matches!(
        w.pipeline.mark_attendance(&req, w.clock.now()).unwrap_err(),
        MarkFailure::SessionNotOpen
    ));

    // Enrolled nowhere: the attempt is suspicious but reported plainly.
    let outsider = StudentId(55);
    let mut req = request("whatever", &image);
    req.identity = outsider;
    assert!(matches!(
        w.pipeline.mark_attendance(&req, w.clock.now()).unwrap_err(),
        MarkFailure::NotEnrolled
    ));
}

#[test]
fn marking_without_a_template_is_a_precondition_failure() {
    let w = world();
    // No enrollment of a biometric template.
    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let image = live_frame(7).encode();
    let err = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now())
        .unwrap_err();
    assert!(matches!(err, MarkFailure::FaceNotRegistered));

    // A fatal precondition is not an attack signal by itself.
    assert_eq!(w.store.alerts().len(), 0);
    assert_eq!(
        w.store.get_security_state(STUDENT).unwrap().biometric_violations,
        0
    );
}

#[test]
fn enrollment_requires_quality_and_resets_the_violation_counter() {
    let w = world();

    // Only one frame survives the gate: too dark frames are dropped.
    let dark = Frame::new(64, 64, vec![5; 4096]).unwrap();
    let err = w
        .pipeline
        .enroll_biometric(
            STUDENT,
            &[live_frame(7), dark.clone(), dark],
            w.clock.now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EnrollError::InsufficientQuality { passed: 1, needed: 2 }
    ));

    enroll(&w);

    // Accumulate a violation, then re-enroll: the counter resets.
    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let spoof = spoof_frame().encode();
    w.pipeline
        .mark_attendance(&request(&token, &spoof), w.clock.now())
        .unwrap_err();
    assert_eq!(
        w.store.get_security_state(STUDENT).unwrap().biometric_violations,
        1
    );

    enroll(&w);
    assert_eq!(
        w.store.get_security_state(STUDENT).unwrap().biometric_violations,
        0
    );
}

#[test]
fn credential_lockout_is_independent_of_the_biometric_path() {
    let w = world();
    enroll(&w);

    for _ in 0..8 {
        w.pipeline
            .register_failed_credential(STUDENT, w.clock.now())
            .unwrap();
    }
    let image = live_frame(7).encode();
    assert!(matches!(
        w.pipeline
            .mark_attendance(&request("any", &image), w.clock.now())
            .unwrap_err(),
        MarkFailure::AccountLocked
    ));

    // Credential locks run the longer 15-minute window.
    w.clock.advance(601);
    assert!(matches!(
        w.pipeline
            .mark_attendance(&request("any", &image), w.clock.now())
            .unwrap_err(),
        MarkFailure::AccountLocked
    ));

    // Once it expires, a normal attempt goes all the way through.
    w.clock.advance(300);
    let token = w
        .pipeline
        .issue_voucher(STUDENT, SESSION, w.clock.now())
        .unwrap();
    let success = w
        .pipeline
        .mark_attendance(&request(&token, &image), w.clock.now());
    assert!(success.is_ok());
}
