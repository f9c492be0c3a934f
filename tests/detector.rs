use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use voxgate::capture::AudioCapture;
use voxgate::detector::Detector;
use voxgate::error::{AcquisitionError, Error};
use voxgate::events::{Callbacks, EventLog, VadEvent};
use voxgate::opts::VadOptions;
use voxgate::volume::VolumeSource;

/// Shared "microphone" whose level the test moves around.
#[derive(Clone, Default)]
struct Level(Rc<RefCell<f32>>);

impl Level {
    fn set(&self, v: f32) {
        *self.0.borrow_mut() = v;
    }
}

struct FakeStream {
    level: Level,
    reads: Rc<RefCell<usize>>,
}

impl VolumeSource for FakeStream {
    fn volume(&mut self) -> f32 {
        *self.reads.borrow_mut() += 1;
        *self.level.0.borrow()
    }
}

#[derive(Default)]
struct FakeMic {
    level: Level,
    reads: Rc<RefCell<usize>>,
    failures: VecDeque<AcquisitionError>,
    acquired: usize,
    released: usize,
}

impl AudioCapture for FakeMic {
    type Stream = FakeStream;

    fn acquire(&mut self) -> Result<FakeStream, AcquisitionError> {
        if let Some(err) = self.failures.pop_front() {
            return Err(err);
        }
        self.acquired += 1;
        Ok(FakeStream {
            level: self.level.clone(),
            reads: Rc::clone(&self.reads),
        })
    }

    fn release(&mut self, _stream: FakeStream) {
        self.released += 1;
    }
}

fn ticks(t0: Instant, from_ms: u64, to_ms: u64) -> impl Iterator<Item = Instant> {
    (from_ms..to_ms)
        .step_by(16)
        .map(move |ms| t0 + Duration::from_millis(ms))
}

fn detector(mic: FakeMic) -> Detector<FakeMic, EventLog> {
    Detector::new(mic, VadOptions::default(), EventLog::new())
}

#[test]
fn speech_is_detected_and_confirmed_against_a_fresh_reading() -> anyhow::Result<()> {
    let mic = FakeMic::default();
    let level = mic.level.clone();
    let mut det = detector(mic);
    det.start()?;
    let t0 = Instant::now();

    level.set(80.0);
    det.run(ticks(t0, 0, 500));
    assert!(det.is_speaking());

    level.set(3.0);
    det.run(ticks(t0, 500, 2_100));

    assert!(!det.is_speaking());
    let ends = det.events().speech_ends();
    assert_eq!(ends.len(), 1);
    // Silence noticed on the 0.5 s tick, confirmed 1.5 s later.
    assert!((ends[0] - 2.0).abs() < 1e-6, "{ends:?}");
    Ok(())
}

#[test]
fn voice_returning_before_the_deadline_keeps_the_segment() -> anyhow::Result<()> {
    let mic = FakeMic::default();
    let level = mic.level.clone();
    let mut det = detector(mic);
    det.start()?;
    let t0 = Instant::now();

    level.set(80.0);
    det.run(ticks(t0, 0, 500));
    level.set(3.0);
    det.run(ticks(t0, 500, 1_000));
    level.set(80.0);
    det.run(ticks(t0, 1_000, 3_000));

    assert!(det.is_speaking());
    assert!(det.events().speech_ends().is_empty());
    assert_eq!(det.events().speech_starts(), 1);
    Ok(())
}

#[test]
fn acquisition_failure_is_reported_once_and_session_stays_stopped() {
    let mut mic = FakeMic::default();
    mic.failures
        .push_back(AcquisitionError::PermissionDenied("NotAllowedError".into()));

    let mut det = detector(mic);
    let err = det.start().unwrap_err();

    assert!(matches!(
        err,
        Error::Acquisition(AcquisitionError::PermissionDenied(_))
    ));
    assert!(!det.is_listening());
    assert_eq!(
        det.events().events(),
        &[VadEvent::Error {
            message: "microphone permission denied: NotAllowedError".into()
        }]
    );

    // Ticks while stopped do nothing.
    det.run(ticks(Instant::now(), 0, 100));
    assert_eq!(det.events().events().len(), 1);
}

#[test]
fn caller_can_retry_after_a_failed_start() -> anyhow::Result<()> {
    let mut mic = FakeMic::default();
    mic.failures
        .push_back(AcquisitionError::DeviceUnavailable("busy".into()));
    let mut det = detector(mic);

    assert!(det.start().is_err());
    det.start()?;
    assert!(det.is_listening());
    assert_eq!(det.capture().acquired, 1);
    Ok(())
}

#[test]
fn stop_releases_the_stream_and_cancels_pending_checks() -> anyhow::Result<()> {
    let mic = FakeMic::default();
    let level = mic.level.clone();
    let mut det = detector(mic);
    det.start()?;
    let t0 = Instant::now();

    level.set(80.0);
    det.run(ticks(t0, 0, 500));
    level.set(3.0);
    det.tick(t0 + Duration::from_millis(512));
    assert!(det.vad().has_pending_confirmation());

    det.stop();
    assert_eq!(det.capture().released, 1);
    assert!(!det.is_listening());
    assert!(det.vad().scheduler().is_empty());

    let before = det.events().events().len();
    det.run(ticks(t0, 600, 5_000));
    det.tick(t0 + Duration::from_secs(10));
    assert_eq!(det.events().events().len(), before);
    assert!(det.events().speech_ends().is_empty());

    // Stopping again is a no-op.
    det.stop();
    assert_eq!(det.capture().released, 1);
    Ok(())
}

#[test]
fn restarting_a_running_detector_reacquires_and_resets() -> anyhow::Result<()> {
    let mic = FakeMic::default();
    let level = mic.level.clone();
    let mut det = detector(mic);
    det.start()?;
    let t0 = Instant::now();

    level.set(80.0);
    det.run(ticks(t0, 0, 100));
    assert!(det.is_speaking());

    det.start()?;
    assert_eq!(det.capture().acquired, 2);
    assert_eq!(det.capture().released, 1);
    assert!(det.is_listening());
    assert!(!det.is_speaking());

    // A fresh session reports a fresh start.
    det.run(ticks(t0, 200, 300));
    assert_eq!(det.events().speech_starts(), 2);
    Ok(())
}

#[test]
fn dropping_a_running_detector_releases_the_stream() -> anyhow::Result<()> {
    let released = Rc::new(RefCell::new(0));

    struct CountingMic(Rc<RefCell<usize>>);

    impl AudioCapture for CountingMic {
        type Stream = Box<dyn FnMut() -> f32>;

        fn acquire(&mut self) -> Result<Self::Stream, AcquisitionError> {
            Ok(Box::new(|| 0.0))
        }

        fn release(&mut self, _stream: Self::Stream) {
            *self.0.borrow_mut() += 1;
        }
    }

    {
        let mut det = Detector::new(
            CountingMic(Rc::clone(&released)),
            VadOptions::default(),
            Callbacks::new(),
        );
        det.start()?;
    }

    assert_eq!(*released.borrow(), 1);
    Ok(())
}

#[test]
fn callbacks_receive_every_tick_volume() -> anyhow::Result<()> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);

    let mic = FakeMic::default();
    let level = mic.level.clone();
    let mut det = Detector::new(
        mic,
        VadOptions::default(),
        Callbacks::new().on_volume_change(move |v| sink.borrow_mut().push(v)),
    );
    det.start()?;

    let t0 = Instant::now();
    for (i, v) in [1.0, 50.0, 7.5].into_iter().enumerate() {
        level.set(v);
        det.tick(t0 + Duration::from_millis(i as u64 * 16));
    }

    assert_eq!(*seen.borrow(), vec![1.0, 50.0, 7.5]);
    Ok(())
}

#[test]
fn confirmation_resamples_the_stream() -> anyhow::Result<()> {
    let mic = FakeMic::default();
    let level = mic.level.clone();
    let reads = Rc::clone(&mic.reads);
    let mut det = detector(mic);
    det.start()?;
    let t0 = Instant::now();

    level.set(80.0);
    det.tick(t0);
    level.set(3.0);
    det.tick(t0 + Duration::from_millis(400));
    assert_eq!(*reads.borrow(), 2);

    // One read for the due check, one for the tick itself.
    det.tick(t0 + Duration::from_millis(1_900));
    assert_eq!(*reads.borrow(), 4);
    assert_eq!(det.events().speech_ends().len(), 1);
    Ok(())
}
