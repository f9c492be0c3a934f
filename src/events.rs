//! Callback surface of the detector.
//!
//! The state machine never knows who is listening. It reports through [`VadEvents`], which
//! callers implement directly, build from closures via [`Callbacks`], or record with
//! [`EventLog`].

use serde::Serialize;

use crate::error::AcquisitionError;

/// Receiver for detector events.
///
/// Every hook defaults to a no-op so implementors only override what they care about.
pub trait VadEvents {
    /// A new speech segment began. Fired once per segment.
    fn on_speech_start(&mut self) {}

    /// The current segment ended after a confirmed silence check.
    ///
    /// `duration_secs` spans from the segment start to the moment the check fired.
    fn on_speech_end(&mut self, duration_secs: f64) {
        let _ = duration_secs;
    }

    /// Fired for every observed sample, speaking or not.
    fn on_volume_change(&mut self, volume: f32) {
        let _ = volume;
    }

    /// Capture acquisition failed; the session did not start.
    fn on_error(&mut self, err: &AcquisitionError) {
        let _ = err;
    }
}

impl<T: VadEvents + ?Sized> VadEvents for &mut T {
    fn on_speech_start(&mut self) {
        (**self).on_speech_start();
    }

    fn on_speech_end(&mut self, duration_secs: f64) {
        (**self).on_speech_end(duration_secs);
    }

    fn on_volume_change(&mut self, volume: f32) {
        (**self).on_volume_change(volume);
    }

    fn on_error(&mut self, err: &AcquisitionError) {
        (**self).on_error(err);
    }
}

impl<T: VadEvents + ?Sized> VadEvents for Box<T> {
    fn on_speech_start(&mut self) {
        (**self).on_speech_start();
    }

    fn on_speech_end(&mut self, duration_secs: f64) {
        (**self).on_speech_end(duration_secs);
    }

    fn on_volume_change(&mut self, volume: f32) {
        (**self).on_volume_change(volume);
    }

    fn on_error(&mut self, err: &AcquisitionError) {
        (**self).on_error(err);
    }
}

/// Closure-backed [`VadEvents`].
///
/// Unset hooks do nothing, except `on_error`, which falls back to an error log so a failed
/// acquisition is never silently swallowed.
#[derive(Default)]
pub struct Callbacks {
    speech_start: Option<Box<dyn FnMut()>>,
    speech_end: Option<Box<dyn FnMut(f64)>>,
    volume_change: Option<Box<dyn FnMut(f32)>>,
    error: Option<Box<dyn FnMut(&AcquisitionError)>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_speech_start(mut self, f: impl FnMut() + 'static) -> Self {
        self.speech_start = Some(Box::new(f));
        self
    }

    pub fn on_speech_end(mut self, f: impl FnMut(f64) + 'static) -> Self {
        self.speech_end = Some(Box::new(f));
        self
    }

    pub fn on_volume_change(mut self, f: impl FnMut(f32) + 'static) -> Self {
        self.volume_change = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&AcquisitionError) + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl VadEvents for Callbacks {
    fn on_speech_start(&mut self) {
        if let Some(f) = self.speech_start.as_mut() {
            f();
        }
    }

    fn on_speech_end(&mut self, duration_secs: f64) {
        if let Some(f) = self.speech_end.as_mut() {
            f(duration_secs);
        }
    }

    fn on_volume_change(&mut self, volume: f32) {
        if let Some(f) = self.volume_change.as_mut() {
            f(volume);
        }
    }

    fn on_error(&mut self, err: &AcquisitionError) {
        match self.error.as_mut() {
            Some(f) => f(err),
            None => tracing::error!(error = %err, "voice activity detector failed to start"),
        }
    }
}

/// A single detector event, in a form that can be logged or serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VadEvent {
    SpeechStart,
    SpeechEnd { duration_secs: f64 },
    VolumeChange { volume: f32 },
    Error { message: String },
}

/// [`VadEvents`] implementation that records everything it sees, in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<VadEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[VadEvent] {
        &self.events
    }

    /// Take the recorded events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<VadEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn speech_starts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, VadEvent::SpeechStart))
            .count()
    }

    /// Durations of every `SpeechEnd`, in order.
    pub fn speech_ends(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VadEvent::SpeechEnd { duration_secs } => Some(*duration_secs),
                _ => None,
            })
            .collect()
    }

    /// Every volume reported via `VolumeChange`, in order.
    pub fn volumes(&self) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VadEvent::VolumeChange { volume } => Some(*volume),
                _ => None,
            })
            .collect()
    }

    /// Events other than `VolumeChange`.
    pub fn transitions(&self) -> Vec<&VadEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, VadEvent::VolumeChange { .. }))
            .collect()
    }
}

impl VadEvents for EventLog {
    fn on_speech_start(&mut self) {
        self.events.push(VadEvent::SpeechStart);
    }

    fn on_speech_end(&mut self, duration_secs: f64) {
        self.events.push(VadEvent::SpeechEnd { duration_secs });
    }

    fn on_volume_change(&mut self, volume: f32) {
        self.events.push(VadEvent::VolumeChange { volume });
    }

    fn on_error(&mut self, err: &AcquisitionError) {
        self.events.push(VadEvent::Error {
            message: err.to_string(),
        });
    }
}
