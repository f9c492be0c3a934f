//! `voxgate` — a small real-time voice activity detector.
//!
//! Feed it one volume reading per tick and it tells you when someone starts and stops
//! talking. It is meant as a cheap front-end trigger (start/stop recording around an
//! utterance) rather than a speech model.
//!
//! This crate provides:
//! - The detection state machine ([`VadStateMachine`]) with debounced end-of-speech
//! - A session driver ([`Detector`]) over pluggable audio capture and tick sources
//! - Volume helpers for byte spectra and PCM
//! - Offline replay of recorded volume traces

// High-level API (most consumers should start here).
pub mod detector;
pub mod opts;

// Detection core and its timer seam.
pub mod scheduler;
pub mod vad;

// Callback surface.
pub mod events;

// Collaborator seams: capture devices and volume analysis.
pub mod capture;
pub mod volume;

// Recorded-trace replay.
pub mod trace;

pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use capture::AudioCapture;
pub use detector::{Detector, FrameTicker};
pub use error::{AcquisitionError, Error, Result};
pub use events::{Callbacks, EventLog, VadEvent, VadEvents};
pub use opts::{VadOptions, VadOptionsPatch};
pub use scheduler::{CancelToken, PendingCheck, Scheduler, TimerQueue};
pub use vad::{Confirmation, VadStateMachine};
pub use volume::VolumeSource;

#[cfg(feature = "logging")]
pub use logging::init as init_logging;
