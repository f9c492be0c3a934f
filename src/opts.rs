use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Default volume floor (0..255 scale) at or below which a reading counts as silence.
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 20.0;

/// Default seconds of silence before an end-of-speech decision is re-checked.
pub const DEFAULT_SILENCE_DURATION: f64 = 1.5;

/// Default minimum segment length (seconds) before end-of-speech is considered at all.
pub const DEFAULT_MIN_SPEECH_DURATION: f64 = 0.3;

/// Sensitivity knobs for the detector.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI maps user input (flags, a JSON config file) into this type so that
/// other frontends can construct options programmatically.
///
/// Values are not validated: a negative duration or a threshold outside 0..255 is stored as-is
/// and simply makes the detector more or less eager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadOptions {
    /// Volume floor; readings strictly above it count as speech.
    pub silence_threshold: f32,

    /// Seconds to wait after silence is noticed before re-checking and ending the segment.
    pub silence_duration: f64,

    /// Minimum seconds since the segment started before an end check is scheduled.
    pub min_speech_duration: f64,
}

impl Default for VadOptions {
    fn default() -> Self {
        Self {
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            silence_duration: DEFAULT_SILENCE_DURATION,
            min_speech_duration: DEFAULT_MIN_SPEECH_DURATION,
        }
    }
}

/// A partial override of [`VadOptions`]; `None` fields leave the current value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadOptionsPatch {
    pub silence_threshold: Option<f32>,
    pub silence_duration: Option<f64>,
    pub min_speech_duration: Option<f64>,
}

impl VadOptions {
    /// Overwrite the fields present in `patch`.
    pub fn apply(&mut self, patch: &VadOptionsPatch) {
        if let Some(threshold) = patch.silence_threshold {
            self.silence_threshold = threshold;
        }
        if let Some(duration) = patch.silence_duration {
            self.silence_duration = duration;
        }
        if let Some(min_speech) = patch.min_speech_duration {
            self.min_speech_duration = min_speech;
        }
    }

    /// Defaults with `patch` applied on top.
    pub fn with_patch(patch: &VadOptionsPatch) -> Self {
        let mut opts = Self::default();
        opts.apply(patch);
        opts
    }

    /// Parse options from a JSON object. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// `silence_duration` as a timer delay.
    ///
    /// Negative or NaN values collapse to zero; infinite or otherwise unrepresentable values
    /// saturate to [`Duration::MAX`], i.e. a check that never comes due.
    pub fn silence_delay(&self) -> Duration {
        seconds_to_duration(self.silence_duration)
    }

    /// `min_speech_duration` as a [`Duration`], with the same saturation as
    /// [`silence_delay`](Self::silence_delay).
    pub fn min_speech(&self) -> Duration {
        seconds_to_duration(self.min_speech_duration)
    }
}

fn seconds_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
