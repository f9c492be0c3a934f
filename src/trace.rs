//! Offline replay of recorded volume traces.
//!
//! A trace is one reading per line, in either of two shapes:
//!
//! ```text
//! # t_ms volume
//! 0    30
//! 400  5
//! {"t_ms": 1000, "volume": 25.0}
//! ```
//!
//! Blank lines and `#` comments are skipped. Timestamps are milliseconds from the start of the
//! recording and must not go backwards.
//!
//! Replay runs a fresh state machine in virtual time. Silence checks fire at their own
//! deadlines (between samples) and re-check against the most recent reading, which is the
//! best available answer to "what is the volume right now" for a recorded signal.

use std::io::BufRead;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::VadEvents;
use crate::opts::VadOptions;
use crate::vad::VadStateMachine;
use crate::{Error, Result};

/// One recorded reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    /// Milliseconds since the start of the trace.
    pub t_ms: u64,
    /// Volume on the 0..255 scale.
    pub volume: f32,
}

/// Parse a trace from any buffered reader.
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceSample>> {
    let mut samples: Vec<TraceSample> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let text = line.trim();

        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let sample = parse_line(text)
            .map_err(|e| Error::msg(format!("trace line {line_no}: {e}")))?;

        if let Some(prev) = samples.last().filter(|prev| sample.t_ms < prev.t_ms) {
            return Err(Error::msg(format!(
                "trace line {line_no}: timestamp {} ms goes backwards (previous {} ms)",
                sample.t_ms, prev.t_ms
            )));
        }

        samples.push(sample);
    }

    Ok(samples)
}

fn parse_line(text: &str) -> std::result::Result<TraceSample, String> {
    if text.starts_with('{') {
        return serde_json::from_str(text).map_err(|e| e.to_string());
    }

    let mut fields = text.split_whitespace();
    let (Some(t), Some(v), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(format!("expected `t_ms volume`, got {text:?}"));
    };

    let t_ms = t
        .parse::<u64>()
        .map_err(|e| format!("bad timestamp {t:?}: {e}"))?;
    let volume = v
        .parse::<f32>()
        .map_err(|e| format!("bad volume {v:?}: {e}"))?;

    Ok(TraceSample { t_ms, volume })
}

/// Replay `samples` through a fresh detector and report events to `events`.
///
/// After the last sample, any silence check scheduled during the trace still fires (at its
/// deadline, against the last reading). A trace ending in silence therefore ends its segment
/// only if that segment was at least `min_speech_duration` long when the silence began;
/// a shorter trailing segment is left open and gets no `SpeechEnd`.
/// Returns the events sink.
pub fn replay<E: VadEvents>(samples: &[TraceSample], opts: VadOptions, events: E) -> E {
    let origin = Instant::now();
    let at = |ms: u64| origin + Duration::from_millis(ms);

    let mut vad = VadStateMachine::new(opts, events);
    vad.start();

    for sample in samples {
        let now = at(sample.t_ms);
        let last = vad.current_volume();
        vad.fire_due(now, || last);
        vad.observe(sample.volume, now);
    }

    if let Some(deadline) = vad.scheduler().next_deadline() {
        let last = vad.current_volume();
        vad.fire_due(deadline, || last);
    }

    debug!(samples = samples.len(), "trace replay finished");
    vad.stop();
    let (events, _) = vad.into_parts();
    events
}
