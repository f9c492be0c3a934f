//! The listening session: capture + sampling loop + state machine.
//!
//! [`Detector`] is what most callers want. It acquires the capture stream on `start()`, reads
//! one volume per tick from it, runs due silence checks against a fresh reading, and gives the
//! stream back on `stop()`.
//!
//! Ticks come from any iterator of timestamps, so tests can drive the loop with synthetic
//! time while [`FrameTicker`] paces a real one.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::Result;
use crate::capture::AudioCapture;
use crate::events::VadEvents;
use crate::opts::{VadOptions, VadOptionsPatch};
use crate::vad::VadStateMachine;
use crate::volume::VolumeSource;

/// Default sampling cadence, roughly one display frame.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// A voice activity detector bound to an audio capture provider.
pub struct Detector<C: AudioCapture, E: VadEvents> {
    capture: C,
    stream: Option<C::Stream>,
    vad: VadStateMachine<E>,
}

impl<C: AudioCapture, E: VadEvents> Detector<C, E> {
    pub fn new(capture: C, opts: VadOptions, events: E) -> Self {
        Self {
            capture,
            stream: None,
            vad: VadStateMachine::new(opts, events),
        }
    }

    /// Acquire the capture stream and begin listening.
    ///
    /// On failure the error is reported once through `on_error`, the detector stays stopped,
    /// and the same error is returned so the caller can decide whether to retry.
    ///
    /// Starting an already running detector restarts it: the old stream is released, a new one
    /// acquired, and the session state reset.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            debug!("detector restarted while listening");
            self.stop();
        }

        let stream = match self.capture.acquire() {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "failed to acquire audio capture");
                self.vad.events_mut().on_error(&err);
                return Err(err.into());
            }
        };

        self.stream = Some(stream);
        self.vad.start();
        info!("detector started");
        Ok(())
    }

    /// Stop listening, drop any pending silence check and release the stream.
    ///
    /// Safe to call when not started.
    pub fn stop(&mut self) {
        self.vad.stop();

        if let Some(stream) = self.stream.take() {
            self.capture.release(stream);
            info!("detector stopped");
        }
    }

    /// Run one sampling tick at `now`.
    ///
    /// Silence checks that fell due since the previous tick run first, each against a fresh
    /// reading, then the tick's own reading is observed. Does nothing while stopped.
    pub fn tick(&mut self, now: Instant) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        self.vad.fire_due(now, || stream.volume());
        let volume = stream.volume();
        self.vad.observe(volume, now);
    }

    /// Drive [`tick`](Self::tick) from a tick source until it runs dry or the detector stops.
    pub fn run<I>(&mut self, ticks: I)
    where
        I: IntoIterator<Item = Instant>,
    {
        for now in ticks {
            if !self.is_listening() {
                break;
            }
            self.tick(now);
        }
    }

    /// A fresh reading straight from the stream, or `0.0` when stopped.
    pub fn current_volume(&mut self) -> f32 {
        match self.stream.as_mut() {
            Some(stream) => stream.volume(),
            None => 0.0,
        }
    }

    pub fn configure(&mut self, patch: &VadOptionsPatch) {
        self.vad.configure(patch);
    }

    pub fn set_sensitivity(&mut self, threshold: f32, silence_duration: f64) {
        self.vad.set_sensitivity(threshold, silence_duration);
    }

    pub fn is_listening(&self) -> bool {
        self.stream.is_some() && self.vad.is_listening()
    }

    pub fn is_speaking(&self) -> bool {
        self.vad.is_speaking()
    }

    /// The underlying state machine.
    pub fn vad(&self) -> &VadStateMachine<E> {
        &self.vad
    }

    pub fn events(&self) -> &E {
        self.vad.events()
    }

    pub fn events_mut(&mut self) -> &mut E {
        self.vad.events_mut()
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }
}

impl<C: AudioCapture, E: VadEvents> Drop for Detector<C, E> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Real-time tick source: yields `Instant::now()` once per frame interval, sleeping between
/// frames. Never ends on its own; stop the detector or bound it with `take`/`take_while`.
#[derive(Debug, Clone)]
pub struct FrameTicker {
    interval: Duration,
    next: Option<Instant>,
}

impl FrameTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }
}

impl Default for FrameTicker {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl Iterator for FrameTicker {
    type Item = Instant;

    fn next(&mut self) -> Option<Instant> {
        let now = Instant::now();
        let due = *self.next.get_or_insert(now);
        if due > now {
            thread::sleep(due - now);
        }

        let fired = Instant::now();
        // Skip missed frames instead of bursting to catch up.
        self.next = Some((due + self.interval).max(fired));
        Some(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ticker_paces_ticks() {
        let interval = Duration::from_millis(5);
        let ticks: Vec<Instant> = FrameTicker::new(interval).take(3).collect();

        assert_eq!(ticks.len(), 3);
        assert!(ticks[2].duration_since(ticks[0]) >= interval * 2);
    }

    #[test]
    fn default_cadence_is_about_sixty_hertz() {
        let per_second = Duration::from_secs(1).as_secs_f64() / DEFAULT_FRAME_INTERVAL.as_secs_f64();
        assert!((per_second - 60.0).abs() < 0.1);
    }
}
