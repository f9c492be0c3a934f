use std::time::Instant;

use tracing::{debug, info, trace};

use crate::events::VadEvents;
use crate::opts::{VadOptions, VadOptionsPatch};
use crate::scheduler::{CancelToken, PendingCheck, Scheduler, SegmentId, SessionId, TimerQueue};

/// Outcome of handing a fired [`PendingCheck`] back to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confirmation {
    /// The check no longer refers to the live session/segment; nothing happened.
    Stale,
    /// The fresh reading was above the threshold; the segment keeps going.
    SpeechContinues,
    /// Silence held; the segment ended and `on_speech_end` fired.
    SpeechEnded { duration_secs: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    token: CancelToken,
    check: PendingCheck,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Silent,
    Speaking {
        segment: SegmentId,
        started_at: Instant,
        // First quiet tick of the current quiet run; cleared by any loud tick.
        quiet_since: Option<Instant>,
        // At most one outstanding silence check per segment.
        pending: Option<Pending>,
    },
}

#[derive(Debug)]
struct Session {
    id: SessionId,
    phase: Phase,
    last_speech: Option<Instant>,
    next_segment: u64,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            phase: Phase::Silent,
            last_speech: None,
            next_segment: 0,
        }
    }

    fn pending(&self) -> Option<Pending> {
        match self.phase {
            Phase::Speaking { pending, .. } => pending,
            Phase::Silent => None,
        }
    }
}

/// Turns a stream of per-tick volume readings into speech start/end events.
///
/// The machine is purely reactive:
/// - [`observe`](Self::observe) is called once per sampling tick with the reading and the
///   tick's timestamp.
/// - When silence follows a long-enough segment, a [`PendingCheck`] is scheduled on `S`.
/// - The driver hands fired checks back through [`confirm`](Self::confirm) together with a
///   freshly sampled volume, and only then can the segment end.
///
/// Each instance owns its own session state, events sink and scheduler; instances never
/// share anything.
///
/// Calling [`start`](Self::start) while already listening restarts cleanly: any pending
/// check is cancelled and the session state is reset.
pub struct VadStateMachine<E, S = TimerQueue> {
    opts: VadOptions,
    events: E,
    scheduler: S,
    session: Option<Session>,
    sessions_started: u64,
    last_volume: f32,
}

impl<E: VadEvents> VadStateMachine<E, TimerQueue> {
    /// Create a stopped machine using the built-in virtual-time [`TimerQueue`].
    pub fn new(opts: VadOptions, events: E) -> Self {
        Self::with_scheduler(opts, events, TimerQueue::new())
    }

    /// Deliver every timer due at `now`, each at its own deadline.
    ///
    /// `fresh_volume` is sampled once per firing so each re-check sees the signal as it is
    /// when the check runs, not when it was scheduled. Returns how many timers fired.
    pub fn fire_due(&mut self, now: Instant, mut fresh_volume: impl FnMut() -> f32) -> usize {
        let mut fired = 0;
        while let Some((deadline, _, check)) = self.scheduler.pop_due(now) {
            let volume = fresh_volume();
            self.confirm(check, deadline, volume);
            fired += 1;
        }
        fired
    }
}

impl<E: VadEvents, S: Scheduler> VadStateMachine<E, S> {
    /// Create a stopped machine on top of an arbitrary scheduler.
    pub fn with_scheduler(opts: VadOptions, events: E, scheduler: S) -> Self {
        Self {
            opts,
            events,
            scheduler,
            session: None,
            sessions_started: 0,
            last_volume: 0.0,
        }
    }

    /// Override some or all of the options.
    ///
    /// An already scheduled check keeps its original delay; the threshold it re-checks
    /// against is whatever is configured when it fires.
    pub fn configure(&mut self, patch: &VadOptionsPatch) {
        self.opts.apply(patch);
        debug!(
            silence_threshold = self.opts.silence_threshold,
            silence_duration = self.opts.silence_duration,
            min_speech_duration = self.opts.min_speech_duration,
            "vad reconfigured"
        );
    }

    /// Adjust the threshold and silence duration in place.
    pub fn set_sensitivity(&mut self, threshold: f32, silence_duration: f64) {
        self.opts.silence_threshold = threshold;
        self.opts.silence_duration = silence_duration;
        info!(threshold, silence_duration, "vad sensitivity adjusted");
    }

    pub fn options(&self) -> &VadOptions {
        &self.opts
    }

    /// Begin a fresh listening session.
    pub fn start(&mut self) {
        if self.session.is_some() {
            debug!("vad restarted while listening; resetting session");
            self.end_session();
        }

        self.sessions_started += 1;
        self.session = Some(Session::new(SessionId(self.sessions_started)));
        self.last_volume = 0.0;
        info!(session = self.sessions_started, "vad listening");
    }

    /// Stop listening and cancel any pending check. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if self.session.is_none() {
            return;
        }

        self.end_session();
        info!("vad stopped");
    }

    fn end_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(pending) = session.pending() {
            self.scheduler.cancel(pending.token);
            debug!(segment = pending.check.segment.0, "cancelled pending silence check");
        }
    }

    /// Feed one sampling tick. Ignored while stopped.
    pub fn observe(&mut self, volume: f32, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            trace!(volume, "observe while stopped; ignoring");
            return;
        };

        self.last_volume = volume;
        self.events.on_volume_change(volume);

        if volume > self.opts.silence_threshold {
            match session.phase {
                Phase::Silent => {
                    let segment = SegmentId(session.next_segment);
                    session.next_segment += 1;
                    session.phase = Phase::Speaking {
                        segment,
                        started_at: now,
                        quiet_since: None,
                        pending: None,
                    };
                    info!(segment = segment.0, volume, "speech started");
                    self.events.on_speech_start();
                }
                Phase::Speaking {
                    ref mut quiet_since,
                    ..
                } => *quiet_since = None,
            }
            session.last_speech = Some(now);
            return;
        }

        let session_id = session.id;
        let Phase::Speaking {
            segment,
            started_at,
            quiet_since,
            pending,
        } = &mut session.phase
        else {
            return;
        };

        let first_quiet = *quiet_since.get_or_insert(now);

        if pending.is_some() {
            return;
        }

        // The segment qualifies only if it was long enough when this quiet run began. A segment
        // that went quiet too early stays open until a later loud run re-qualifies it.
        if first_quiet.saturating_duration_since(*started_at) < self.opts.min_speech() {
            trace!(segment = segment.0, "segment went quiet before min speech; not checking");
            return;
        }

        let check = PendingCheck {
            session: session_id,
            segment: *segment,
        };
        let delay = self.opts.silence_delay();
        let token = self.scheduler.schedule_after(now, delay, check);
        *pending = Some(Pending { token, check });
        debug!(
            segment = segment.0,
            delay_ms = delay.as_millis() as u64,
            "silence noticed; scheduled confirmation"
        );
    }

    /// Run a fired silence check at time `now` with a freshly sampled volume.
    ///
    /// Checks for a stopped session, a restarted session, an ended segment or a superseded
    /// timer are stale and do nothing.
    pub fn confirm(&mut self, check: PendingCheck, now: Instant, fresh_volume: f32) -> Confirmation {
        let Some(session) = self.session.as_mut() else {
            debug!(segment = check.segment.0, "confirmation fired after stop; ignoring");
            return Confirmation::Stale;
        };

        if session.id != check.session {
            debug!(segment = check.segment.0, "confirmation from a previous session; ignoring");
            return Confirmation::Stale;
        }

        let Phase::Speaking {
            segment,
            started_at,
            pending,
            ..
        } = &mut session.phase
        else {
            debug!(segment = check.segment.0, "confirmation fired while silent; ignoring");
            return Confirmation::Stale;
        };

        if *segment != check.segment || pending.map(|p| p.check) != Some(check) {
            debug!(segment = check.segment.0, "confirmation for a superseded segment; ignoring");
            return Confirmation::Stale;
        }

        *pending = None;
        self.last_volume = fresh_volume;

        if fresh_volume > self.opts.silence_threshold {
            debug!(
                segment = segment.0,
                volume = fresh_volume,
                "volume recovered; segment continues"
            );
            return Confirmation::SpeechContinues;
        }

        let duration_secs = now.saturating_duration_since(*started_at).as_secs_f64();
        info!(segment = segment.0, duration_secs, "speech ended");
        session.phase = Phase::Silent;
        self.events.on_speech_end(duration_secs);
        Confirmation::SpeechEnded { duration_secs }
    }

    /// The most recent volume reading, from either `observe` or a confirmation re-check.
    pub fn current_volume(&self) -> f32 {
        self.last_volume
    }

    pub fn is_listening(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        matches!(
            self.session.as_ref().map(|s| s.phase),
            Some(Phase::Speaking { .. })
        )
    }

    /// When the current segment began; `None` unless speaking.
    pub fn speech_start_time(&self) -> Option<Instant> {
        match self.session.as_ref()?.phase {
            Phase::Speaking { started_at, .. } => Some(started_at),
            Phase::Silent => None,
        }
    }

    /// Timestamp of the most recent above-threshold reading in this session.
    pub fn last_speech_time(&self) -> Option<Instant> {
        self.session.as_ref()?.last_speech
    }

    pub fn has_pending_confirmation(&self) -> bool {
        self.session
            .as_ref()
            .and_then(Session::pending)
            .is_some()
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Tear the machine apart, returning its events sink and scheduler.
    pub fn into_parts(self) -> (E, S) {
        (self.events, self.scheduler)
    }
}
