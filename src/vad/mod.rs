//! Voice Activity Detection (VAD) core.
//!
//! The detector classifies each tick as speech or silence by comparing a 0..255 volume
//! reading with a threshold. Speech starts immediately; it only ends after a deferred,
//! re-validated silence check, so brief dips between words do not split a segment.

mod machine;

pub use machine::{Confirmation, VadStateMachine};
