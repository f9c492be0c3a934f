//! Audio capture seam.
//!
//! Opening a microphone is platform work the detector stays out of. A [`Detector`] only needs
//! to acquire a stream when a session starts, read volumes from it, and give it back when
//! the session stops.
//!
//! [`Detector`]: crate::detector::Detector

use crate::error::AcquisitionError;
use crate::volume::VolumeSource;

/// Provider of exclusive audio capture streams.
pub trait AudioCapture {
    /// The live stream. It doubles as the session's volume source.
    type Stream: VolumeSource;

    /// Open the input device. Fails when permission is denied or no device is usable.
    fn acquire(&mut self) -> Result<Self::Stream, AcquisitionError>;

    /// Stop and release a stream obtained from [`acquire`](Self::acquire).
    fn release(&mut self, stream: Self::Stream);
}
