//! Volume readings on the detector's 0..255 scale.
//!
//! The detector does not care how volume is computed; it only needs one number per tick.
//! These helpers cover the two common producers:
//! - a byte frequency spectrum (what a browser-style analyser node hands out), and
//! - raw PCM samples.

/// Number of frequency bins produced by a 256-point FFT.
pub const DEFAULT_BIN_COUNT: usize = 128;

/// A per-tick volume reading.
///
/// Implementations typically read the latest analysis window from an audio stream. Calling
/// `volume` twice in a row may return different values; that is what lets a deferred silence
/// check look at the signal *now* rather than at scheduling time.
pub trait VolumeSource {
    fn volume(&mut self) -> f32;
}

impl<F: FnMut() -> f32> VolumeSource for F {
    fn volume(&mut self) -> f32 {
        self()
    }
}

/// Mean magnitude of a byte frequency spectrum. Empty input reads as silence.
pub fn mean_level(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }

    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / bins.len() as f32
}

/// RMS of PCM samples in [-1.0, 1.0], mapped linearly onto 0..255.
///
/// Full-scale RMS (1.0) maps to 255; anything louder saturates.
pub fn pcm_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    (rms * 255.0).clamp(0.0, 255.0)
}

/// Adapts a spectrum reader into a [`VolumeSource`].
///
/// `read` fills the provided bin buffer with the latest byte spectrum (like
/// `AnalyserNode.getByteFrequencyData`), and each reading is reduced with [`mean_level`].
pub struct SpectrumVolume<R> {
    read: R,
    bins: Vec<u8>,
}

impl<R: FnMut(&mut [u8])> SpectrumVolume<R> {
    pub fn new(bin_count: usize, read: R) -> Self {
        Self {
            read,
            bins: vec![0; bin_count],
        }
    }
}

impl<R: FnMut(&mut [u8])> VolumeSource for SpectrumVolume<R> {
    fn volume(&mut self) -> f32 {
        (self.read)(&mut self.bins);
        mean_level(&self.bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_level_averages_bins() {
        assert_eq!(mean_level(&[0, 10, 20, 30]), 15.0);
        assert_eq!(mean_level(&[255; DEFAULT_BIN_COUNT]), 255.0);
        assert_eq!(mean_level(&[]), 0.0);
    }

    #[test]
    fn pcm_level_maps_rms_to_byte_scale() {
        assert_eq!(pcm_level(&[0.0; 64]), 0.0);
        assert_eq!(pcm_level(&[1.0, -1.0, 1.0, -1.0]), 255.0);
        assert_eq!(pcm_level(&[2.0; 4]), 255.0);
        assert!((pcm_level(&[0.5; 8]) - 127.5).abs() < 1e-4);
    }

    #[test]
    fn spectrum_volume_rereads_on_every_call() {
        let mut level = 0u8;
        let mut source = SpectrumVolume::new(DEFAULT_BIN_COUNT, move |bins: &mut [u8]| {
            level = level.saturating_add(10);
            bins.fill(level);
        });

        assert_eq!(source.volume(), 10.0);
        assert_eq!(source.volume(), 20.0);
    }

    #[test]
    fn closures_are_volume_sources() {
        let mut readings = vec![3.0, 40.0].into_iter();
        let mut source = move || readings.next().unwrap_or(0.0);
        assert_eq!(VolumeSource::volume(&mut source), 3.0);
        assert_eq!(VolumeSource::volume(&mut source), 40.0);
        assert_eq!(VolumeSource::volume(&mut source), 0.0);
    }
}
