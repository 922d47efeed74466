//! Spectrum frame computation (spec §4.C FFT path).
//!
//! The teacher offloads its FFT to `vkfft` (GPU); that path is a Non-goal
//! here; a plain `rustfft` planner on the CPU replaces it, the same crate
//! the workspace already carries for waterfall math in the reference.

use num_complex::Complex32;
use rustfft::FftPlanner;
use std::sync::Arc;

pub const FFT_SIZE: usize = 2048;

pub struct SpectrumFrame {
    pub magnitudes: Vec<f32>,
    pub min_db: f32,
    pub max_db: f32,
    pub signal_db: f32,
}

pub struct SpectrumAnalyzer {
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    spec_min: f32,
    spec_max: f32,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(FFT_SIZE),
            window: super::window::blackman_window(FFT_SIZE),
            spec_min: -80.0,
            spec_max: -20.0,
        }
    }

    /// Computes one spectrum frame from the most recent samples. `iq` may be
    /// shorter than [`FFT_SIZE`], in which case it is zero-padded; only the
    /// last `FFT_SIZE` samples are used when longer.
    pub fn compute(&mut self, iq: &[Complex32]) -> SpectrumFrame {
        let n = FFT_SIZE;
        let mut chunk = vec![Complex32::new(0.0, 0.0); n];
        let take = iq.len().min(n);
        let src_start = iq.len() - take;
        for i in 0..take {
            chunk[i] = iq[src_start + i] * self.window[i];
        }

        self.fft.process(&mut chunk);
        fftshift(&mut chunk);

        let mut mag_db = vec![0.0f32; n];
        for (dst, c) in mag_db.iter_mut().zip(chunk.iter()) {
            *dst = 20.0 * ((c.re * c.re + c.im * c.im).sqrt() + 1e-12).log10();
        }

        let dbfs_offset = 20.0 * (n as f32).log10();
        let lo = n * 45 / 100;
        let hi = n * 55 / 100;
        let center = &mag_db[lo..hi];
        let signal_db = if center.is_empty() {
            -100.0
        } else {
            center.iter().cloned().fold(f32::MIN, f32::max) - dbfs_offset
        };

        let cur_min = percentile(&mag_db, 2.0);
        let cur_max = percentile(&mag_db, 99.8) + 10.0;
        self.spec_min +=
            if cur_min < self.spec_min { 0.3 } else { 0.05 } * (cur_min - self.spec_min);
        self.spec_max +=
            if cur_max > self.spec_max { 0.3 } else { 0.05 } * (cur_max - self.spec_max);
        if self.spec_max - self.spec_min < 20.0 {
            let mid = (self.spec_max + self.spec_min) / 2.0;
            self.spec_min = mid - 10.0;
            self.spec_max = mid + 10.0;
        }

        let span = self.spec_max - self.spec_min;
        let magnitudes: Vec<f32> = mag_db
            .iter()
            .map(|db| ((db - self.spec_min) / span).clamp(0.0, 1.0))
            .collect();

        SpectrumFrame {
            magnitudes,
            min_db: round1(self.spec_min),
            max_db: round1(self.spec_max),
            signal_db: round1(signal_db),
        }
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn fftshift(data: &mut [Complex32]) {
    let n = data.len();
    data.rotate_left(n / 2);
}

fn percentile(sorted_src: &[f32], pct: f32) -> f32 {
    let mut v = sorted_src.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((pct / 100.0) * (v.len() as f32 - 1.0)).round() as usize;
    v[idx.min(v.len() - 1)]
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Maps a dBFS reading to an S-meter label (spec §4.C).
pub fn dbfs_to_s_units(dbfs: f32) -> &'static str {
    const THRESHOLDS: &[(f32, &str)] = &[
        (-10.0, "S9+60"),
        (-16.0, "S9+40"),
        (-22.0, "S9+20"),
        (-28.0, "S9"),
        (-34.0, "S8"),
        (-40.0, "S7"),
        (-46.0, "S6"),
        (-52.0, "S5"),
        (-58.0, "S4"),
        (-64.0, "S3"),
        (-70.0, "S2"),
        (-76.0, "S1"),
    ];
    for (thresh, label) in THRESHOLDS {
        if dbfs > *thresh {
            return label;
        }
    }
    "S0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_input_peaks_at_center_bin() {
        let mut analyzer = SpectrumAnalyzer::new();
        let iq = vec![Complex32::new(1.0, 0.0); FFT_SIZE];
        let frame = analyzer.compute(&iq);
        assert_eq!(frame.magnitudes.len(), FFT_SIZE);
        let peak_idx = frame
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!((FFT_SIZE / 2 - 4..=FFT_SIZE / 2 + 4).contains(&peak_idx));
        assert!(frame.magnitudes.iter().all(|&m| (0.0..=1.0).contains(&m)));
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new();
        let iq = vec![Complex32::new(0.1, 0.0); 10];
        let frame = analyzer.compute(&iq);
        assert_eq!(frame.magnitudes.len(), FFT_SIZE);
    }

    #[test]
    fn s_units_thresholds_map_as_expected() {
        assert_eq!(dbfs_to_s_units(-5.0), "S9+60");
        assert_eq!(dbfs_to_s_units(-30.0), "S8");
        assert_eq!(dbfs_to_s_units(-90.0), "S0");
    }
}
