//! Windowed-sinc FIR design and a stateful delay-line filter (spec §4.C).
//!
//! The teacher crate keeps stateful DSP primitives as small structs with
//! `process`/`reset` (`DcBlocker`, `Agc`); `FirFilter<T>` follows the same
//! shape, generic over `Complex32` (stage-1/stage-2 filters) and `f32`
//! (stage-4 audio decimation filter) since both stages persist a delay
//! line across chunk boundaries.

/// Windowed-sinc low-pass design. `cutoff_hz` and `sample_rate` share
/// units; `window` is a precomputed window of length `num_taps` (see
/// `dsp::window`).
pub fn design_lowpass(
    cutoff_hz: f32,
    sample_rate: f32,
    num_taps: usize,
    window: &[f32],
) -> Vec<f32> {
    assert_eq!(window.len(), num_taps);
    let fc = cutoff_hz / sample_rate;
    let m = (num_taps - 1) as f32;
    let mut taps = vec![0.0f32; num_taps];
    for (n, tap) in taps.iter_mut().enumerate() {
        let k = n as f32 - m / 2.0;
        let sinc = if k == 0.0 {
            2.0 * fc
        } else {
            (2.0 * std::f32::consts::PI * fc * k).sin() / (std::f32::consts::PI * k)
        };
        *tap = sinc * window[n];
    }
    let dc_gain: f32 = taps.iter().sum();
    if dc_gain.abs() > 1e-9 {
        for t in taps.iter_mut() {
            *t /= dc_gain;
        }
    }
    taps
}

/// A direct-form FIR filter with a persistent delay line, optionally
/// decimating its output.
pub struct FirFilter<T> {
    taps: Vec<f32>,
    history: Vec<T>,
}

impl<T> FirFilter<T>
where
    T: Copy + Default + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
{
    pub fn new(taps: Vec<f32>) -> Self {
        let history = vec![T::default(); taps.len().saturating_sub(1)];
        Self { taps, history }
    }

    pub fn reset(&mut self) {
        for h in self.history.iter_mut() {
            *h = T::default();
        }
    }

    pub fn num_taps(&self) -> usize {
        self.taps.len()
    }

    /// Convolves `input` against the filter, keeping the delay line
    /// continuous across calls, and emits every `decimation`-th output
    /// sample (pass `1` for no decimation).
    pub fn process_decimate(&mut self, input: &[T], decimation: usize) -> Vec<T> {
        let decimation = decimation.max(1);
        let m = self.taps.len();
        let hist_len = self.history.len();

        let mut extended = Vec::with_capacity(hist_len + input.len());
        extended.extend_from_slice(&self.history);
        extended.extend_from_slice(input);

        let n = input.len();
        let mut out = Vec::with_capacity(n / decimation + 1);
        let mut i = 0usize;
        while i < n {
            let newest = hist_len + i;
            let mut acc = T::default();
            for (k, tap) in self.taps.iter().enumerate() {
                acc = acc + extended[newest - k] * *tap;
            }
            out.push(acc);
            i += decimation;
        }

        if hist_len > 0 {
            let start = extended.len() - hist_len;
            self.history.copy_from_slice(&extended[start..]);
        }
        let _ = m;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::window::hamming_window;

    #[test]
    fn lowpass_design_has_unity_dc_gain() {
        let taps = design_lowpass(100_000.0, 240_000.0, 65, &hamming_window(65));
        let dc: f32 = taps.iter().sum();
        assert!((dc - 1.0).abs() < 1e-4);
    }

    #[test]
    fn dc_input_passes_through_at_unity_after_settling() {
        let taps = design_lowpass(5_000.0, 240_000.0, 65, &hamming_window(65));
        let mut filt = FirFilter::<f32>::new(taps);
        let input = vec![1.0f32; 256];
        let out = filt.process_decimate(&input, 1);
        assert!((out[255] - 1.0).abs() < 0.05);
    }

    #[test]
    fn decimation_emits_one_sample_per_factor() {
        let taps = design_lowpass(20_000.0, 240_000.0, 48, &hamming_window(48));
        let mut filt = FirFilter::<f32>::new(taps);
        let input = vec![0.0f32; 100];
        let out = filt.process_decimate(&input, 5);
        assert_eq!(out.len(), 20);
    }
}
