//! DSP engine: decimation, channel filtering, demodulation, and the
//! spectrum path (spec §4.C). `DspEngine` is the single stateful owner of
//! every filter memory; it is confined to the pipeline worker thread the
//! same way the teacher confines its `Engine` (GPU context + filter state)
//! to one thread.

pub mod demod;
pub mod fft;
pub mod fir;
pub mod iir;
pub mod window;

use demod::Mode;
use fft::{SpectrumAnalyzer, SpectrumFrame};
use fir::{design_lowpass, FirFilter};
use iir::Deemphasis;
use num_complex::Complex32;
use window::hamming_window;

const INPUT_RATE: f32 = 2_400_000.0;
const INTERMEDIATE_RATE: f32 = 240_000.0;
const DEC1: usize = 10;
const DEC2: usize = 5;
const DEEMPH_TAU: f32 = 75e-6;

fn stage2_taps(mode: Mode) -> Vec<f32> {
    let (num_taps, cutoff) = match mode {
        Mode::Fm => (65, 100_000.0),
        Mode::Nfm => (129, 6_250.0),
        Mode::Am => (129, 5_000.0),
        Mode::Usb | Mode::Lsb => (257, 1_500.0),
    };
    design_lowpass(
        cutoff,
        INTERMEDIATE_RATE,
        num_taps,
        &hamming_window(num_taps),
    )
}

pub struct DspEngine {
    mode: Mode,
    squelch_threshold: f32,
    signal_db: f32,

    stage1: FirFilter<Complex32>,
    stage2: FirFilter<Complex32>,
    stage4: FirFilter<f32>,
    deemph: Deemphasis,
    prev_sample: Complex32,

    spectrum: SpectrumAnalyzer,
}

impl DspEngine {
    pub fn new(mode: Mode, squelch_threshold: f32) -> Self {
        let stage1_taps = design_lowpass(120_000.0, INPUT_RATE, 64, &hamming_window(64));
        let stage4_taps = design_lowpass(20_000.0, INTERMEDIATE_RATE, 48, &hamming_window(48));
        Self {
            mode,
            squelch_threshold,
            signal_db: -100.0,
            stage1: FirFilter::new(stage1_taps),
            stage2: FirFilter::new(stage2_taps(mode)),
            stage4: FirFilter::new(stage4_taps),
            deemph: Deemphasis::new(DEEMPH_TAU, 1.0 / INTERMEDIATE_RATE),
            prev_sample: Complex32::new(0.0, 0.0),
            spectrum: SpectrumAnalyzer::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn signal_db(&self) -> f32 {
        self.signal_db
    }

    pub fn set_squelch(&mut self, threshold_db: f32) {
        self.squelch_threshold = threshold_db;
    }

    /// Atomically zeroes every filter memory and swaps the active mode
    /// (spec §4.C "State reset").
    pub fn set_mode(&mut self, mode: Mode) {
        self.stage1.reset();
        self.stage2 = FirFilter::new(stage2_taps(mode));
        self.stage4.reset();
        self.deemph.reset();
        self.prev_sample = Complex32::new(0.0, 0.0);
        self.mode = mode;
    }

    /// Converts a raw rtl_tcp byte chunk (interleaved u8 I/Q) to float32
    /// complex samples (spec §3 raw chunk normalization).
    pub fn bytes_to_iq(bytes: &[u8]) -> Vec<Complex32> {
        bytes
            .chunks_exact(2)
            .map(|pair| {
                let i = (pair[0] as f32 - 127.5) / 127.5;
                let q = (pair[1] as f32 - 127.5) / 127.5;
                Complex32::new(i, q)
            })
            .collect()
    }

    /// Computes the spectrum frame for this chunk's IQ samples.
    pub fn compute_spectrum(&mut self, iq: &[Complex32]) -> SpectrumFrame {
        let frame = self.spectrum.compute(iq);
        self.signal_db = frame.signal_db;
        frame
    }

    /// Runs stages 1-5 over one chunk of IQ samples, producing 48 kHz audio.
    pub fn demodulate(&mut self, iq: &[Complex32]) -> Vec<f32> {
        let iq_240k = self.stage1.process_decimate(iq, DEC1);
        let iq_channel = self.stage2.process_decimate(&iq_240k, 1);

        let mut audio_240k = match self.mode {
            Mode::Fm | Mode::Nfm => {
                let mut out = vec![0.0f32; iq_channel.len()];
                self.prev_sample =
                    demod::polar_discriminator_fm(&iq_channel, self.prev_sample, &mut out);
                if self.mode == Mode::Fm {
                    self.deemph.process(&mut out);
                } else {
                    for s in out.iter_mut() {
                        *s *= demod::NFM_GAIN;
                    }
                }
                out
            }
            Mode::Am => {
                let mut out = vec![0.0f32; iq_channel.len()];
                demod::am_envelope(&iq_channel, &mut out);
                demod::remove_chunk_mean(&mut out);
                out
            }
            Mode::Usb => {
                let mut out = vec![0.0f32; iq_channel.len()];
                demod::usb_demod(&iq_channel, &mut out);
                out
            }
            Mode::Lsb => {
                let mut out = vec![0.0f32; iq_channel.len()];
                demod::lsb_demod(&iq_channel, &mut out);
                out
            }
        };

        let mut audio_48k = self.stage4.process_decimate(&audio_240k, DEC2);
        audio_240k.clear();

        if self.signal_db < self.squelch_threshold {
            for s in audio_48k.iter_mut() {
                *s = 0.0;
            }
            return audio_48k;
        }

        let peak = audio_48k.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak > 0.001 {
            let scale = peak / 0.8;
            for s in audio_48k.iter_mut() {
                *s /= scale;
            }
        }
        audio_48k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_to_iq_normalizes_to_unit_range() {
        let bytes = [0u8, 255u8, 127u8, 128u8];
        let iq = DspEngine::bytes_to_iq(&bytes);
        assert_eq!(iq.len(), 2);
        assert!((iq[0].re - (-1.0)).abs() < 1e-3);
        assert!((iq[0].im - 1.0).abs() < 1e-3);
    }

    #[test]
    fn squelch_below_threshold_zeroes_audio() {
        let mut engine = DspEngine::new(Mode::Fm, -30.0);
        let iq = vec![Complex32::new(0.0, 0.0); INPUT_RATE as usize / 10];
        engine.compute_spectrum(&iq);
        let audio = engine.demodulate(&iq);
        assert!(audio.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mode_switch_resets_prev_sample_and_retunes_channel_filter() {
        let mut engine = DspEngine::new(Mode::Fm, -120.0);
        let iq = vec![Complex32::new(1.0, 0.0); 1000];
        engine.demodulate(&iq);
        engine.set_mode(Mode::Nfm);
        assert_eq!(engine.mode(), Mode::Nfm);
        assert_eq!(engine.prev_sample, Complex32::new(0.0, 0.0));
    }

    #[test]
    fn demodulate_decimates_to_48k_ratio() {
        let mut engine = DspEngine::new(Mode::Am, -120.0);
        let iq = vec![Complex32::new(0.5, 0.0); 24_000];
        engine.compute_spectrum(&iq);
        let audio = engine.demodulate(&iq);
        assert_eq!(audio.len(), iq.len() / (DEC1 * DEC2));
    }
}
