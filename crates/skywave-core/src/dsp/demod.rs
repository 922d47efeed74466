//! Per-mode demodulators (spec §4.C stage 3).
//!
//! `SAM` is dropped: the reference's synchronous-AM carrier recovery has
//! no counterpart among the spec's five modes. `polar_discriminator_fm`
//! and `am_envelope` are kept from the teacher near-verbatim; the
//! `i8`-centered path served the teacher's compressed audio frames and
//! has no remaining caller here.

use num_complex::Complex32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Fm,
    Nfm,
    Am,
    Usb,
    Lsb,
}

impl Mode {
    pub fn from_str_upper(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FM" | "WBFM" => Some(Self::Fm),
            "NFM" | "NBFM" => Some(Self::Nfm),
            "AM" => Some(Self::Am),
            "USB" => Some(Self::Usb),
            "LSB" => Some(Self::Lsb),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fm => "FM",
            Self::Nfm => "NFM",
            Self::Am => "AM",
            Self::Usb => "USB",
            Self::Lsb => "LSB",
        }
    }
}

/// `angle(x[n] * conj(x[n-1]))`, carrying one sample of state across calls.
pub fn polar_discriminator_fm(iq: &[Complex32], mut prev: Complex32, out: &mut [f32]) -> Complex32 {
    for (dst, v) in out.iter_mut().zip(iq.iter()) {
        let d = *v * prev.conj();
        *dst = d.arg();
        prev = *v;
    }
    prev
}

pub fn am_envelope(iq: &[Complex32], out: &mut [f32]) {
    for (dst, v) in out.iter_mut().zip(iq.iter()) {
        *dst = (v.re * v.re + v.im * v.im).sqrt();
    }
}

/// Subtracts the chunk mean (spec §4.C AM DC removal).
pub fn remove_chunk_mean(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    for s in samples.iter_mut() {
        *s -= mean;
    }
}

pub fn usb_demod(iq: &[Complex32], out: &mut [f32]) {
    for (dst, v) in out.iter_mut().zip(iq.iter()) {
        *dst = v.re;
    }
}

/// `Re(x) + Im(x)`, 5x gain (spec §4.C).
pub fn lsb_demod(iq: &[Complex32], out: &mut [f32]) {
    const GAIN: f32 = 5.0;
    for (dst, v) in out.iter_mut().zip(iq.iter()) {
        *dst = (v.re + v.im) * GAIN;
    }
}

pub const NFM_GAIN: f32 = 15.0;

pub fn float_to_i16_centered(samples: &[f32], out: &mut [i16], mult: f32) {
    for (dst, s) in out.iter_mut().zip(samples.iter()) {
        let v = (s * mult + 32768.5).floor() as i32 - 32768;
        *dst = v.clamp(-32768, 32767) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_accepts_aliases() {
        assert_eq!(Mode::from_str_upper("WBFM"), Some(Mode::Fm));
        assert_eq!(Mode::from_str_upper("NBFM"), Some(Mode::Nfm));
        assert_eq!(Mode::from_str_upper("lsb"), Some(Mode::Lsb));
        assert_eq!(Mode::from_str_upper("XYZ"), None);
    }

    #[test]
    fn am_envelope_matches_magnitude() {
        let iq = [Complex32::new(3.0, 4.0)];
        let mut out = [0.0f32];
        am_envelope(&iq, &mut out);
        assert!((out[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn usb_takes_real_part_only() {
        let iq = [Complex32::new(0.3, 0.7)];
        let mut out = [0.0f32];
        usb_demod(&iq, &mut out);
        assert!((out[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn lsb_sums_components_with_gain() {
        let iq = [Complex32::new(0.2, 0.1)];
        let mut out = [0.0f32];
        lsb_demod(&iq, &mut out);
        assert!((out[0] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn chunk_mean_removal_centers_signal() {
        let mut samples = [1.0f32, 2.0, 3.0, 4.0];
        remove_chunk_mean(&mut samples);
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!(mean.abs() < 1e-6);
    }

    #[test]
    fn float_to_i16_centered_maps_expected_range() {
        let samples: [f32; 6] = [-1.0, -0.5, 0.0, 0.5, 1.0, 2.0];
        let mut out = [0i16; 6];
        float_to_i16_centered(&samples, &mut out, 32767.0);
        assert_eq!(out, [-32767, -16383, 0, 16384, 32767, 32767]);
    }
}
