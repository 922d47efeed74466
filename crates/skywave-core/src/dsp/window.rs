pub fn hann_window(size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; size];
    let denom = size as f32;
    for (i, v) in out.iter_mut().enumerate() {
        *v = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * (i as f32) / denom).cos());
    }
    out
}

/// Hamming window, used for the stage-1 wideband decimation FIR (spec §4.C).
pub fn hamming_window(size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; size];
    let denom = (size.saturating_sub(1)).max(1) as f32;
    for (i, v) in out.iter_mut().enumerate() {
        *v = 0.54 - 0.46 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos();
    }
    out
}

/// Blackman window, used for the spectrum-frame FFT (spec §4.C).
pub fn blackman_window(size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; size];
    let denom = (size.saturating_sub(1)).max(1) as f32;
    for (i, v) in out.iter_mut().enumerate() {
        let x = 2.0 * std::f32::consts::PI * (i as f32) / denom;
        *v = 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_are_zero_at_edges_and_peak_near_center() {
        for win in [hann_window(64), hamming_window(64), blackman_window(64)] {
            let peak_idx = win
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .unwrap()
                .0;
            assert!((28..36).contains(&peak_idx));
        }
    }
}
