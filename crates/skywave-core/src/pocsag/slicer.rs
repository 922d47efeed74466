//! Bit slicing and sync-word search (spec §4.D).

pub const SYNC: u32 = 0x7CD215D8;
pub const BATCH_BITS: usize = 512;
const SYNC_BITS: usize = 32;

/// Slices `buffer` (FM-demodulated audio at `sample_rate`) into a bit vector
/// at `baud` symbols/sec. Returns `None` if `spb < 2` or fewer than 64 bits
/// are available.
pub fn slice_bits(buffer: &[f32], sample_rate: f32, baud: u32) -> Option<Vec<u8>> {
    let spb = sample_rate / baud as f32;
    if spb < 2.0 {
        return None;
    }
    let n_bits = (buffer.len() as f32 / spb) as usize;
    if n_bits < 64 {
        return None;
    }
    let mut bits = Vec::with_capacity(n_bits);
    for i in 0..n_bits {
        let idx = ((i as f32 + 0.5) * spb).round() as usize;
        let idx = idx.min(buffer.len() - 1);
        bits.push(if buffer[idx] > 0.0 { 1u8 } else { 0u8 });
    }
    Some(bits)
}

fn bits_to_u32(bits: &[u8]) -> u32 {
    bits.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32)
}

/// Finds every offset in `bits` where a 32-bit MSB-first [`SYNC`] word
/// starts, followed by a full [`BATCH_BITS`]-bit batch.
pub fn find_batches(bits: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    let sync_bits: Vec<u8> = (0..SYNC_BITS)
        .map(|i| ((SYNC >> (31 - i)) & 1) as u8)
        .collect();
    (0..bits.len().saturating_sub(SYNC_BITS)).filter_map(move |i| {
        if bits[i..i + SYNC_BITS] != sync_bits[..] {
            return None;
        }
        let start = i + SYNC_BITS;
        let end = start + BATCH_BITS;
        if end <= bits.len() {
            Some(&bits[start..end])
        } else {
            None
        }
    })
}

pub fn codewords(batch_bits: &[u8]) -> impl Iterator<Item = u32> + '_ {
    batch_bits.chunks_exact(32).map(bits_to_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_rejects_short_buffers() {
        assert!(slice_bits(&[0.1; 10], 48_000.0, 512).is_none());
    }

    #[test]
    fn slice_extracts_bits_at_baud_rate() {
        let samples = vec![1.0f32; 48_000];
        let bits = slice_bits(&samples, 48_000.0, 1200).unwrap();
        assert!(bits.iter().all(|&b| b == 1));
        let spb = 48_000.0f32 / 1200.0;
        assert_eq!(bits.len(), (samples.len() as f32 / spb) as usize);
    }

    #[test]
    fn find_batches_locates_injected_sync() {
        let mut bits = vec![0u8; 20];
        for i in 0..32 {
            bits.push(((SYNC >> (31 - i)) & 1) as u8);
        }
        bits.extend(std::iter::repeat_n(0u8, BATCH_BITS));
        let found: Vec<_> = find_batches(&bits).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].len(), BATCH_BITS);
    }
}
