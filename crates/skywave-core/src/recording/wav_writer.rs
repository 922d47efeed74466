//! Mono 16-bit PCM WAV writer at 48 kHz (spec §6 recording file formats).
//!
//! Hand-rolled RIFF container: no crate in the dependency stack speaks WAV,
//! and the format itself is a fixed 44-byte header plus raw PCM, small
//! enough not to warrant one.

use crate::dsp::demod::float_to_i16_centered;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

const SAMPLE_RATE: u32 = 48_000;
const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

pub struct WavWriter {
    file: BufWriter<File>,
    data_bytes_written: u32,
}

impl WavWriter {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);
        write_placeholder_header(&mut file)?;
        Ok(Self {
            file,
            data_bytes_written: 0,
        })
    }

    /// Appends samples in `[-0.8, 0.8]`-ish float range, clipped to i16 full
    /// scale (spec: `clip(audio*32767, -32768, 32767)`).
    pub fn write_samples(&mut self, samples: &[f32]) -> anyhow::Result<()> {
        let mut pcm = vec![0i16; samples.len()];
        float_to_i16_centered(samples, &mut pcm, 32767.0);
        for s in &pcm {
            self.file.write_all(&s.to_le_bytes())?;
        }
        self.data_bytes_written += (pcm.len() * 2) as u32;
        Ok(())
    }

    /// Backfills the RIFF/data chunk sizes now that the total is known.
    pub fn finalize(mut self) -> anyhow::Result<()> {
        self.file.flush()?;
        let mut file = self.file.into_inner()?;
        let riff_size = 36 + self.data_bytes_written;
        file.seek(SeekFrom::Start(4))?;
        file.write_all(&riff_size.to_le_bytes())?;
        file.seek(SeekFrom::Start(40))?;
        file.write_all(&self.data_bytes_written.to_le_bytes())?;
        file.flush()?;
        Ok(())
    }
}

fn write_placeholder_header(w: &mut impl Write) -> anyhow::Result<()> {
    let byte_rate = SAMPLE_RATE * CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8);
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);

    w.write_all(b"RIFF")?;
    w.write_all(&0u32.to_le_bytes())?; // riff size, backfilled
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?; // fmt chunk size
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&SAMPLE_RATE.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&0u32.to_le_bytes())?; // data size, backfilled
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_sample_bytes_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "skywave-wav-test-{}.wav",
            crate::util::generate_unique_id()
        ));
        {
            let mut w = WavWriter::create(&path).unwrap();
            w.write_samples(&[0.0, 0.5, -0.5, 1.0]).unwrap();
            w.finalize().unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(data_size, 8);
        assert_eq!(bytes.len(), 44 + 8);
        std::fs::remove_file(&path).unwrap();
    }
}
