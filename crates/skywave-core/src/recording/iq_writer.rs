//! Raw IQ capture writer (spec §6): bytes identical to the tuner stream.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct IqWriter {
    file: BufWriter<File>,
}

impl IqWriter {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            file: BufWriter::new(File::create(path)?),
        })
    }

    pub fn write_chunk(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.file.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bytes_verbatim() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "skywave-iq-test-{}.raw",
            crate::util::generate_unique_id()
        ));
        {
            let mut w = IqWriter::create(&path).unwrap();
            w.write_chunk(&[1, 2, 3, 4]).unwrap();
            w.flush().unwrap();
        }
        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents, vec![1, 2, 3, 4]);
        std::fs::remove_file(&path).unwrap();
    }
}
