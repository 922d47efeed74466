//! rtl_tcp protocol client (spec §4.A).
//!
//! Generic over `Read + Write` so tests can hand it an in-memory pipe
//! instead of a real `TcpStream`.

use anyhow::Context;
use std::io::{Read, Write};

pub const READ_SIZE: usize = 131_072;

const CMD_SET_FREQ: u8 = 0x01;
const CMD_SET_SAMPLE_RATE: u8 = 0x02;
const CMD_SET_GAIN_MODE: u8 = 0x03;
const CMD_SET_GAIN: u8 = 0x04;
const CMD_SET_AGC: u8 = 0x08;

const DEFAULT_SAMPLE_RATE: u32 = 2_400_000;
const DEFAULT_GAIN_TENTHS: u32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerType {
    E4000,
    Fc0012,
    Fc0013,
    Fc2580,
    R820T,
    R828D,
    Unknown(u32),
}

impl TunerType {
    fn from_wire(code: u32) -> Self {
        match code {
            1 => Self::E4000,
            2 => Self::Fc0012,
            3 => Self::Fc0013,
            4 => Self::Fc2580,
            5 => Self::R820T,
            6 => Self::R828D,
            other => Self::Unknown(other),
        }
    }

    pub fn as_str(&self) -> std::borrow::Cow<'static, str> {
        match self {
            Self::E4000 => "E4000".into(),
            Self::Fc0012 => "FC0012".into(),
            Self::Fc0013 => "FC0013".into(),
            Self::Fc2580 => "FC2580".into(),
            Self::R820T => "R820T".into(),
            Self::R828D => "R828D".into(),
            Self::Unknown(code) => format!("unknown({code})").into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Greeting {
    pub tuner_type: TunerType,
    pub gain_count: u32,
}

/// Parses the 12-byte rtl_tcp greeting: `"RTL0" | u32be tuner | u32be gains`.
pub fn parse_greeting(buf: &[u8; 12]) -> anyhow::Result<Greeting> {
    if &buf[0..4] != b"RTL0" {
        anyhow::bail!("invalid rtl_tcp magic: {:?}", &buf[0..4]);
    }
    let tuner_code = u32::from_be_bytes(buf[4..8].try_into().unwrap());
    let gain_count = u32::from_be_bytes(buf[8..12].try_into().unwrap());
    Ok(Greeting {
        tuner_type: TunerType::from_wire(tuner_code),
        gain_count,
    })
}

fn encode_command(cmd_id: u8, param: u32) -> [u8; 5] {
    let mut frame = [0u8; 5];
    frame[0] = cmd_id;
    frame[1..5].copy_from_slice(&param.to_be_bytes());
    frame
}

/// Owns the rtl_tcp control+data socket. Handshakes on connect, then exposes
/// a byte reader that yields exactly [`READ_SIZE`] bytes per call.
pub struct TunerClient<S> {
    stream: S,
    pub tuner_type: TunerType,
    pub gain_count: u32,
    pub sample_rate: u32,
    pub center_freq: u64,
}

impl<S: Read + Write> TunerClient<S> {
    /// Performs the greeting handshake and the mandatory post-greeting
    /// command sequence (spec §4.A): sample rate, center freq, manual gain
    /// mode, fixed gain.
    pub fn handshake(mut stream: S, center_freq: u64) -> anyhow::Result<Self> {
        let mut greeting_buf = [0u8; 12];
        stream
            .read_exact(&mut greeting_buf)
            .context("read rtl_tcp greeting")?;
        let greeting = parse_greeting(&greeting_buf)?;

        let mut client = Self {
            stream,
            tuner_type: greeting.tuner_type,
            gain_count: greeting.gain_count,
            sample_rate: DEFAULT_SAMPLE_RATE,
            center_freq,
        };

        client.set_sample_rate(DEFAULT_SAMPLE_RATE)?;
        client.set_center_freq(center_freq)?;
        client.set_gain_mode(true)?;
        client.set_gain(DEFAULT_GAIN_TENTHS)?;
        Ok(client)
    }

    fn send(&mut self, cmd_id: u8, param: u32) -> anyhow::Result<()> {
        let frame = encode_command(cmd_id, param);
        self.stream
            .write_all(&frame)
            .with_context(|| format!("send rtl_tcp command 0x{cmd_id:02x}"))
    }

    pub fn set_center_freq(&mut self, freq_hz: u64) -> anyhow::Result<()> {
        self.center_freq = freq_hz;
        self.send(CMD_SET_FREQ, freq_hz as u32)
    }

    pub fn set_sample_rate(&mut self, rate: u32) -> anyhow::Result<()> {
        self.sample_rate = rate;
        self.send(CMD_SET_SAMPLE_RATE, rate)
    }

    pub fn set_gain_mode(&mut self, manual: bool) -> anyhow::Result<()> {
        self.send(CMD_SET_GAIN_MODE, manual as u32)
    }

    pub fn set_gain(&mut self, tenths_db: u32) -> anyhow::Result<()> {
        self.send(CMD_SET_GAIN, tenths_db)
    }

    pub fn set_agc(&mut self, enabled: bool) -> anyhow::Result<()> {
        self.send(CMD_SET_AGC, enabled as u32)
    }

    /// Reads exactly [`READ_SIZE`] bytes of interleaved I/Q. A short read is
    /// a protocol-level failure (spec §4.A) and bubbles up for reconnect.
    pub fn read_chunk(&mut self, out: &mut [u8; READ_SIZE]) -> anyhow::Result<()> {
        self.stream.read_exact(out).context("read rtl_tcp chunk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Pipe {
        read: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.read.read(buf)
        }
    }

    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn greeting_bytes(tuner: u32, gains: u32) -> Vec<u8> {
        let mut v = b"RTL0".to_vec();
        v.extend_from_slice(&tuner.to_be_bytes());
        v.extend_from_slice(&gains.to_be_bytes());
        v
    }

    #[test]
    fn handshake_parses_greeting_and_reports_r820t() {
        let pipe = Pipe {
            read: Cursor::new(greeting_bytes(5, 8)),
            written: Vec::new(),
        };
        let client = TunerClient::handshake(pipe, 100_300_000).unwrap();
        assert_eq!(client.tuner_type.as_str(), "R820T");
        assert_eq!(client.gain_count, 8);
    }

    #[test]
    fn handshake_rejects_bad_magic() {
        let mut bytes = greeting_bytes(5, 8);
        bytes[0] = b'X';
        let pipe = Pipe {
            read: Cursor::new(bytes),
            written: Vec::new(),
        };
        assert!(TunerClient::handshake(pipe, 100_000_000).is_err());
    }

    #[test]
    fn set_center_freq_encodes_exact_five_bytes() {
        let pipe = Pipe {
            read: Cursor::new(greeting_bytes(5, 8)),
            written: Vec::new(),
        };
        let mut client = TunerClient::handshake(pipe, 100_000_000).unwrap();
        client.stream.written.clear();
        client.set_center_freq(100_300_000).unwrap();
        assert_eq!(
            client.stream.written,
            encode_command(CMD_SET_FREQ, 100_300_000).to_vec()
        );
    }

    #[test]
    fn handshake_sends_mandatory_command_sequence() {
        let pipe = Pipe {
            read: Cursor::new(greeting_bytes(1, 3)),
            written: Vec::new(),
        };
        let client = TunerClient::handshake(pipe, 100_000_000).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&encode_command(CMD_SET_SAMPLE_RATE, 2_400_000));
        expected.extend_from_slice(&encode_command(CMD_SET_FREQ, 100_000_000));
        expected.extend_from_slice(&encode_command(CMD_SET_GAIN_MODE, 1));
        expected.extend_from_slice(&encode_command(CMD_SET_GAIN, 400));
        assert_eq!(client.stream.written, expected);
    }
}
