//! Subscriber wire protocol (spec §6, §9 "tagged variants" redesign): a
//! binary frame enum for spectrum/audio and a JSON command/event surface
//! discriminated on `type`.

use serde::{Deserialize, Serialize};

/// Binary frames multiplexed on the subscriber channel. Frame tag is the
/// first byte; payload is little-endian float32 samples.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryFrame {
    Spectrum(Vec<f32>),
    Audio(Vec<f32>),
}

impl BinaryFrame {
    const TAG_SPECTRUM: u8 = 0x01;
    const TAG_AUDIO: u8 = 0x02;

    pub fn encode(&self) -> Vec<u8> {
        let (tag, samples) = match self {
            Self::Spectrum(s) => (Self::TAG_SPECTRUM, s),
            Self::Audio(s) => (Self::TAG_AUDIO, s),
        };
        let mut out = Vec::with_capacity(1 + samples.len() * 4);
        out.push(tag);
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("empty binary frame"))?;
        if rest.len() % 4 != 0 {
            anyhow::bail!("binary frame payload not a multiple of 4 bytes");
        }
        let samples: Vec<f32> = rest
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        match tag {
            Self::TAG_SPECTRUM => Ok(Self::Spectrum(samples)),
            Self::TAG_AUDIO => Ok(Self::Audio(samples)),
            other => anyhow::bail!("unknown binary frame tag 0x{other:02x}"),
        }
    }
}

/// Inbound subscriber commands (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    StartStream,
    StopStream,
    SetMode {
        mode: String,
    },
    SetSquelch {
        value: f32,
    },
    SetFreq {
        value: u64,
    },
    SetGain {
        value: u32,
    },
    SetAgc {
        value: bool,
    },
    StartScan {
        category: Option<String>,
    },
    StartRangeScan {
        start: u64,
        end: u64,
        step: u64,
        mode: String,
    },
    StopScan,
    SkipScan,
    SetScanSpeed {
        value_ms: u64,
    },
    SetScanDelay {
        value_s: f64,
    },
    TogglePocsag {
        value: bool,
    },
    StartIqRecord,
    StopIqRecord,
    StartAudioRecord,
    StopAudioRecord,
}

/// Outbound subscriber events (spec §6). `Pocsag` carries a pre-serialized
/// message so this module doesn't depend on `pocsag::PocsagMessage`'s
/// internal field order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    State {
        streaming: bool,
        mode: String,
        squelch_threshold: f32,
    },
    StreamState {
        streaming: bool,
    },
    ModeChanged {
        mode: String,
    },
    SquelchChanged {
        value: f32,
    },
    FreqChanged {
        value: u64,
    },
    SignalLevel {
        signal_db: f32,
        s_units: String,
    },
    ScanStatus {
        state: String,
        index: usize,
        total: usize,
        freq: u64,
        label: String,
        skipped: bool,
        dwell_ms: u64,
        resume_delay: f64,
    },
    Pocsag(crate::pocsag::PocsagMessage),
    ConnectionChanged {
        connected: bool,
        freq: Option<u64>,
    },
    RecordStatus {
        kind: String,
        active: bool,
        path: Option<String>,
    },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "failed to serialize server event");
            "{}".to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_frame_round_trips_spectrum() {
        let frame = BinaryFrame::Spectrum(vec![0.1, 0.2, 0.3]);
        let bytes = frame.encode();
        assert_eq!(bytes[0], 0x01);
        let decoded = BinaryFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn binary_frame_round_trips_audio() {
        let frame = BinaryFrame::Audio(vec![-0.5, 0.5]);
        let decoded = BinaryFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(BinaryFrame::decode(&[0xFF, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn client_command_parses_set_mode() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"SET_MODE","mode":"USB"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::SetMode { mode } if mode == "USB"));
    }

    #[test]
    fn client_command_rejects_unknown_type() {
        let result: Result<ClientCommand, _> = serde_json::from_str(r#"{"type":"BOGUS"}"#);
        assert!(result.is_err());
    }
}
