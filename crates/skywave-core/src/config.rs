//! Process configuration (ambient stack: loaded once at boot, read-only
//! thereafter). JSON via `serde_json`, the same format and loading style
//! the teacher crate uses for its own config/receivers documents.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tuner: TunerConfig,
    #[serde(default)]
    pub dsp: DspConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default = "default_bookmarks_path")]
    pub bookmarks_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TunerConfig {
    #[serde(default = "default_tuner_host")]
    pub host: String,
    #[serde(default = "default_tuner_port")]
    pub port: u16,
    #[serde(default = "default_center_freq")]
    pub center_freq_hz: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            host: default_tuner_host(),
            port: default_tuner_port(),
            center_freq_hz: default_center_freq(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DspConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_squelch")]
    pub squelch_threshold_db: f32,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            squelch_threshold_db: default_squelch(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_subscriber_limit")]
    pub subscribers: usize,
    #[serde(default = "default_ws_per_ip")]
    pub ws_per_ip: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            subscribers: default_subscriber_limit(),
            ws_per_ip: default_ws_per_ip(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_recording_dir")]
    pub dir: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            dir: default_recording_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tuner: TunerConfig::default(),
            dsp: DspConfig::default(),
            limits: LimitsConfig::default(),
            recording: RecordingConfig::default(),
            bookmarks_path: default_bookmarks_path(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that would only fail later, deep inside the
    /// reader or worker threads. Fail fast at startup instead.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.tuner.center_freq_hz > 0,
            "tuner.center_freq_hz must be greater than 0, got {}",
            self.tuner.center_freq_hz
        );
        anyhow::ensure!(
            (-150.0..=0.0).contains(&self.dsp.squelch_threshold_db),
            "dsp.squelch_threshold_db must be within -150.0..=0.0 dB, got {}",
            self.dsp.squelch_threshold_db
        );
        anyhow::ensure!(
            self.limits.subscribers > 0,
            "limits.subscribers must be greater than 0, got {}",
            self.limits.subscribers
        );
        anyhow::ensure!(
            self.limits.ws_per_ip > 0,
            "limits.ws_per_ip must be greater than 0, got {}",
            self.limits.ws_per_ip
        );
        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_tuner_host() -> String {
    "127.0.0.1".to_string()
}
fn default_tuner_port() -> u16 {
    1234
}
fn default_center_freq() -> u64 {
    100_000_000
}
fn default_mode() -> String {
    "FM".to_string()
}
fn default_squelch() -> f32 {
    -60.0
}
fn default_subscriber_limit() -> usize {
    32
}
fn default_ws_per_ip() -> usize {
    4
}
fn default_recording_dir() -> String {
    "recordings".to_string()
}
fn default_bookmarks_path() -> String {
    "bookmarks.json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_populated_when_json_is_empty_object() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.tuner.center_freq_hz, 100_000_000);
        assert_eq!(cfg.dsp.mode, "FM");
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"tuner":{"center_freq_hz":146520000}}"#).unwrap();
        assert_eq!(cfg.tuner.center_freq_hz, 146_520_000);
        assert_eq!(cfg.tuner.port, 1234);
    }

    #[test]
    fn defaults_pass_validation() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_center_freq_is_rejected() {
        let mut cfg = Config::default();
        cfg.tuner.center_freq_hz = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn squelch_out_of_range_is_rejected() {
        let mut cfg = Config::default();
        cfg.dsp.squelch_threshold_db = 10.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut cfg = Config::default();
        cfg.limits.subscribers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.limits.ws_per_ip = 0;
        assert!(cfg.validate().is_err());
    }
}
