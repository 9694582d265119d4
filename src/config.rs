use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::serializer::SerializerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Where the device id and operator name are kept between runs
    #[serde(default = "default_profile_path")]
    pub profile_path: PathBuf,
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_profile_path() -> PathBuf {
    PathBuf::from("drive_recorder_profile.toml")
}

impl RecorderConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            tick_interval_ms: default_tick_interval_ms(),
            profile_path: default_profile_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_motion_hz")]
    pub motion_hz: f64,
    #[serde(default = "default_location_hz")]
    pub location_hz: f64,
}

fn default_motion_hz() -> f64 {
    10.0
}

fn default_location_hz() -> f64 {
    1.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            motion_hz: default_motion_hz(),
            location_hz: default_location_hz(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub recorder: RecorderConfig,
    pub upload: UploadConfig,
    #[serde(default)]
    pub serializer: SerializerConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    pub fn load_default() -> anyhow::Result<Self> {
        let default = include_str!("../config/default.toml");
        Self::parse(default)
    }

    pub fn load_from(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let p = path.into();
        let s = fs::read_to_string(&p)?;
        Self::parse(&s)
    }

    fn parse(s: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        if cfg.recorder.tick_interval_ms == 0 {
            anyhow::bail!("recorder.tick_interval_ms must be greater than zero");
        }
        cfg.simulator.motion_period()?;
        cfg.simulator.location_period()?;
        Ok(cfg)
    }
}

impl SimulatorConfig {
    pub fn motion_period(&self) -> anyhow::Result<Duration> {
        rate_to_period("simulator.motion_hz", self.motion_hz)
    }

    pub fn location_period(&self) -> anyhow::Result<Duration> {
        rate_to_period("simulator.location_hz", self.location_hz)
    }
}

fn rate_to_period(key: &str, hz: f64) -> anyhow::Result<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        anyhow::bail!("{} must be a positive finite rate, got {}", key, hz);
    }
    match Duration::try_from_secs_f64(1.0 / hz) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => anyhow::bail!("{} = {} is too fast to schedule", key, hz),
    }
}
