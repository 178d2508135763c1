use anyhow::Context;
use chrono::{Datelike, NaiveTime};
use rollcall_core::KioskConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Daemon configuration: a TOML file (`ROLLCALL_CONFIG`, default
/// `/etc/rollcall/config.toml`, missing file means defaults) with
/// `ROLLCALL_*` environment overrides for the deployment-specific paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path.
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Directory for enrollment and alert frame JPEGs.
    pub capture_dir: PathBuf,
    /// Academic-year scope, e.g. "2025-2026".
    pub year: String,
    /// Maximum descriptor distance for a positive match.
    pub match_distance: f32,
    /// Late-after time of day, "HH:MM".
    pub cutoff: String,
    /// Recognition tick interval.
    pub scan_interval_secs: u64,
    /// How long a scan result stays on screen.
    pub result_dwell_secs: i64,
    /// Consecutive unknown-face ticks before a proxy alert.
    pub streak_threshold: u32,
    /// Proxy-alert cooldown.
    pub cooldown_secs: i64,
    /// Frames discarded at startup for AGC/AE stabilization.
    pub warmup_frames: usize,
    /// Frames captured per enrollment attempt.
    pub enroll_frames: usize,
    /// Secret the descriptor-at-rest key is derived from.
    pub descriptor_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: rollcall_vision::default_model_dir(),
            db_path: PathBuf::from("/var/lib/rollcall/rollcall.db"),
            capture_dir: PathBuf::from("/var/lib/rollcall/captures"),
            year: current_academic_year(),
            match_distance: 0.55,
            cutoff: "09:15".to_string(),
            scan_interval_secs: 1,
            result_dwell_secs: 4,
            streak_threshold: 2,
            cooldown_secs: 15,
            warmup_frames: 4,
            enroll_frames: 5,
            descriptor_secret: "rollcall-dev-secret".to_string(),
        }
    }
}

impl Config {
    /// Load from the `ROLLCALL_CONFIG` file (if present) and apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/rollcall/config.toml"));
        let mut config = Self::from_path(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Ok(v) = std::env::var("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ROLLCALL_CAPTURE_DIR") {
            self.capture_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ROLLCALL_DESCRIPTOR_SECRET") {
            self.descriptor_secret = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.cutoff_time()?;
        anyhow::ensure!(self.scan_interval_secs > 0, "scan_interval_secs must be > 0");
        anyhow::ensure!(self.streak_threshold > 0, "streak_threshold must be > 0");
        Ok(())
    }

    pub fn cutoff_time(&self) -> anyhow::Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.cutoff, "%H:%M")
            .with_context(|| format!("invalid cutoff time {:?} (want HH:MM)", self.cutoff))
    }

    pub fn kiosk_config(&self) -> anyhow::Result<KioskConfig> {
        Ok(KioskConfig {
            max_distance: self.match_distance,
            cutoff: self.cutoff_time()?,
            streak_threshold: self.streak_threshold,
            cooldown_secs: self.cooldown_secs,
            result_dwell_secs: self.result_dwell_secs,
        })
    }
}

fn current_academic_year() -> String {
    let year = chrono::Local::now().year();
    format!("{}-{}", year, year + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(
            config.cutoff_time().unwrap(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap()
        );
        assert_eq!(config.match_distance, 0.55);
        assert_eq!(config.scan_interval_secs, 1);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            camera_device = "/dev/video2"
            cutoff = "08:45"
            year = "2026-2027"
            "#,
        )
        .unwrap();
        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.year, "2026-2027");
        assert_eq!(
            config.cutoff_time().unwrap(),
            NaiveTime::from_hms_opt(8, 45, 0).unwrap()
        );
        // Untouched fields fall back to defaults.
        assert_eq!(config.streak_threshold, 2);
        assert_eq!(config.cooldown_secs, 15);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Config, _> = toml::from_str("no_such_option = true");
        assert!(result.is_err());
    }

    #[test]
    fn bad_cutoff_fails_validation() {
        let config = Config {
            cutoff: "quarter past nine".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn kiosk_config_carries_tunables() {
        let config = Config {
            match_distance: 0.4,
            streak_threshold: 3,
            cooldown_secs: 30,
            result_dwell_secs: 6,
            ..Config::default()
        };
        let kc = config.kiosk_config().unwrap();
        assert_eq!(kc.max_distance, 0.4);
        assert_eq!(kc.streak_threshold, 3);
        assert_eq!(kc.cooldown_secs, 30);
        assert_eq!(kc.result_dwell_secs, 6);
    }
}
