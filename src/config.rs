//! Configuration management for talking-t.
//!
//! Loads config from YAML files in standard locations, then applies the
//! Piper environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::phrases::DEFAULT_PHRASES;
use crate::schedule::ScheduleMode;

pub const PIPER_MODEL_ENV: &str = "PIPER_MODEL_PATH";
pub const PIPER_CONFIG_ENV: &str = "PIPER_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub voice: String,
    pub rate: u32,
    pub say_command: String,
    /// Explicit piper binary. Empty means look it up on PATH.
    pub piper_command: String,
    pub piper_model_path: String,
    pub piper_config_path: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: "Ralph".into(),
            rate: 150,
            say_command: "/usr/bin/say".into(),
            piper_command: String::new(),
            piper_model_path: String::new(),
            piper_config_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: ScheduleMode,
    pub tick_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::default(),
            tick_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Directory holding the MRT_mouth_*.png frames. Empty means the
    /// directory next to the executable, then `./assets`.
    pub image_dir: String,
    pub size: u32,
    pub margin: u32,
    pub mouth_flip_ms: u64,
    pub end_pose_probability: f64,
    pub end_pose_hold_ms: u64,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            image_dir: String::new(),
            size: 200,
            margin: 20,
            mouth_flip_ms: 120,
            end_pose_probability: 0.16,
            end_pose_hold_ms: 240,
        }
    }
}

impl AvatarConfig {
    pub fn resolve_image_dir(&self) -> PathBuf {
        if !self.image_dir.is_empty() {
            return PathBuf::from(&self.image_dir);
        }

        let candidates = [
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|d| d.join("assets"))),
            std::env::current_dir().ok().map(|d| d.join("assets")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.is_dir())
            .unwrap_or_else(|| PathBuf::from("assets"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub notifications: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub schedule: ScheduleConfig,
    pub avatar: AvatarConfig,
    pub phrases: Vec<String>,
    pub feedback: FeedbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech: SpeechConfig::default(),
            schedule: ScheduleConfig::default(),
            avatar: AvatarConfig::default(),
            phrases: DEFAULT_PHRASES.iter().map(|p| (*p).to_string()).collect(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/talking-t/config.yaml
    /// 3. /etc/talking-t/config.yaml
    ///
    /// Piper environment variables are applied on top.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::load_file(path);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::home_dir().map(|h| h.join(".config/talking-t/config.yaml")),
                Some(PathBuf::from("/etc/talking-t/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        let mut config: Self = serde_yml::from_str(contents)?;
        if config.phrases.is_empty() {
            config.phrases = Self::default().phrases;
        }
        Ok(config)
    }

    /// Environment wins over the file when set.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup(PIPER_MODEL_ENV) {
            self.speech.piper_model_path = model.trim().to_string();
        }
        if let Some(cfg) = lookup(PIPER_CONFIG_ENV) {
            self.speech.piper_config_path = cfg.trim().to_string();
        }
    }
}
