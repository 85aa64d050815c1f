//! Engine settings.
//!
//! Controls how long roll outcomes stay hidden while the host plays its
//! dice animation. The reveal delay is the base delay divided by the combat
//! animation speed, or zero when animations are switched off.

use crate::notify::DEFAULT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Base reveal delay before the speed multiplier is applied.
pub const BASE_REVEAL_DELAY_MS: u64 = 3000;

/// Speeds below this are treated as this value when computing delays.
const MIN_ANIMATION_SPEED: f32 = 0.1;

/// Errors from loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Combat animation speed must be a positive number, got {0}")]
    InvalidAnimationSpeed(f32),
}

/// Presentation settings the engine depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether dice animations are shown at all.
    pub show_dice_animations: bool,

    /// Multiplier applied to animation playback; 2.0 halves the delay.
    pub combat_animation_speed: f32,

    /// Delay at speed 1.0, in milliseconds.
    pub base_reveal_delay_ms: u64,

    /// How many messages the in-memory log keeps.
    pub message_log_capacity: usize,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            show_dice_animations: true,
            combat_animation_speed: 1.0,
            base_reveal_delay_ms: BASE_REVEAL_DELAY_MS,
            message_log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Settings with every animation disabled; outcomes resolve immediately.
    pub fn instant() -> Self {
        Self::new().with_dice_animations(false)
    }

    pub fn with_dice_animations(mut self, enabled: bool) -> Self {
        self.show_dice_animations = enabled;
        self
    }

    pub fn with_animation_speed(mut self, speed: f32) -> Self {
        self.combat_animation_speed = speed;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_reveal_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_message_log_capacity(mut self, capacity: usize) -> Self {
        self.message_log_capacity = capacity;
        self
    }

    /// How long a roll stays hidden before its outcome may be applied.
    pub fn reveal_delay(&self) -> Duration {
        if !self.show_dice_animations {
            return Duration::ZERO;
        }
        let speed = if self.combat_animation_speed.is_finite() {
            self.combat_animation_speed.max(MIN_ANIMATION_SPEED)
        } else {
            1.0
        };
        let millis = (self.base_reveal_delay_ms as f64 / speed as f64).round() as u64;
        Duration::from_millis(millis)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let speed = self.combat_animation_speed;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SettingsError::InvalidAnimationSpeed(speed));
        }
        Ok(())
    }

    /// Parse and validate settings from JSON. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    /// Write settings to a JSON file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
