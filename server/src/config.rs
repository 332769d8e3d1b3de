//! Match tuning loaded from a JSON file
//!
//! Every section and field is optional; anything missing falls back to the
//! defaults below. Keys are camelCase (`match.setupSec`, `killer.burstCD`).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use shared::DisasterKind;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    #[serde(rename = "match")]
    pub match_timing: MatchConfig,
    pub survivor: SurvivorConfig,
    pub killer: KillerConfig,
    pub disasters: DisasterConfig,
}

/// Phase durations in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchConfig {
    pub setup_sec: f32,
    pub hunt_sec: f32,
    pub showdown_sec: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            setup_sec: 20.0,
            hunt_sec: 300.0,
            showdown_sec: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurvivorConfig {
    pub walk: f32,
    pub run: f32,
    pub crouch: f32,
    pub stamina_max: f32,
    /// Stamina regained per second is `staminaRegen * 10`.
    pub stamina_regen: f32,
    pub sanity_max: f32,
    /// Base sanity lost per second while hiding (scaled by 1.5).
    pub sanity_drain: f32,
}

impl Default for SurvivorConfig {
    fn default() -> Self {
        Self {
            walk: 3.0,
            run: 6.0,
            crouch: 1.5,
            stamina_max: 100.0,
            stamina_regen: 1.5,
            sanity_max: 100.0,
            sanity_drain: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KillerConfig {
    pub walk: f32,
    pub run_burst: f32,
    pub burst_dur: f32,
    #[serde(rename = "burstCD")]
    pub burst_cd: f32,
    pub sense_cone_range: f32,
}

impl Default for KillerConfig {
    fn default() -> Self {
        Self {
            walk: 3.5,
            run_burst: 7.0,
            burst_dur: 3.0,
            burst_cd: 6.0,
            sense_cone_range: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisasterConfig {
    pub min_delay_sec: f32,
    pub max_delay_sec: f32,
    pub probabilities: DisasterProbabilities,
}

impl Default for DisasterConfig {
    fn default() -> Self {
        Self {
            min_delay_sec: 45.0,
            max_delay_sec: 120.0,
            probabilities: DisasterProbabilities::default(),
        }
    }
}

/// Selection weights. They are read cumulatively in the order
/// earthquake, lightning, flood; a total below 1.0 leaves room for
/// "nothing happens this time".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisasterProbabilities {
    pub earthquake: f32,
    pub lightning: f32,
    pub flood: f32,
}

impl Default for DisasterProbabilities {
    fn default() -> Self {
        Self {
            earthquake: 0.4,
            lightning: 0.4,
            flood: 0.2,
        }
    }
}

impl DisasterProbabilities {
    pub fn table(&self) -> [(DisasterKind, f32); 3] {
        [
            (DisasterKind::Earthquake, self.earthquake),
            (DisasterKind::Lightning, self.lightning),
            (DisasterKind::Flood, self.flood),
        ]
    }

    pub fn total(&self) -> f32 {
        self.earthquake + self.lightning + self.flood
    }
}

impl GameConfig {
    /// Reads and validates a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.match_timing;
        if timing.setup_sec < 0.0 || timing.hunt_sec < 0.0 || timing.showdown_sec < 0.0 {
            return Err(ConfigError::Invalid(
                "match durations must not be negative".to_string(),
            ));
        }

        let disasters = &self.disasters;
        if disasters.min_delay_sec < 0.0 || disasters.min_delay_sec > disasters.max_delay_sec {
            return Err(ConfigError::Invalid(format!(
                "disaster delay window [{}, {}] is invalid",
                disasters.min_delay_sec, disasters.max_delay_sec
            )));
        }

        let probabilities = &disasters.probabilities;
        if probabilities.table().iter().any(|(_, p)| *p < 0.0) {
            return Err(ConfigError::Invalid(
                "disaster probabilities must not be negative".to_string(),
            ));
        }
        if probabilities.total() > 1.0 + 1e-4 {
            return Err(ConfigError::Invalid(format!(
                "disaster probabilities sum to {}, expected at most 1.0",
                probabilities.total()
            )));
        }

        if self.killer.sense_cone_range < 0.0 {
            return Err(ConfigError::Invalid(
                "killer.senseConeRange must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
