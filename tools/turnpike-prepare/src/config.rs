//! Speed profile: node penalties and the turn cost model
//!
//! Profiles are TOML documents:
//!
//! ```toml
//! traffic_signal_penalty_ds = 20
//! u_turn_penalty_ds = 200
//!
//! [turn_penalty]
//! turn_penalty_ds = 75
//! turn_bias = 1.075
//! ```
//!
//! Without a `[turn_penalty]` table every turn costs nothing beyond the node
//! penalties.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ebg::{NoTurnPenalty, SigmoidTurnPenalty, TurnPenaltyConfig, TurnPenaltyFunction};
use crate::graph::EdgeWeight;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("cannot read profile {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed profile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid profile: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeedProfile {
    /// Added when passing a traffic light, in deciseconds
    pub traffic_signal_penalty_ds: EdgeWeight,
    /// Added to every turn classified as a U-turn, in deciseconds
    pub u_turn_penalty_ds: EdgeWeight,
    #[serde(default)]
    pub turn_penalty: Option<TurnPenaltyConfig>,
}

impl SpeedProfile {
    /// car.lua: 2s per traffic light, 20s per U-turn
    pub fn car() -> Self {
        Self {
            traffic_signal_penalty_ds: 20,
            u_turn_penalty_ds: 200,
            turn_penalty: Some(TurnPenaltyConfig::car()),
        }
    }

    pub fn bike() -> Self {
        Self {
            traffic_signal_penalty_ds: 20,
            u_turn_penalty_ds: 200,
            turn_penalty: Some(TurnPenaltyConfig::bike()),
        }
    }

    /// Pedestrians turn for free
    pub fn foot() -> Self {
        Self {
            traffic_signal_penalty_ds: 20,
            u_turn_penalty_ds: 20,
            turn_penalty: None,
        }
    }

    /// Built-in profile by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "car" => Some(Self::car()),
            "bike" => Some(Self::bike()),
            "foot" => Some(Self::foot()),
            _ => None,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ProfileError> {
        let profile: SpeedProfile = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// A preset name (`car`, `bike`, `foot`) or the path of a TOML profile
    pub fn resolve(name_or_path: &str) -> Result<Self, ProfileError> {
        match Self::preset(name_or_path) {
            Some(profile) => Ok(profile),
            None => Self::load(name_or_path),
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.traffic_signal_penalty_ds < 0 {
            return Err(ProfileError::Invalid(format!(
                "traffic_signal_penalty_ds must not be negative, got {}",
                self.traffic_signal_penalty_ds
            )));
        }
        if self.u_turn_penalty_ds < 0 {
            return Err(ProfileError::Invalid(format!(
                "u_turn_penalty_ds must not be negative, got {}",
                self.u_turn_penalty_ds
            )));
        }
        if let Some(turn) = &self.turn_penalty {
            if !turn.turn_bias.is_finite() || turn.turn_bias <= 0.0 {
                return Err(ProfileError::Invalid(format!(
                    "turn_bias must be positive, got {}",
                    turn.turn_bias
                )));
            }
        }
        Ok(())
    }

    pub fn has_turn_penalty_function(&self) -> bool {
        self.turn_penalty.is_some()
    }

    pub fn turn_penalty_function(&self) -> Box<dyn TurnPenaltyFunction> {
        match self.turn_penalty {
            Some(config) => Box::new(SigmoidTurnPenalty::new(config)),
            None => Box::new(NoTurnPenalty),
        }
    }
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self::car()
    }
}
