use std::fmt;

use serde::{Deserialize, Serialize};

use super::map::{MapTopology, TopologyError};

pub const DEFAULT_IMPOSTOR_PROBABILITY: f64 = 0.2;
/// 达到该人数后新玩家一律为船员。
pub const DEFAULT_IMPOSTOR_CAP: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default = "default_impostor_probability")]
    pub impostor_probability: f64,
    #[serde(default = "default_impostor_cap")]
    pub impostor_cap: usize,
    #[serde(default)]
    pub topology: MapTopology,
}

fn default_impostor_probability() -> f64 {
    DEFAULT_IMPOSTOR_PROBABILITY
}

fn default_impostor_cap() -> usize {
    DEFAULT_IMPOSTOR_CAP
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            impostor_probability: DEFAULT_IMPOSTOR_PROBABILITY,
            impostor_cap: DEFAULT_IMPOSTOR_CAP,
            topology: MapTopology::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ProbabilityOutOfRange(f64),
    Topology(TopologyError),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ProbabilityOutOfRange(value) => {
                write!(f, "impostor probability {value} is outside [0, 1]")
            }
            ConfigError::Topology(error) => write!(f, "invalid map: {error}"),
            ConfigError::Parse(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<TopologyError> for ConfigError {
    fn from(error: TopologyError) -> Self {
        ConfigError::Topology(error)
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig =
            serde_json::from_str(json).map_err(|error| ConfigError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_topology(mut self, topology: MapTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.impostor_probability) {
            return Err(ConfigError::ProbabilityOutOfRange(
                self.impostor_probability,
            ));
        }
        self.topology.validate()?;
        Ok(())
    }
}
