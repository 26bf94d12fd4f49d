//! skyscale.toml configuration parser.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::tag::CloudTag;
use crate::types::{CloudState, DEFAULT_INSTANCE_TYPE, Instance, InstanceState, InstanceType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkyscaleConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub clouds: Vec<CloudConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_timestep_minutes")]
    pub timestep_minutes: u32,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Retries after the first failed dataset-size lookup.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub tag: CloudTag,
    pub name: String,
    pub limit: usize,
    #[serde(default = "default_type_name")]
    pub default_type: String,
    #[serde(default)]
    pub cost_limit: f64,
    #[serde(default)]
    pub types: Vec<InstanceTypeConfig>,
    #[serde(default)]
    pub instances: Vec<InstanceSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceTypeConfig {
    pub name: String,
    pub price_increment: f64,
}

/// An instance that already exists when the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSeed {
    pub id: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    #[serde(default = "default_seed_state")]
    pub state: InstanceState,
}

/// Longest simulated span a run may cover: a century.
const MAX_SPAN_MINUTES: u64 = 100 * 366 * 24 * 60;

fn default_iterations() -> u32 {
    96
}

fn default_timestep_minutes() -> u32 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_type_name() -> String {
    DEFAULT_INSTANCE_TYPE.to_string()
}

fn default_seed_state() -> InstanceState {
    InstanceState::Inactive
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            timestep_minutes: default_timestep_minutes(),
            start_time: None,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl SkyscaleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SkyscaleConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject malformed settings before any run is created.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.simulation.iterations == 0 {
            return Err(ConfigError::InvalidSimulation(
                "iterations must be positive".to_string(),
            ));
        }
        if self.simulation.timestep_minutes == 0 {
            return Err(ConfigError::InvalidSimulation(
                "timestep_minutes must be positive".to_string(),
            ));
        }
        let span =
            u64::from(self.simulation.iterations) * u64::from(self.simulation.timestep_minutes);
        if span > MAX_SPAN_MINUTES {
            return Err(ConfigError::InvalidSimulation(format!(
                "{} ticks of {} minutes exceed the longest simulated span",
                self.simulation.iterations, self.simulation.timestep_minutes
            )));
        }
        if let Some(start) = self.simulation.start_time {
            // span is bounded above, so the cast is lossless
            if start.checked_add_signed(Duration::minutes(span as i64)).is_none() {
                return Err(ConfigError::InvalidSimulation(
                    "run would end past the last representable time".to_string(),
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for cloud in &self.clouds {
            if !seen.insert(cloud.tag) {
                return Err(ConfigError::DuplicateCloud(cloud.tag.to_string()));
            }
            cloud.validate()?;
        }
        Ok(())
    }

    pub fn tags(&self) -> Vec<CloudTag> {
        self.clouds.iter().map(|c| c.tag).collect()
    }

    /// Fresh cloud states for one run, keyed by tag.
    pub fn cloud_states(&self) -> BTreeMap<CloudTag, CloudState> {
        self.clouds.iter().map(|c| (c.tag, c.to_state())).collect()
    }

    /// A three-cloud setup matching the home cluster plus two providers.
    pub fn scaffold() -> Self {
        let cloud = |tag: CloudTag, name: &str, limit: usize, default_type: &str, price: f64| CloudConfig {
            tag,
            name: name.to_string(),
            limit,
            default_type: default_type.to_string(),
            cost_limit: 1000.0,
            types: vec![InstanceTypeConfig {
                name: default_type.to_string(),
                price_increment: price,
            }],
            instances: Vec::new(),
        };
        Self {
            simulation: SimulationConfig::default(),
            estimator: EstimatorConfig::default(),
            clouds: vec![
                cloud(CloudTag::Aws, "aws", 10, "c5-4xl", 0.68),
                cloud(CloudTag::Csc, "cpouta", 4, DEFAULT_INSTANCE_TYPE, 0.35),
                cloud(CloudTag::Metapipe, "stallo", 2, DEFAULT_INSTANCE_TYPE, 0.0),
            ],
        }
    }
}

impl CloudConfig {
    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidCloud {
            cloud: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.limit == 0 {
            return Err(self.invalid("limit must be positive"));
        }
        if self.cost_limit < 0.0 {
            return Err(self.invalid("cost_limit must not be negative"));
        }
        if let Some(t) = self.types.iter().find(|t| t.price_increment < 0.0) {
            return Err(self.invalid(format!("type {} has a negative price", t.name)));
        }
        if !self.types.iter().any(|t| t.name == self.default_type) {
            return Err(self.invalid(format!(
                "default type {} is not in the catalog",
                self.default_type
            )));
        }
        if self.instances.len() > self.limit {
            return Err(self.invalid("more seeded instances than the limit allows"));
        }
        let mut ids = BTreeSet::new();
        for seed in &self.instances {
            if !self.types.iter().any(|t| t.name == seed.instance_type) {
                return Err(self.invalid(format!(
                    "seeded instance {} has unknown type {}",
                    seed.id, seed.instance_type
                )));
            }
            if seed.id.is_empty() || !ids.insert(seed.id.as_str()) {
                return Err(self.invalid(format!("seeded instance id {:?} is not unique", seed.id)));
            }
        }
        Ok(())
    }

    pub fn to_state(&self) -> CloudState {
        CloudState {
            name: self.name.clone(),
            limit: self.limit,
            accept_tag: self.tag,
            default_type: self.default_type.clone(),
            types: self
                .types
                .iter()
                .map(|t| {
                    (
                        t.name.clone(),
                        InstanceType {
                            name: t.name.clone(),
                            price_increment: t.price_increment,
                        },
                    )
                })
                .collect(),
            active_instances: self
                .instances
                .iter()
                .map(|s| Instance {
                    id: s.id.clone(),
                    instance_type: s.instance_type.clone(),
                    state: s.state,
                })
                .collect(),
            cost_limit: self.cost_limit,
            money_used: 0.0,
        }
    }
}
