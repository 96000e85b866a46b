//! Top-level run configuration, loaded from TOML with one table per component.

use crate::error::Result;
use crate::link::LinkConfig;
use crate::memory::MemoryConfig;
use crate::secure_module::SecureModuleConfig;
use crate::workload::WorkloadConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub secure_module: SecureModuleConfig,
    pub link: LinkConfig,
    pub memory: MemoryConfig,
    pub workload: WorkloadConfig,
}

impl SimConfig {
    /// Parses and validates. Missing tables and keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.secure_module.validate()?;
        self.link.validate()?;
        self.memory.validate()?;
        self.workload.validate()
    }
}
