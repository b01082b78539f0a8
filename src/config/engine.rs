// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use super::error::ConfigError;
use crate::error::{invalid, Result};
use crate::instrument::normalize::DEFAULT_TARGET_PEAK_DBFS;
use crate::instrument::{Dynamics, InstrumentKind, InstrumentProfile};

/// Default frames per callback, about 23ms at 44.1kHz.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct EngineConfig {
    /// Base directory for sample resources. Relative paths are resolved
    /// against the directory of the config file.
    #[serde(default = "default_samples_path")]
    samples_path: PathBuf,

    /// The output device name. Names starting with "mock" select the mock device.
    #[serde(default = "default_output_device")]
    output_device: String,

    /// Frames per output callback.
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,

    /// The peak loudest-tier samples are normalised to.
    #[serde(default = "default_target_peak_dbfs")]
    target_peak_dbfs: f32,

    /// Per-instrument overrides, keyed by instrument name.
    #[serde(default)]
    instruments: HashMap<String, InstrumentOverride>,
}

/// Overrides for a built-in instrument profile.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct InstrumentOverride {
    /// Dynamics thresholds replacing the built-in tiers. Tier names are kept
    /// when the count matches, otherwise they become "t0", "t1", ...
    dynamics: Option<Vec<u8>>,
}

fn default_samples_path() -> PathBuf {
    PathBuf::from("samples")
}

fn default_output_device() -> String {
    "default".to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_target_peak_dbfs() -> f32 {
    DEFAULT_TARGET_PEAK_DBFS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            samples_path: default_samples_path(),
            output_device: default_output_device(),
            buffer_size: default_buffer_size(),
            target_peak_dbfs: default_target_peak_dbfs(),
            instruments: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Loads and validates the engine configuration from a file.
    pub fn load(path: &Path) -> Result<EngineConfig> {
        let mut config = Config::builder()
            .add_source(File::from(path))
            .build()
            .and_then(|config| config.try_deserialize::<EngineConfig>())
            .map_err(|source| ConfigError::File {
                path: path.to_path_buf(),
                source,
            })?;

        if config.samples_path.is_relative() {
            if let Some(parent) = path.parent() {
                config.samples_path = parent.join(&config.samples_path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates the engine configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<EngineConfig> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .map_err(ConfigError::from)?
            .try_deserialize::<EngineConfig>()
            .map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return invalid("buffer_size must be greater than zero");
        }
        if !self.target_peak_dbfs.is_finite() || self.target_peak_dbfs > 0.0 {
            return invalid(format!(
                "target_peak_dbfs must be at most 0, got {}",
                self.target_peak_dbfs
            ));
        }
        for name in self.instruments.keys() {
            if !InstrumentKind::ALL.iter().any(|kind| kind.name() == name) {
                return invalid(format!("unknown instrument '{}'", name));
            }
        }
        for kind in InstrumentKind::ALL {
            self.profile(kind)?;
        }
        Ok(())
    }

    pub fn samples_path(&self) -> &Path {
        &self.samples_path
    }

    pub fn output_device(&self) -> &str {
        &self.output_device
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn target_peak_dbfs(&self) -> f32 {
        self.target_peak_dbfs
    }

    /// The profile for an instrument with any overrides applied.
    pub fn profile(&self, kind: InstrumentKind) -> Result<InstrumentProfile> {
        let profile = kind.profile();
        let thresholds = match self
            .instruments
            .get(kind.name())
            .and_then(|o| o.dynamics.as_ref())
        {
            Some(thresholds) => thresholds,
            None => return Ok(profile),
        };

        let dynamics = if thresholds.len() == profile.dynamics.levels().len() {
            let mut levels = profile.dynamics.levels().to_vec();
            levels
                .iter_mut()
                .zip(thresholds)
                .for_each(|(level, threshold)| level.threshold = *threshold);
            Dynamics::new(levels)?
        } else {
            Dynamics::from_thresholds(thresholds)?
        };
        Ok(profile.with_dynamics(dynamics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_yaml("output_device: mock").unwrap();
        assert_eq!(config.samples_path(), Path::new("samples"));
        assert_eq!(config.output_device(), "mock");
        assert_eq!(config.buffer_size(), DEFAULT_BUFFER_SIZE);
        assert_eq!(config.target_peak_dbfs(), -0.1);
        assert_eq!(
            config.profile(InstrumentKind::Piano).unwrap(),
            InstrumentKind::Piano.profile()
        );
    }

    #[test]
    fn test_dynamics_override() {
        let yaml = r#"
            buffer_size: 512
            target_peak_dbfs: -1.0
            instruments:
              piano:
                dynamics: [40, 80, 100]
              marimba:
                dynamics: [60, 100]
        "#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.buffer_size(), 512);

        let piano = config.profile(InstrumentKind::Piano).unwrap();
        assert_eq!(piano.dynamics.thresholds(), vec![40, 80, 100]);
        // Tier names, and so sample file names, are kept.
        assert_eq!(piano.resource(60, 1), "piano/mf/C4");

        let marimba = config.profile(InstrumentKind::Marimba).unwrap();
        assert_eq!(marimba.dynamics.tier_count(), 2);
        assert_eq!(marimba.resource(60, 0), "marimba/C4");
    }

    #[test]
    fn test_invalid_values() {
        for yaml in [
            "buffer_size: 0",
            "target_peak_dbfs: 1.5",
            "instruments: { piano: { dynamics: [50, 40, 100] } }",
            "instruments: { banjo: { dynamics: [100] } }",
        ] {
            assert!(
                matches!(EngineConfig::from_yaml(yaml), Err(Error::InvalidArgument(_))),
                "{}",
                yaml
            );
        }
        assert!(matches!(
            EngineConfig::from_yaml("buffer_size: lots"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_resolves_samples_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "samples_path: sounds\noutput_device: mock\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.samples_path(), dir.path().join("sounds"));

        assert!(matches!(
            EngineConfig::load(&dir.path().join("missing.yaml")),
            Err(Error::Config(ConfigError::File { .. }))
        ));
    }
}
