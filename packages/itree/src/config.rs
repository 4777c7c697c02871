//! Engine configuration.
//!
//! Budgets can be set in an `itree.toml` file or in the
//! `[package.metadata.itree]` table of a `Cargo.toml`, found by walking up
//! from a starting directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "itree.toml";

/// Budgets bounding one check or proof.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Total number of pair unfoldings and unmatched silent steps before
    /// giving up
    #[serde(default = "default_max_unfoldings")]
    pub max_unfoldings: usize,

    /// Maximum nesting of searches started by closures
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum consecutive unmatched silent steps on one side, on top of
    /// the unfolding budget
    #[serde(default = "default_max_skips")]
    pub max_skips: usize,

    /// Unfolding budget for each strong-equivalence side check made by the
    /// transitivity closure
    #[serde(default = "default_trans_fuel")]
    pub trans_fuel: usize,

    /// Remember refuted pairs for the rest of a check
    #[serde(default = "default_cache_failures")]
    pub cache_failures: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_unfoldings: default_max_unfoldings(),
            max_depth: default_max_depth(),
            max_skips: default_max_skips(),
            trans_fuel: default_trans_fuel(),
            cache_failures: default_cache_failures(),
        }
    }
}

fn default_max_unfoldings() -> usize {
    100_000
}

fn default_max_depth() -> usize {
    256
}

fn default_max_skips() -> usize {
    1_000_000
}

fn default_trans_fuel() -> usize {
    1_000
}

fn default_cache_failures() -> bool {
    true
}

impl EngineConfig {
    pub fn with_max_unfoldings(mut self, max_unfoldings: usize) -> Self {
        self.max_unfoldings = max_unfoldings;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_skips(mut self, max_skips: usize) -> Self {
        self.max_skips = max_skips;
        self
    }

    pub fn with_trans_fuel(mut self, trans_fuel: usize) -> Self {
        self.trans_fuel = trans_fuel;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("max_unfoldings", self.max_unfoldings),
            ("max_depth", self.max_depth),
            ("max_skips", self.max_skips),
            ("trans_fuel", self.trans_fuel),
        ];
        for (field, value) in budgets {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be positive"));
            }
        }
        Ok(())
    }
}

/// Whether a `Cargo.toml` carries a `[package.metadata.itree]` table.
fn has_metadata_section(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(value) = toml::from_str::<toml::Value>(&content) else {
        return false;
    };
    metadata_section(&value).is_some()
}

fn metadata_section(value: &toml::Value) -> Option<&toml::Value> {
    value.get("package")?.get("metadata")?.get("itree")
}

/// Find `itree.toml`, or a `Cargo.toml` with an itree metadata table,
/// starting from a path and walking up
pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?
    } else {
        start_path
    };

    loop {
        let dedicated = current.join(CONFIG_FILE_NAME);
        if dedicated.exists() {
            return Some(dedicated);
        }

        let manifest = current.join("Cargo.toml");
        if manifest.exists() && has_metadata_section(&manifest) {
            return Some(manifest);
        }

        current = current.parent()?;
    }
}

/// Load configuration from an `itree.toml` or a `Cargo.toml`
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let config: EngineConfig = if path.file_name().is_some_and(|name| name == "Cargo.toml") {
        let value: toml::Value = toml::from_str(&content).map_err(parse_error)?;
        let section = metadata_section(&value).ok_or_else(|| ConfigError::MissingSection {
            path: path.to_path_buf(),
        })?;
        section.clone().try_into().map_err(parse_error)?
    } else {
        toml::from_str(&content).map_err(parse_error)?
    };

    config.validate()?;
    Ok(config)
}

/// Load the nearest configuration above `start_path`, or the defaults when
/// there is none
pub fn discover_config(start_path: &Path) -> Result<EngineConfig, ConfigError> {
    match find_config_file(start_path) {
        Some(path) => {
            log::debug!("loading engine configuration from {}", path.display());
            load_config(&path)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "max_depth = 64\n").unwrap();

        assert_eq!(find_config_file(dir.path()), Some(config_path.clone()));

        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        assert_eq!(find_config_file(&subdir), Some(config_path));
    }

    #[test]
    fn test_manifest_without_section_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(
            nested.join("Cargo.toml"),
            "[package]\nname = \"inner\"\n",
        )
        .unwrap();

        assert_eq!(find_config_file(&nested), None);
    }

    #[test]
    fn test_load_config_from_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("Cargo.toml");

        let content = r#"
[package]
name = "demo"
version = "0.1.0"

[package.metadata.itree]
max_unfoldings = 500
max_skips = 20
"#;
        fs::write(&manifest, content).unwrap();

        let config = discover_config(dir.path()).unwrap();
        assert_eq!(config.max_unfoldings, 500);
        assert_eq!(config.max_skips, 20);
        assert_eq!(config.max_depth, default_max_depth());
        assert!(config.cache_failures);
    }

    #[test]
    fn test_load_config_rejects_zero_budget() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "trans_fuel = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "trans_fuel",
                ..
            }
        ));
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_depth = \"deep\"\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(discover_config(dir.path()).unwrap(), EngineConfig::default());
    }
}
