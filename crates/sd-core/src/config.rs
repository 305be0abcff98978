use crate::build_status::BUILD_EXPIRATION_SECS;
use crate::error::ConfigError;
use chrono::TimeDelta;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".snapdiff/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Age after which an unfinished build is shown as expired.
    pub build_expiration_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            build_expiration_secs: BUILD_EXPIRATION_SECS,
        }
    }
}

impl EngineConfig {
    /// Reads the config at `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(ConfigError::Invalid {
                    message: format!("{}: {err}", path.display()),
                });
            }
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Invalid {
            message: err.to_string(),
        })?;
        let secs = config.build_expiration_secs;
        if secs <= 0 || TimeDelta::try_seconds(secs).is_none() {
            return Err(ConfigError::Invalid {
                message: format!("build_expiration_secs must be a positive duration, got {secs}"),
            });
        }
        Ok(config)
    }

    /// Saturates for values `parse` would have rejected.
    pub fn expiration(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.build_expiration_secs).unwrap_or(TimeDelta::MAX)
    }
}
