use crate::options::V2_MIN_API;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const PROJECT_DIR_VAR: &str = "LIV_PROJECT_DIR";
pub const DUMP_CMD_VAR: &str = "LIV_DUMP_CMD";
pub const PREVIEW_CMD_VAR: &str = "LIV_PREVIEW_CMD";
pub const API_LEVEL_VAR: &str = "LIV_API_LEVEL";

/// Host settings read from `LIV_*` variables. CLI flags override each field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig {
    pub project_dir: PathBuf,
    pub dump_cmd: Option<String>,
    pub preview_cmd: Option<String>,
    pub api_level: u32,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            dump_cmd: None,
            preview_cmd: None,
            api_level: V2_MIN_API,
        }
    }
}

impl InspectorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(PROJECT_DIR_VAR) {
            config.project_dir = PathBuf::from(dir);
        }
        config.dump_cmd = get(DUMP_CMD_VAR);
        config.preview_cmd = get(PREVIEW_CMD_VAR);
        if let Some(level) = get(API_LEVEL_VAR) {
            config.api_level = level
                .trim()
                .parse()
                .with_context(|| format!("{API_LEVEL_VAR} must be an integer, got {level:?}"))?;
        }
        Ok(config)
    }
}
