use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{
    CONFIG_ERR_INVALID_JSON, CONFIG_ERR_READ, CONFIG_ERR_SERIALIZE, CONFIG_ERR_SOURCE_MISSING,
    CONFIG_ERR_SOURCE_NOT_DIR, CONFIG_ERR_WRITE, Paths, expand_path, write_atomic,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(alias = "fromDir")]
    pub source_dir: PathBuf,
    #[serde(alias = "targetFile")]
    pub target_file: PathBuf,
    #[serde(default)]
    pub recursive_scan: bool,
}

impl Config {
    pub fn defaults(paths: &Paths) -> Self {
        Config {
            source_dir: paths.default_source_dir(),
            target_file: paths.default_target_file(),
            recursive_scan: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub source_dir: Option<String>,
    pub target_file: Option<String>,
    pub recursive_scan: Option<bool>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.source_dir.is_none() && self.target_file.is_none() && self.recursive_scan.is_none()
    }
}

pub fn load_config(paths: &Paths) -> Result<Option<Config>, String> {
    if !paths.config.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&paths.config)
        .map_err(|err| crate::msg2(CONFIG_ERR_READ, paths.config.display(), err))?;
    let config = serde_json::from_str(&contents)
        .map_err(|err| crate::msg2(CONFIG_ERR_INVALID_JSON, paths.config.display(), err))?;
    Ok(Some(config))
}

pub fn load_config_or_default(paths: &Paths) -> Result<Config, String> {
    Ok(load_config(paths)?.unwrap_or_else(|| Config::defaults(paths)))
}

pub fn save_config(paths: &Paths, config: &Config) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(config).map_err(|err| crate::msg1(CONFIG_ERR_SERIALIZE, err))?;
    write_atomic(&paths.config, format!("{json}\n").as_bytes())
        .map_err(|err| crate::msg1(CONFIG_ERR_WRITE, err))
}

pub fn apply_config_update(
    paths: &Paths,
    config: &Config,
    update: &ConfigUpdate,
) -> Result<Config, String> {
    let mut next = config.clone();
    if let Some(source_dir) = update.source_dir.as_deref() {
        next.source_dir = expand_path(source_dir, &paths.home);
    }
    if let Some(target_file) = update.target_file.as_deref() {
        next.target_file = expand_path(target_file, &paths.home);
    }
    if let Some(recursive) = update.recursive_scan {
        next.recursive_scan = recursive;
    }
    if !next.source_dir.exists() {
        return Err(crate::msg1(
            CONFIG_ERR_SOURCE_MISSING,
            next.source_dir.display(),
        ));
    }
    if !next.source_dir.is_dir() {
        return Err(crate::msg1(
            CONFIG_ERR_SOURCE_NOT_DIR,
            next.source_dir.display(),
        ));
    }
    Ok(next)
}
