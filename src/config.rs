use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{Result, WrapErr, ensure};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::aggregate::MergeKey;

pub const CONFIG_ENV: &str = "MEMTOP_CONFIG";

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Procfs,
    Sysinfo,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sample_interval_ms: u64,
    pub input_poll_ms: u64,
    /// Merge processes on this many leading name characters instead of the
    /// full name.
    pub merge_prefix_len: Option<usize>,
    pub start_merged: bool,
    pub source: SourceKind,
    pub proc_root: PathBuf,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub enabled: bool,
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            input_poll_ms: 10,
            merge_prefix_len: None,
            start_merged: true,
            source: SourceKind::Procfs,
            proc_root: PathBuf::from("/proc"),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".into(),
            file: None,
        }
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "memtop")
}

impl Config {
    /// `$MEMTOP_CONFIG`, else `config.toml` in the per-user config directory.
    pub fn location() -> Option<PathBuf> {
        env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| project_dirs().map(|d| d.config_dir().join("config.toml")))
    }

    pub fn load() -> Result<Self> {
        match Self::location() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).wrap_err_with(|| format!("reading {}", path.display()));
            }
        };
        Self::from_toml(&text).wrap_err_with(|| format!("loading {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.input_poll_ms > 0, "input_poll_ms must be positive");
        ensure!(
            self.sample_interval_ms >= self.input_poll_ms,
            "sample_interval_ms ({}) is shorter than input_poll_ms ({})",
            self.sample_interval_ms,
            self.input_poll_ms
        );
        ensure!(
            self.merge_prefix_len != Some(0),
            "merge_prefix_len must be at least 1"
        );
        Ok(())
    }

    pub fn merge_key(&self) -> MergeKey {
        MergeKey::from_prefix_len(self.merge_prefix_len)
    }
}
