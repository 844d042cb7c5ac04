use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{Result, eyre};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, project_dirs};

pub const LOG_ENV: &str = "MEMTOP_LOG";

/// Where log output goes, if anywhere. The terminal belongs to the UI, so
/// logs always go to a file.
pub fn log_path(config: &Config) -> Option<PathBuf> {
    if !config.log.enabled {
        return None;
    }
    config
        .log
        .file
        .clone()
        .or_else(|| project_dirs().map(|d| d.data_dir().join("memtop.log")))
}

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(config: &Config) -> Result<Option<WorkerGuard>> {
    let Some(path) = log_path(config) else {
        return Ok(None);
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("log path {} has no file name", path.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("installing log subscriber: {err}"))?;
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_file_wins() {
        let mut config = Config::default();
        config.log.file = Some(PathBuf::from("/var/tmp/m.log"));
        assert_eq!(log_path(&config), Some(PathBuf::from("/var/tmp/m.log")));
    }

    #[test]
    fn disabled_means_no_file() {
        let mut config = Config::default();
        config.log.enabled = false;
        config.log.file = Some(PathBuf::from("/var/tmp/m.log"));
        assert_eq!(log_path(&config), None);
        assert!(init(&config).unwrap().is_none());
    }
}
