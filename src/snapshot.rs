//! Process snapshot sources.
//!
//! A snapshot is one pass over the process table. Individual processes that
//! vanish or cannot be parsed are skipped here and never reported upward;
//! only failure to enumerate the table at all is an error.

use std::{fs, io::ErrorKind, path::PathBuf};

use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::{
    config::{Config, SourceKind},
    error::{RecordError, SnapshotError},
};

/// State code used when the source does not report one.
pub const UNKNOWN_STATE: char = '?';

/// One process as sampled. Never mutated after the source produces it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: String,
    pub name: String,
    pub state: char,
    /// Anonymous resident memory in kB.
    pub mem_kb: u64,
}

pub trait SnapshotSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, SnapshotError>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Box<S> {
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, SnapshotError> {
        (**self).snapshot()
    }
}

pub fn source_for(config: &Config) -> Box<dyn SnapshotSource> {
    match config.source {
        SourceKind::Procfs => Box::new(ProcStatusSource::new(&config.proc_root)),
        SourceKind::Sysinfo => Box::new(SysinfoSource::new()),
    }
}

/// Reads `<root>/<pid>/status` for every numeric entry under `root`.
pub struct ProcStatusSource {
    root: PathBuf,
}

impl ProcStatusSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_record(&self, pid: &str) -> Result<ProcessRecord, RecordError> {
        let path = self.root.join(pid).join("status");
        let text = fs::read_to_string(&path).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
        parse_status(pid, &text)
    }
}

impl SnapshotSource for ProcStatusSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, SnapshotError> {
        let entries = fs::read_dir(&self.root).map_err(|source| SnapshotError::Unavailable {
            root: self.root.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let file_name = entry.file_name();
            let Some(pid) = file_name.to_str() else { continue };
            if !pid.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            match self.read_record(pid) {
                Ok(record) => records.push(record),
                Err(RecordError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    debug!(pid, "process exited before its status was read");
                }
                Err(err) => debug!(pid, %err, "skipping process"),
            }
        }
        if records.is_empty() {
            warn!(root = %self.root.display(), "snapshot contained no processes");
        }
        Ok(records)
    }
}

/// Parses the `Key:\tvalue` lines of a procfs status file. Missing fields
/// default (empty name, unknown state, zero memory); a present but malformed
/// memory field rejects the record.
pub fn parse_status(pid: &str, text: &str) -> Result<ProcessRecord, RecordError> {
    let mut record = ProcessRecord {
        pid: pid.to_string(),
        name: String::new(),
        state: UNKNOWN_STATE,
        mem_kb: 0,
    };
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => record.name = value.to_string(),
            "State" => record.state = value.chars().next().unwrap_or(UNKNOWN_STATE),
            "RssAnon" => record.mem_kb = parse_kb("RssAnon", value)?,
            _ => {}
        }
    }
    Ok(record)
}

fn parse_kb(field: &'static str, value: &str) -> Result<u64, RecordError> {
    value
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| RecordError::BadNumber {
            field,
            value: value.to_string(),
        })
}

/// Portable source backed by sysinfo. Reports total resident memory, since
/// the anonymous share is not exposed.
pub struct SysinfoSource {
    system: System,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for SysinfoSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessRecord>, SnapshotError> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        Ok(self
            .system
            .processes()
            .values()
            .map(|p| ProcessRecord {
                pid: p.pid().to_string(),
                name: p.name().to_string_lossy().to_string(),
                state: state_code(p.status()),
                mem_kb: p.memory() / 1024,
            })
            .collect())
    }
}

fn state_code(status: ProcessStatus) -> char {
    match status {
        ProcessStatus::Run => 'R',
        ProcessStatus::Sleep => 'S',
        ProcessStatus::Idle => 'I',
        ProcessStatus::Stop => 'T',
        ProcessStatus::Tracing => 't',
        ProcessStatus::Zombie => 'Z',
        ProcessStatus::Dead => 'X',
        ProcessStatus::UninterruptibleDiskSleep => 'D',
        _ => UNKNOWN_STATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const BASH_STATUS: &str = "Name:\tbash\nUmask:\t0022\nState:\tS (sleeping)\nTgid:\t10\nPid:\t10\nVmRSS:\t    5120 kB\nRssAnon:\t    1500 kB\nRssFile:\t    3620 kB\n";

    fn write_status(root: &Path, pid: &str, body: &str) {
        let dir = root.join(pid);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("status"), body).unwrap();
    }

    #[test]
    fn parses_name_state_and_anon_rss() {
        let record = parse_status("10", BASH_STATUS).unwrap();
        assert_eq!(
            record,
            ProcessRecord {
                pid: "10".into(),
                name: "bash".into(),
                state: 'S',
                mem_kb: 1500,
            }
        );
    }

    #[test]
    fn missing_fields_default() {
        // kernel threads carry no RssAnon line
        let record = parse_status("2", "Name:\tkthreadd\nState:\tS (sleeping)\n").unwrap();
        assert_eq!(record.mem_kb, 0);
        let record = parse_status("3", "").unwrap();
        assert_eq!(record.name, "");
        assert_eq!(record.state, UNKNOWN_STATE);
    }

    #[test]
    fn malformed_memory_rejects_record() {
        let err = parse_status("4", "Name:\tx\nRssAnon:\tlots kB\n").unwrap_err();
        assert!(matches!(err, RecordError::BadNumber { field: "RssAnon", .. }));
    }

    #[test]
    fn snapshot_skips_unreadable_and_non_numeric_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_status(dir.path(), "10", BASH_STATUS);
        write_status(dir.path(), "22", "Name:\tbash\nState:\tR (running)\nRssAnon:\t300 kB\n");
        write_status(dir.path(), "30", "Name:\tbroken\nRssAnon:\t-1 kB\n");
        write_status(dir.path(), "self", BASH_STATUS);
        // pid directory without a status file, as when a process exits mid-scan
        fs::create_dir_all(dir.path().join("41")).unwrap();
        fs::write(dir.path().join("uptime"), "1.0 2.0").unwrap();

        let mut source = ProcStatusSource::new(dir.path());
        let mut records = source.snapshot().unwrap();
        records.sort_by(|a, b| a.pid.cmp(&b.pid));
        let pids: Vec<_> = records.iter().map(|r| r.pid.as_str()).collect();
        assert_eq!(pids, ["10", "22"]);
        assert_eq!(records[1].state, 'R');
        assert_eq!(records[1].mem_kb, 300);
    }

    #[test]
    fn empty_root_is_an_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ProcStatusSource::new(dir.path());
        assert!(source.snapshot().unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nope");
        let mut source = ProcStatusSource::new(&root);
        let err = source.snapshot().unwrap_err();
        assert!(matches!(err, SnapshotError::Unavailable { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn sysinfo_source_sees_this_process() {
        let mut source = SysinfoSource::new();
        let records = source.snapshot().unwrap();
        let me = std::process::id().to_string();
        assert!(records.iter().any(|r| r.pid == me));
    }
}
