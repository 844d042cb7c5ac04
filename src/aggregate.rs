use std::{cmp::Ordering, collections::BTreeMap};

use crate::snapshot::ProcessRecord;

/// How process names are turned into merge keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergeKey {
    #[default]
    FullName,
    /// Group by the first `n` characters of the name.
    Prefix(usize),
}

impl MergeKey {
    pub fn from_prefix_len(len: Option<usize>) -> Self {
        len.map_or(Self::FullName, Self::Prefix)
    }

    pub fn key_for(self, name: &str) -> String {
        match self {
            Self::FullName => name.to_string(),
            Self::Prefix(n) => name.chars().take(n).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedRow {
    /// Merge key in merged mode, the process name otherwise.
    pub name: String,
    /// Smallest numeric pid among contributors.
    pub pid: String,
    /// State of the record `pid` refers to.
    pub state: char,
    pub mem_kb: u64,
    pub merged: bool,
    /// Contributors in ascending pid order. Empty unless `merged`.
    pub children: Vec<ProcessRecord>,
}

impl AggregatedRow {
    fn single(record: &ProcessRecord) -> Self {
        Self {
            name: record.name.clone(),
            pid: record.pid.clone(),
            state: record.state,
            mem_kb: record.mem_kb,
            merged: false,
            children: Vec::new(),
        }
    }

    pub fn process_count(&self) -> usize {
        if self.merged { self.children.len() } else { 1 }
    }
}

/// Numeric comparison of two decimal pid strings of any width. `None` when
/// either side is not a plain non-empty run of ASCII digits.
pub fn compare_pids(a: &str, b: &str) -> Option<Ordering> {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(a) || !digits(b) {
        return None;
    }
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    Some(a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
}

fn is_numeric_pid(pid: &str) -> bool {
    compare_pids(pid, pid).is_some()
}

// Numeric pids first in numeric order, then anything else lexicographically.
fn pid_order(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    match compare_pids(&a.pid, &b.pid) {
        Some(ord) => ord,
        None => is_numeric_pid(&b.pid)
            .cmp(&is_numeric_pid(&a.pid))
            .then_with(|| a.pid.cmp(&b.pid)),
    }
}

/// One row per distinct merge key.
pub fn aggregate(records: &[ProcessRecord], key: MergeKey) -> Vec<AggregatedRow> {
    let mut groups: BTreeMap<String, Vec<&ProcessRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key.key_for(&record.name)).or_default().push(record);
    }

    groups
        .into_iter()
        .filter_map(|(name, mut members)| {
            members.sort_by(|a, b| pid_order(a, b));
            // after sorting, a parsable pid (if any) comes first
            let representative = *members.first()?;
            let merged = members.len() > 1;
            Some(AggregatedRow {
                name,
                pid: representative.pid.clone(),
                state: representative.state,
                mem_kb: members
                    .iter()
                    .fold(0u64, |total, r| total.saturating_add(r.mem_kb)),
                merged,
                children: if merged {
                    members.into_iter().cloned().collect()
                } else {
                    Vec::new()
                },
            })
        })
        .collect()
}

/// One row per record.
pub fn unmerged(records: &[ProcessRecord]) -> Vec<AggregatedRow> {
    records.iter().map(AggregatedRow::single).collect()
}

pub fn build_rows(records: &[ProcessRecord], merge: bool, key: MergeKey) -> Vec<AggregatedRow> {
    if merge {
        aggregate(records, key)
    } else {
        unmerged(records)
    }
}
