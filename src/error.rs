use std::{io, path::PathBuf};

use thiserror::Error;

/// The process table could not be enumerated at all. Fatal to the run.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot open process root {}: {source}", root.display())]
    Unavailable {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One process could not be read. Swallowed inside the snapshot source.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("field {field} has unparsable value {value:?}")]
    BadNumber { field: &'static str, value: String },
}
