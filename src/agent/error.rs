use std::path::PathBuf;

use crate::mapping;
use crate::session;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required mapped statistics file is missing or mis-sized. Fatal at
    /// construction; no partial set of regions is retained.
    #[error("required statistics resource unavailable: {0}")]
    ResourceUnavailable(#[from] mapping::Error),

    /// Directory listing failed during a session-file scan. Unrecoverable
    /// for the current poll invocation.
    #[error("failed to scan instance directory `{path}`: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    SessionFileRead(#[from] session::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Aggregate of every failure observed while releasing the agent's
/// resources. Each resource is attempted exactly once regardless of how many
/// of the others fail.
#[derive(Debug, thiserror::Error)]
#[error("failed to release {} monitoring resource(s)", .failures.len())]
pub struct CloseError {
    pub failures: Vec<mapping::Error>,
}
