use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("statistics file `{path}` does not exist")]
    Missing { path: PathBuf },

    #[error("statistics file `{path}` has length {actual}, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("statistics file `{path}` has length {actual}, need at least {required}")]
    Undersized {
        path: PathBuf,
        required: u64,
        actual: u64,
    },

    #[error("failed to map statistics file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to flush mapped statistics file `{path}`: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
