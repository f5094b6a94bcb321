use std::path::PathBuf;

/// Errors produced by the benchmark pipeline
///
/// Which errors are fatal depends on where they surface: a source error aborts the whole pipeline,
/// a store error or a malformed workload only aborts the (policy, distribution) run it happened in.
/// Drift between the cache index and the backing store is not an error, it is repaired in place
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("record source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed workload file {}: {reason}", path.display())]
    MalformedWorkloadFile { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't serialise a record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
