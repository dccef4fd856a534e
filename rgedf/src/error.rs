use std::path::PathBuf;

use rgecore::error::RgeError;
use thiserror::Error;

/// Failures of the data layer and the processing pipelines.
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Rge(#[from] RgeError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not write summary: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("output file {0} already exists, remove it first")]
    OutputExists(PathBuf),

    #[error("no beam energy known for run {run}, pass it explicitly")]
    UnknownBeamEnergy { run: i64 },

    #[error("could not extract a run number from {0}, expected <text><run number>.<extension>")]
    BadFilename(String),

    #[error("number of FMT layers should be 0, 2 or 3, got {0}")]
    InvalidFmtLayers(u8),

    #[error("FMT layers required but event store {0} holds no FMT::Tracks bank")]
    NoFmtBank(PathBuf),

    #[error("corrupt bank payload of {bank} in event {event}: {reason}")]
    CorruptPayload { bank: String, event: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, DataError>;

impl From<DataError> for RgeError {
    /// Failures crossing the event source boundary are reported as event source errors.
    fn from(err: DataError) -> Self {
        match err {
            DataError::Rge(e) => e,
            other => RgeError::EventSource(other.to_string()),
        }
    }
}
