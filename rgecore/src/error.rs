//! Error types for reconstruction and binning.
//!
//! Every fallible operation in the crate returns one of these variants; the
//! message names the violated contract so it can be shown to the operator as is.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RgeError {
    /// Column name is not part of the bank schema.
    #[error("bank {bank} has no column named `{column}`")]
    InvalidColumn { bank: String, column: String },

    /// Row index past the rows loaded for the current event.
    #[error("row {index} requested from bank {bank}, which holds {nrows} rows")]
    IndexOutOfRange { bank: String, index: usize, nrows: usize },

    /// Event source delivered a column with a different primitive type than the schema declares.
    #[error("column `{column}` of bank {bank} should be {expected}, event source delivered {found}")]
    ColumnTypeMismatch {
        bank: String,
        column: String,
        expected: String,
        found: String,
    },

    /// Event source delivered columns whose lengths disagree with the row count.
    #[error("column `{column}` of bank {bank} holds {len} values for {nrows} rows")]
    RaggedBank {
        bank: String,
        column: String,
        len: usize,
        nrows: usize,
    },

    /// Typed rows requested from a bank of another kind.
    #[error("bank {bank} cannot be decoded as {expected} rows")]
    BankKindMismatch { bank: String, expected: String },

    #[error("invalid layer {layer} in the calorimeter bank, check bank integrity")]
    InvalidCalorimeterLayer { layer: i64 },

    #[error("invalid detector id {detector} in the cherenkov bank, check bank integrity")]
    InvalidCherenkovId { detector: i64 },

    #[error("invalid sector {sector} in the track bank, check bank integrity")]
    InvalidSector { sector: i64 },

    /// Degenerate angle conversion, e.g. a vertex sitting on the FMT reference plane.
    #[error("invalid angle conversion ({value} deg), angles should be finite and within [-180, 180]")]
    AngleConversion { value: f64 },

    #[error("tried to identify a particle with unsupported pid {pid}")]
    UnsupportedParticleId { pid: i32 },

    #[error("pid {pid} is not in the pid table")]
    PidNotFound { pid: i32 },

    #[error("no sampling fraction data available for run {run}")]
    NoCalibrationData { run: i64 },

    #[error("malformed sampling fraction source: {reason}")]
    BadCalibration { reason: String },

    #[error("no bin edges given for axis {axis}, edges for all five binning variables are required")]
    NoEdge { axis: String },

    #[error("axis {axis} has {len} edges, every axis needs at least a minimum and a maximum")]
    BadEdges { axis: String, len: usize },

    #[error("edges of axis {axis} should be strictly increasing, edge {position} ({value}) is not")]
    NonIncreasingEdges {
        axis: String,
        position: usize,
        value: f64,
    },

    #[error("malformed acceptance table: {reason}")]
    MalformedAcceptance { reason: String },

    #[error("event source failure: {0}")]
    EventSource(String),
}

pub type Result<T> = std::result::Result<T, RgeError>;

impl RgeError {
    /// True for failures that signal a violated detector-schema assumption.
    ///
    /// These abort the enclosing pass; everything else in the fusion stage is either a
    /// configuration problem (raised before processing) or skipped per candidate.
    pub fn is_corrupt_bank(&self) -> bool {
        matches!(
            self,
            RgeError::InvalidCalorimeterLayer { .. }
                | RgeError::InvalidCherenkovId { .. }
                | RgeError::InvalidSector { .. }
                | RgeError::ColumnTypeMismatch { .. }
                | RgeError::RaggedBank { .. }
        )
    }
}
