//! Error taxonomy for the valuation kernel (§7 of the specification).
//!
//! Errors are grouped by kind, not by call site: input-validation and
//! configuration errors are raised before any projection starts and are
//! always recoverable at the boundary; runtime errors abort an in-flight
//! run and discard partial results.

use thiserror::Error;

/// Unified error type returned by every public entry point in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // -- Input-validation errors --------------------------------------------
    #[error("malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    #[error("probability out of range [0,1] for {table} at index {index}: {value}")]
    ProbabilityOutOfRange {
        table: &'static str,
        index: usize,
        value: f64,
    },

    #[error("negative expense constant {field}: {value}")]
    NegativeExpenseConstant { field: &'static str, value: f64 },

    #[error("invalid policy at row {index}: {reason}")]
    InvalidPolicy { index: usize, reason: String },

    // -- Configuration errors -------------------------------------------------
    #[error("negative multiplier for {name}: {value}")]
    NegativeMultiplier { name: &'static str, value: f64 },

    #[error("scenario count is zero but retain_distribution was requested")]
    ZeroScenariosWithRetainedDistribution,

    #[error("worker count must be at least 1, got {0}")]
    ZeroWorkerCount(usize),

    #[error("missing required table: {0}")]
    MissingTable(&'static str),

    #[error("shared region size {requested} exceeds configured maximum {maximum}")]
    RegionTooLarge { requested: usize, maximum: usize },

    // -- Runtime errors ---------------------------------------------------------
    #[error("non-finite value produced for policy index {policy_index} under scenario index {scenario_index}: {value}")]
    NonFiniteResult {
        policy_index: usize,
        scenario_index: usize,
        value: f64,
    },

    #[error("worker {worker_id} failed after retry: {reason}")]
    WorkerFailed { worker_id: usize, reason: String },

    #[error("run timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    #[error("run cancelled")]
    Cancelled,

    // -- Host / transport errors --------------------------------------------
    #[error("shared region magic mismatch: expected {expected:#x}, got {actual:#x}")]
    MagicMismatch { expected: u32, actual: u32 },

    #[error("shared region version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("failed to attach to shared region: {0}")]
    AttachFailed(String),

    #[error("serialization buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    // -- Host entry-point errors --------------------------------------------
    #[error("invalid run handle")]
    InvalidHandle,

    #[error("distribution was not retained for this run")]
    DistributionNotRetained,
}

/// A stable, machine-readable code for each error kind, for host harnesses
/// that want to branch on error category without matching the full enum.
impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::MalformedRecord { .. } => "E_MALFORMED_RECORD",
            CoreError::ProbabilityOutOfRange { .. } => "E_PROBABILITY_RANGE",
            CoreError::NegativeExpenseConstant { .. } => "E_NEGATIVE_EXPENSE",
            CoreError::InvalidPolicy { .. } => "E_INVALID_POLICY",
            CoreError::NegativeMultiplier { .. } => "E_NEGATIVE_MULTIPLIER",
            CoreError::ZeroScenariosWithRetainedDistribution => "E_ZERO_SCENARIOS_RETAIN",
            CoreError::ZeroWorkerCount(_) => "E_ZERO_WORKERS",
            CoreError::MissingTable(_) => "E_MISSING_TABLE",
            CoreError::RegionTooLarge { .. } => "E_REGION_TOO_LARGE",
            CoreError::NonFiniteResult { .. } => "E_NON_FINITE",
            CoreError::WorkerFailed { .. } => "E_WORKER_FAILED",
            CoreError::Timeout { .. } => "E_TIMEOUT",
            CoreError::Cancelled => "E_CANCELLED",
            CoreError::MagicMismatch { .. } => "E_MAGIC_MISMATCH",
            CoreError::VersionMismatch { .. } => "E_VERSION_MISMATCH",
            CoreError::AttachFailed(_) => "E_ATTACH_FAILED",
            CoreError::BufferTooSmall { .. } => "E_BUFFER_TOO_SMALL",
            CoreError::InvalidHandle => "E_INVALID_HANDLE",
            CoreError::DistributionNotRetained => "E_DISTRIBUTION_NOT_RETAINED",
        }
    }

    /// True for errors that abort an in-flight run rather than being
    /// rejected before projection starts.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            CoreError::NonFiniteResult { .. }
                | CoreError::WorkerFailed { .. }
                | CoreError::Timeout { .. }
                | CoreError::Cancelled
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
