//! Nested stochastic life-insurance valuation engine.
//!
//! This library provides:
//! - Policy and assumption-table data models with binary and CSV/JSON
//!   loaders
//! - A deterministic, seeded interest-rate scenario generator
//! - A single-policy, single-scenario NPV projector (the hot path)
//! - A portfolio/scenario valuation driver that reduces to distributional
//!   statistics (mean, percentiles, CTE95)
//! - A fixed-size worker pool that fans the scenario range out across
//!   threads with deterministic, worker-count-independent results
//! - A shared-memory layout (`memory`) that lets a host hand policies,
//!   tables, and per-worker result slabs to workers without copying
//! - Host-facing entry points (`host`) wrapping the above behind an
//!   opaque session/handle surface

pub mod assumptions;
pub mod error;
pub mod host;
pub mod memory;
pub mod policy;
pub mod projection;
pub mod scenario;
pub mod valuation;
pub mod worker;

// Re-export commonly used types
pub use error::{CoreError, CoreResult};
pub use host::{RunHandle, Session};
pub use memory::SharedRegion;
pub use policy::Policy;
pub use projection::{project, project_detailed, Multipliers};
pub use scenario::{Scenario, ScenarioSet};
pub use valuation::{run_valuation, ValuationInputs, ValuationResult};
pub use worker::WorkerPoolConfig;
