//! Single-policy, single-scenario projector (C5, §4.3): the hot path.

mod cashflows;
mod engine;
mod state;

pub use cashflows::YearRow;
pub use engine::{project, project_detailed, Multipliers};
pub use state::ProjectionState;
