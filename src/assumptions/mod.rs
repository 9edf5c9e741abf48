//! Assumption tables: mortality, lapse, and expenses (C2, §3, §4.1).

mod expenses;
mod lapse;
pub mod loader;
mod mortality;

pub use expenses::ExpenseAssumptions;
pub use lapse::LapseTable;
pub use mortality::MortalityTable;

pub use loader::{load_expenses_csv, load_expenses_json, load_lapse_csv, load_mortality_csv};
