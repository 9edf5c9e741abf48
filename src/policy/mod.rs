//! Policy data structures and loading (C1, §3).

mod data;
pub mod loader;

pub use data::{Gender, Policy, ProductType, MAX_AGE, MAX_TERM, POLICY_RECORD_SIZE};
pub use loader::{
    load_policies_csv, load_policies_from_bytes, policies_to_bytes,
};
