//! Host-facing entry points (C9, §4.7): the small surface a harness
//! drives through to load data, run a valuation, and read back results.
//!
//! The distilled spec frames this as a C-style surface (status code out,
//! rich message via a separate last-error accessor). In idiomatic Rust,
//! `Result<T, CoreError>` already carries both halves of that contract
//! atomically — `CoreError::code()` is the stable status code, `Display`
//! is the rich description — so every entry point below returns a
//! `Result` instead of threading a side-channel last-error slot. This
//! resolution is recorded in DESIGN.md.
//!
//! A [`Session`] is the opaque handle of §3's "host owns the run
//! handle" lifecycle: it owns the loaded policies and assumption
//! tables, and every [`RunHandle`] it hands out from
//! [`Session::run_valuation`] is bounded by the session's lifetime.
//! Multiple concurrent runs are just multiple `Session` values (§9).

use std::collections::HashMap;

use crate::assumptions::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::error::CoreError;
use crate::policy::{self, Policy};
use crate::projection::Multipliers;
use crate::scenario::{ScenarioParams, ScenarioSet};
use crate::valuation::{self, ValuationInputs, ValuationResult};
use crate::worker::WorkerPoolConfig;

/// Opaque token identifying one completed run within a [`Session`].
/// Accessors on an id the session doesn't recognise return
/// `CoreError::InvalidHandle` (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunHandle(u64);

struct CompletedRun {
    result: ValuationResult,
    execution_time_ms: u64,
}

/// A host session: the opaque handle that accumulates loaded policies
/// and assumption tables, then produces zero or more [`RunHandle`]s
/// (§3 lifecycle, §4.7).
#[derive(Default)]
pub struct Session {
    policies: Vec<Policy>,
    mortality: Option<MortalityTable>,
    lapse: Option<LapseTable>,
    expenses: Option<ExpenseAssumptions>,
    runs: HashMap<u64, CompletedRun>,
    next_run_id: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load serialized policy records (§6's 32-byte on-wire form).
    /// Returns the count loaded; duplicate ids warn rather than fail
    /// (§4.7, §7).
    pub fn load_policies(&mut self, bytes: &[u8]) -> Result<usize, CoreError> {
        let policies = policy::load_policies_from_bytes(bytes)?;
        let count = policies.len();
        self.policies = policies;
        Ok(count)
    }

    /// Load the serialized mortality table (1,936 bytes), validating
    /// every entry is a probability in \[0,1\] (§4.7).
    pub fn load_mortality(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let table = MortalityTable::from_bytes(bytes)?;
        table.validate()?;
        self.mortality = Some(table);
        Ok(())
    }

    /// Load the serialized lapse table (400 bytes), same validation
    /// rule as mortality (§4.7).
    pub fn load_lapse(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let table = LapseTable::from_bytes(bytes)?;
        table.validate()?;
        self.lapse = Some(table);
        Ok(())
    }

    /// Load the serialized expense constants (32 bytes), rejecting any
    /// negative constant (§4.7).
    pub fn load_expenses(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let expenses = ExpenseAssumptions::from_bytes(bytes)?;
        expenses.validate()?;
        self.expenses = Some(expenses);
        Ok(())
    }

    /// Run a valuation over the loaded portfolio and tables (§4.7).
    /// Generates the scenario set deterministically from
    /// `(scenario_count, seed, scenario_params)` before dispatching to
    /// the worker pool, so the result does not depend on
    /// `pool_config.worker_count` (§4.2, §4.6). Returns a handle the
    /// accessor methods below resolve against.
    #[allow(clippy::too_many_arguments)]
    pub fn run_valuation(
        &mut self,
        scenario_count: usize,
        seed: u64,
        scenario_params: &ScenarioParams,
        multipliers: Multipliers,
        retain_distribution: bool,
        pool_config: WorkerPoolConfig,
    ) -> Result<RunHandle, CoreError> {
        let mortality = self.mortality.as_ref().ok_or(CoreError::MissingTable("mortality"))?;
        let lapse = self.lapse.as_ref().ok_or(CoreError::MissingTable("lapse"))?;
        let expenses = self.expenses.as_ref().ok_or(CoreError::MissingTable("expenses"))?;

        for (index, p) in self.policies.iter().enumerate() {
            p.validate(index)?;
        }

        let scenarios = ScenarioSet::generate(scenario_count, scenario_params, seed);
        let inputs = ValuationInputs {
            policies: &self.policies,
            mortality,
            lapse,
            expenses,
            multipliers,
        };
        let (result, execution_time_ms) =
            valuation::run_valuation(&inputs, &scenarios, pool_config, retain_distribution)?;

        let id = self.next_run_id;
        self.next_run_id += 1;
        self.runs.insert(id, CompletedRun { result, execution_time_ms });
        Ok(RunHandle(id))
    }

    fn run(&self, handle: RunHandle) -> Result<&CompletedRun, CoreError> {
        self.runs.get(&handle.0).ok_or(CoreError::InvalidHandle)
    }

    pub fn result_mean(&self, handle: RunHandle) -> Result<f64, CoreError> {
        Ok(self.run(handle)?.result.mean)
    }

    pub fn result_std_dev(&self, handle: RunHandle) -> Result<f64, CoreError> {
        Ok(self.run(handle)?.result.std_dev)
    }

    pub fn result_percentile(&self, handle: RunHandle, p: f64) -> Result<f64, CoreError> {
        self.run(handle)?
            .result
            .percentile(p)
            .ok_or(CoreError::DistributionNotRetained)
    }

    pub fn result_cte95(&self, handle: RunHandle) -> Result<f64, CoreError> {
        Ok(self.run(handle)?.result.cte95)
    }

    pub fn result_scenario_count(&self, handle: RunHandle) -> Result<usize, CoreError> {
        Ok(self.run(handle)?.result.scenario_count)
    }

    pub fn result_execution_time_ms(&self, handle: RunHandle) -> Result<u64, CoreError> {
        Ok(self.run(handle)?.execution_time_ms)
    }

    /// Copy up to `dst.len()` entries of the retained distribution into
    /// `dst`, in scenario-index order, returning the count copied
    /// (§4.7 `distribution_copy(dst, n)`). Errors if the run didn't
    /// retain its distribution.
    pub fn distribution_copy(&self, handle: RunHandle, dst: &mut [f64]) -> Result<usize, CoreError> {
        let distribution = self
            .run(handle)?
            .result
            .distribution
            .as_ref()
            .ok_or(CoreError::DistributionNotRetained)?;
        let n = dst.len().min(distribution.len());
        dst[..n].copy_from_slice(&distribution[..n]);
        Ok(n)
    }
}
