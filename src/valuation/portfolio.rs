//! Portfolio-level aggregation of the single-policy projector, one
//! scenario at a time (C6 inner loop, §4.4).

use rayon::prelude::*;

use crate::assumptions::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::policy::Policy;
use crate::projection::{project, Multipliers};
use crate::scenario::Scenario;

/// Sum of every policy's NPV under a single scenario: `Sum_p project(p,
/// ..., scenario)`. This is a portfolio sum, not a mean (§4.4). The
/// kernel is commutative across policies, so reordering `policies` does
/// not change the result.
pub fn scenario_portfolio_npv(
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenario: &Scenario,
    multipliers: &Multipliers,
) -> f64 {
    policies
        .iter()
        .map(|policy| project(policy, mortality, lapse, expenses, scenario, multipliers))
        .sum()
}

/// Like [`scenario_portfolio_npv`], but stops at the first policy whose
/// projected NPV is non-finite and reports its index and value, instead
/// of folding it into an already-unrecoverable sum. This is what lets a
/// caller surface "the offending policy index" a runtime NaN/Inf error
/// requires (§7) — the plain portfolio sum alone cannot, once every
/// policy's contribution has been added together.
pub fn scenario_portfolio_npv_checked(
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenario: &Scenario,
    multipliers: &Multipliers,
) -> Result<f64, (usize, f64)> {
    let mut total = 0.0;
    for (policy_index, policy) in policies.iter().enumerate() {
        let npv = project(policy, mortality, lapse, expenses, scenario, multipliers);
        if !npv.is_finite() {
            return Err((policy_index, npv));
        }
        total += npv;
    }
    Ok(total)
}

/// Same as [`scenario_portfolio_npv`] but parallel across policies.
/// Used when a single scenario's portfolio is large enough that
/// per-policy parallelism pays for itself on top of the outer
/// per-scenario worker split (C8).
pub fn scenario_portfolio_npv_parallel(
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenario: &Scenario,
    multipliers: &Multipliers,
) -> f64 {
    policies
        .par_iter()
        .map(|policy| project(policy, mortality, lapse, expenses, scenario, multipliers))
        .sum()
}
