//! Single-policy, single-scenario NPV projection: the yearly
//! decrement/cash-flow/discount loop (§4.3).

use crate::assumptions::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::policy::Policy;
use crate::scenario::Scenario;

use super::cashflows::YearRow;
use super::state::ProjectionState;

/// Stress multipliers applied uniformly across a run. `1.0` on every
/// field is the identity: results equal the unstressed baseline to
/// within ULP (§8).
#[derive(Debug, Clone, Copy)]
pub struct Multipliers {
    pub mortality: f64,
    pub lapse: f64,
    pub expense: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            mortality: 1.0,
            lapse: 1.0,
            expense: 1.0,
        }
    }
}

/// Compute the NPV of one policy under one scenario (§4.3). Pure: no
/// global state, no I/O, no allocation.
pub fn project(
    policy: &Policy,
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenario: &Scenario,
    multipliers: &Multipliers,
) -> f64 {
    let term = policy.clamped_term();
    if term == 0 {
        return 0.0;
    }

    let mut state = ProjectionState::new();
    for k in 1..=term {
        if state.is_exhausted() {
            break;
        }
        let lives_start = state.lives;

        let q = mortality.qx_stressed(policy.attained_age(k), policy.gender, multipliers.mortality);
        let expected_deaths = lives_start * q;
        let survivors_after_death = lives_start - expected_deaths;

        let l = lapse.lapse_stressed(k, multipliers.lapse);
        let expected_lapses = survivors_after_death * l;
        let lives_end = survivors_after_death - expected_lapses;

        let premium_income = lives_start * policy.premium;
        let death_benefits = -expected_deaths * policy.sum_assured;
        let surrender_benefits =
            -expected_lapses * policy.product_type.surrender_value_fraction(k) * policy.sum_assured;

        let mut expense_outgo = 0.0;
        if k == 1 {
            expense_outgo += lives_start * expenses.per_policy_acquisition * multipliers.expense;
        }
        expense_outgo += lives_start * expenses.per_policy_maintenance * multipliers.expense;
        expense_outgo += lives_start * policy.premium * expenses.percent_of_premium * multipliers.expense;
        expense_outgo += expected_deaths * expenses.per_claim * multipliers.expense;

        let net_cash_flow = premium_income + death_benefits + surrender_benefits - expense_outgo;
        let pv_contribution = net_cash_flow * scenario.cumulative_discount_factor(k);

        state.npv += pv_contribution;
        state.lives = lives_end;
    }

    state.npv
}

/// Like [`project`], but also returns the 50 (or fewer, if `term < 50`
/// or lives are exhausted early) per-year detail rows. Orthogonal to
/// the scalar hot path: callers that don't need detail should call
/// [`project`] instead (§4.3 output contract).
pub fn project_detailed(
    policy: &Policy,
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenario: &Scenario,
    multipliers: &Multipliers,
) -> (f64, Vec<YearRow>) {
    let term = policy.clamped_term();
    if term == 0 {
        return (0.0, Vec::new());
    }

    let mut state = ProjectionState::new();
    let mut rows = Vec::with_capacity(term as usize);

    for k in 1..=term {
        if state.is_exhausted() {
            break;
        }
        let lives_start = state.lives;

        let q = mortality.qx_stressed(policy.attained_age(k), policy.gender, multipliers.mortality);
        let expected_deaths = lives_start * q;
        let survivors_after_death = lives_start - expected_deaths;

        let l = lapse.lapse_stressed(k, multipliers.lapse);
        let expected_lapses = survivors_after_death * l;
        let lives_end = survivors_after_death - expected_lapses;

        let premium_income = lives_start * policy.premium;
        let death_benefits = -expected_deaths * policy.sum_assured;
        let surrender_benefits =
            -expected_lapses * policy.product_type.surrender_value_fraction(k) * policy.sum_assured;

        let mut expense_outgo = 0.0;
        if k == 1 {
            expense_outgo += lives_start * expenses.per_policy_acquisition * multipliers.expense;
        }
        expense_outgo += lives_start * expenses.per_policy_maintenance * multipliers.expense;
        expense_outgo += lives_start * policy.premium * expenses.percent_of_premium * multipliers.expense;
        expense_outgo += expected_deaths * expenses.per_claim * multipliers.expense;

        let net_cash_flow = premium_income + death_benefits + surrender_benefits - expense_outgo;
        let pv_contribution = net_cash_flow * scenario.cumulative_discount_factor(k);

        rows.push(YearRow {
            year: k,
            lives_start,
            premium: premium_income,
            expected_deaths,
            expected_lapses,
            expenses: expense_outgo,
            pv_contribution,
        });

        state.npv += pv_contribution;
        state.lives = lives_end;
    }

    (state.npv, rows)
}
