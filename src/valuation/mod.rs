//! Valuation driver (C6, §4.4): composes the projector over a
//! portfolio and a scenario set, and reduces the resulting per-scenario
//! NPVs to summary statistics.

mod portfolio;
mod stats;

pub use portfolio::{scenario_portfolio_npv, scenario_portfolio_npv_checked, scenario_portfolio_npv_parallel};
pub use stats::{compute_statistics, Percentiles, ValuationResult};

use std::time::Instant;

use crate::assumptions::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::error::CoreError;
use crate::policy::Policy;
use crate::projection::Multipliers;
use crate::scenario::ScenarioSet;
use crate::worker::{self, WorkerPoolConfig};

/// Everything a run needs beyond the portfolio and scenario set:
/// assumption tables and stress multipliers (§4.4 inputs).
#[derive(Clone)]
pub struct ValuationInputs<'a> {
    pub policies: &'a [Policy],
    pub mortality: &'a MortalityTable,
    pub lapse: &'a LapseTable,
    pub expenses: &'a ExpenseAssumptions,
    pub multipliers: Multipliers,
}

/// Run a full valuation: fan the scenario range out across a worker
/// pool (C8), reduce to statistics (this module), and report wall-clock
/// time. This is the function the host-facing layer (C9) and the CLI
/// both call.
pub fn run_valuation(
    inputs: &ValuationInputs<'_>,
    scenarios: &ScenarioSet,
    pool_config: WorkerPoolConfig,
    retain_distribution: bool,
) -> Result<(ValuationResult, u64), CoreError> {
    if scenarios.size() == 0 && retain_distribution {
        return Err(CoreError::ZeroScenariosWithRetainedDistribution);
    }
    inputs.multipliers_non_negative()?;

    let start = Instant::now();
    let npvs = worker::run(
        inputs.policies,
        inputs.mortality,
        inputs.lapse,
        inputs.expenses,
        scenarios,
        &inputs.multipliers,
        pool_config,
    )?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let result = compute_statistics(npvs, retain_distribution)?;
    Ok((result, elapsed_ms))
}

impl ValuationInputs<'_> {
    fn multipliers_non_negative(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("mortality", self.multipliers.mortality),
            ("lapse", self.multipliers.lapse),
            ("expense", self.multipliers.expense),
        ] {
            if value < 0.0 {
                return Err(CoreError::NegativeMultiplier { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Gender, ProductType};
    use crate::scenario::{Scenario, ScenarioSet};

    fn sample_policy(id: u64) -> Policy {
        Policy {
            policy_id: id,
            age: 40,
            gender: Gender::Male,
            product_type: ProductType::Term,
            term: 10,
            sum_assured: 100_000.0,
            premium: 1_000.0,
        }
    }

    #[test]
    fn empty_portfolio_every_scenario_npv_is_zero() {
        let mortality = MortalityTable::from_flat(vec![0.01; 121 * 2]);
        let lapse = LapseTable::from_flat(vec![0.02; 50]);
        let expenses = ExpenseAssumptions {
            per_policy_acquisition: 0.0,
            per_policy_maintenance: 0.0,
            percent_of_premium: 0.0,
            per_claim: 0.0,
        };
        let inputs = ValuationInputs {
            policies: &[],
            mortality: &mortality,
            lapse: &lapse,
            expenses: &expenses,
            multipliers: Multipliers::default(),
        };
        let scenarios = ScenarioSet::new(vec![
            Scenario::from_rates([0.05; 50]),
            Scenario::from_rates([0.03; 50]),
        ]);
        let (result, _) = run_valuation(&inputs, &scenarios, WorkerPoolConfig::default(), true)
            .unwrap();
        assert_eq!(result.distribution, Some(vec![0.0, 0.0]));
        assert_eq!(result.mean, 0.0);
    }

    #[test]
    fn empty_scenario_set_yields_zeroed_statistics() {
        let mortality = MortalityTable::from_flat(vec![0.01; 121 * 2]);
        let lapse = LapseTable::from_flat(vec![0.02; 50]);
        let expenses = ExpenseAssumptions {
            per_policy_acquisition: 0.0,
            per_policy_maintenance: 0.0,
            percent_of_premium: 0.0,
            per_claim: 0.0,
        };
        let inputs = ValuationInputs {
            policies: &[sample_policy(1)],
            mortality: &mortality,
            lapse: &lapse,
            expenses: &expenses,
            multipliers: Multipliers::default(),
        };
        let scenarios = ScenarioSet::new(vec![]);
        let (result, _) = run_valuation(&inputs, &scenarios, WorkerPoolConfig::default(), false)
            .unwrap();
        assert_eq!(result.mean, 0.0);
        assert_eq!(result.scenario_count, 0);
    }

    #[test]
    fn negative_multiplier_is_rejected() {
        let mortality = MortalityTable::from_flat(vec![0.01; 121 * 2]);
        let lapse = LapseTable::from_flat(vec![0.02; 50]);
        let expenses = ExpenseAssumptions {
            per_policy_acquisition: 0.0,
            per_policy_maintenance: 0.0,
            percent_of_premium: 0.0,
            per_claim: 0.0,
        };
        let inputs = ValuationInputs {
            policies: &[sample_policy(1)],
            mortality: &mortality,
            lapse: &lapse,
            expenses: &expenses,
            multipliers: Multipliers {
                mortality: -1.0,
                lapse: 1.0,
                expense: 1.0,
            },
        };
        let scenarios = ScenarioSet::new(vec![Scenario::from_rates([0.05; 50])]);
        let err = run_valuation(&inputs, &scenarios, WorkerPoolConfig::default(), false)
            .unwrap_err();
        assert_eq!(err.code(), "E_NEGATIVE_MULTIPLIER");
    }

    #[test]
    fn worker_count_does_not_change_distribution() {
        let mortality = MortalityTable::from_flat(vec![0.01; 121 * 2]);
        let lapse = LapseTable::from_flat(vec![0.02; 50]);
        let expenses = ExpenseAssumptions {
            per_policy_acquisition: 5.0,
            per_policy_maintenance: 2.0,
            percent_of_premium: 0.01,
            per_claim: 20.0,
        };
        let policies: Vec<Policy> = (0..20).map(sample_policy).collect();
        let scenarios = ScenarioSet::generate(
            16,
            &crate::scenario::ScenarioParams {
                initial_rate: 0.03,
                drift: 0.0,
                volatility: 0.02,
                min_rate: 0.0,
                max_rate: 0.1,
            },
            7,
        );

        let inputs = ValuationInputs {
            policies: &policies,
            mortality: &mortality,
            lapse: &lapse,
            expenses: &expenses,
            multipliers: Multipliers::default(),
        };

        let (one, _) = run_valuation(
            &inputs,
            &scenarios,
            WorkerPoolConfig { worker_count: 1 },
            true,
        )
        .unwrap();
        let (four, _) = run_valuation(
            &inputs,
            &scenarios,
            WorkerPoolConfig { worker_count: 4 },
            true,
        )
        .unwrap();

        assert_eq!(one.distribution, four.distribution);
    }
}
