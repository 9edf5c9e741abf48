//! Fixed-size worker pool: fans the scenario index range out across
//! threads and concatenates the resulting slabs in worker-index order
//! (C8, §4.6, §5).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::warn;

use crate::assumptions::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::error::CoreError;
use crate::policy::Policy;
use crate::projection::Multipliers;
use crate::scenario::ScenarioSet;
use crate::valuation::scenario_portfolio_npv_checked;

/// Pool sizing. Default: host-reported concurrency (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }
    }
}

/// Cooperative cancellation flag, checked between scenarios, never
/// within the projector itself (§4.6, §5). Clones share the same
/// underlying flag.
#[derive(Debug, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// One worker's contiguous slice of `[0, scenario_count)`, sized per
/// §4.6: `S / W` with the remainder distributed to the first `S mod W`
/// workers.
struct Chunk {
    start: usize,
    len: usize,
}

fn partition(scenario_count: usize, worker_count: usize) -> Vec<Chunk> {
    let base = scenario_count / worker_count;
    let remainder = scenario_count % worker_count;
    let mut chunks = Vec::with_capacity(worker_count);
    let mut start = 0;
    for w in 0..worker_count {
        let len = base + if w < remainder { 1 } else { 0 };
        chunks.push(Chunk { start, len });
        start += len;
    }
    chunks
}

#[allow(clippy::too_many_arguments)]
fn run_chunk(
    chunk: &Chunk,
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenarios: &ScenarioSet,
    multipliers: &Multipliers,
    cancel: &CancellationToken,
) -> Result<Vec<f64>, CoreError> {
    let mut slab = Vec::with_capacity(chunk.len);
    for offset in 0..chunk.len {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let scenario_index = chunk.start + offset;
        let scenario = scenarios.at(scenario_index);
        match scenario_portfolio_npv_checked(policies, mortality, lapse, expenses, scenario, multipliers) {
            Ok(npv) => slab.push(npv),
            Err((policy_index, value)) => {
                return Err(CoreError::NonFiniteResult {
                    policy_index,
                    scenario_index,
                    value,
                });
            }
        }
    }
    Ok(slab)
}

/// Crash-beyond-budget retry: a worker that panics is restarted once on
/// the same chunk; a second failure gives up (§7).
#[allow(clippy::too_many_arguments)]
fn run_worker_with_retry(
    worker_id: usize,
    chunk: &Chunk,
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenarios: &ScenarioSet,
    multipliers: &Multipliers,
    cancel: &CancellationToken,
) -> Result<Vec<f64>, CoreError> {
    let attempt = || run_chunk(chunk, policies, mortality, lapse, expenses, scenarios, multipliers, cancel);

    match panic::catch_unwind(AssertUnwindSafe(attempt)) {
        Ok(result) => result,
        Err(_) => {
            warn!("worker {worker_id} panicked, retrying chunk once");
            match panic::catch_unwind(AssertUnwindSafe(attempt)) {
                Ok(result) => result,
                Err(_) => Err(CoreError::WorkerFailed {
                    worker_id,
                    reason: "panicked on retry".to_string(),
                }),
            }
        }
    }
}

/// Fan `scenarios` out across `config.worker_count` threads, one
/// contiguous chunk each, and concatenate the resulting slabs in
/// worker-index order (§4.6). The scenario set must already be fully
/// materialized (generated once, single-threaded, by the driver) so
/// that results do not depend on worker count.
pub fn run(
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenarios: &ScenarioSet,
    multipliers: &Multipliers,
    config: WorkerPoolConfig,
) -> Result<Vec<f64>, CoreError> {
    run_cancellable(
        policies,
        mortality,
        lapse,
        expenses,
        scenarios,
        multipliers,
        config,
        &CancellationToken::new(),
        None,
    )
}

/// As [`run`], but with an explicit cancellation token and an optional
/// per-run timeout. In-flight workers complete their current scenario
/// before exiting on either signal (§4.6, §5).
#[allow(clippy::too_many_arguments)]
pub fn run_cancellable(
    policies: &[Policy],
    mortality: &MortalityTable,
    lapse: &LapseTable,
    expenses: &ExpenseAssumptions,
    scenarios: &ScenarioSet,
    multipliers: &Multipliers,
    config: WorkerPoolConfig,
    cancel: &CancellationToken,
    timeout_ms: Option<u64>,
) -> Result<Vec<f64>, CoreError> {
    if config.worker_count == 0 {
        return Err(CoreError::ZeroWorkerCount(0));
    }
    let scenario_count = scenarios.size();
    if scenario_count == 0 {
        return Ok(Vec::new());
    }
    let worker_count = config.worker_count.min(scenario_count);
    let chunks = partition(scenario_count, worker_count);

    let run_start = Instant::now();
    let timeout_thread = timeout_ms.map(|ms| {
        let cancel = cancel.clone();
        let deadline = run_start + Duration::from_millis(ms);
        thread::spawn(move || {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
            cancel.cancel();
        })
    });

    let mut slabs: Vec<Option<Vec<f64>>> = (0..chunks.len()).map(|_| None).collect();

    let run_result: Result<(), CoreError> = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(worker_id, chunk)| {
                let cancel = cancel.clone();
                scope.spawn(move || {
                    run_worker_with_retry(
                        worker_id, chunk, policies, mortality, lapse, expenses, scenarios,
                        multipliers, &cancel,
                    )
                })
            })
            .collect();

        for (worker_id, handle) in handles.into_iter().enumerate() {
            let outcome = handle.join().unwrap_or_else(|_| {
                Err(CoreError::WorkerFailed {
                    worker_id,
                    reason: "worker thread panicked outside the retry boundary".to_string(),
                })
            });
            slabs[worker_id] = Some(outcome?);
        }
        Ok(())
    });

    if let Some(handle) = timeout_thread {
        cancel.cancel(); // release the timeout thread promptly once the run is over
        let _ = handle.join();
    }

    match run_result {
        Ok(()) => {}
        Err(CoreError::Cancelled) if timeout_ms.is_some() => {
            return Err(CoreError::Timeout {
                elapsed_ms: run_start.elapsed().as_millis() as u64,
                limit_ms: timeout_ms.unwrap(),
            });
        }
        Err(other) => return Err(other),
    }

    let mut result = Vec::with_capacity(scenario_count);
    for slab in slabs {
        result.extend(slab.expect("every worker reports exactly one slab or the run already returned an error"));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Gender, ProductType};
    use crate::scenario::Scenario;

    fn policy(id: u64) -> Policy {
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

    fn flat_tables() -> (MortalityTable, LapseTable, ExpenseAssumptions) {
        (
            MortalityTable::from_flat(vec![0.01; 121 * 2]),
            LapseTable::from_flat(vec![0.02; 50]),
            ExpenseAssumptions {
                per_policy_acquisition: 0.0,
                per_policy_maintenance: 0.0,
                percent_of_premium: 0.0,
                per_claim: 0.0,
            },
        )
    }

    #[test]
    fn partition_sizes_differ_by_at_most_one() {
        let chunks = partition(10, 3);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn partition_covers_index_range_contiguously() {
        let chunks = partition(17, 4);
        let mut expected_start = 0;
        for chunk in &chunks {
            assert_eq!(chunk.start, expected_start);
            expected_start += chunk.len;
        }
        assert_eq!(expected_start, 17);
    }

    #[test]
    fn result_order_matches_scenario_index_regardless_of_worker_count() {
        let (mortality, lapse, expenses) = flat_tables();
        let policies = vec![policy(1), policy(2)];
        let scenarios = ScenarioSet::new(
            (0..20)
                .map(|i| Scenario::from_rates([0.01 + i as f64 * 0.001; 50]))
                .collect(),
        );

        let one = run(
            &policies,
            &mortality,
            &lapse,
            &expenses,
            &scenarios,
            &Multipliers::default(),
            WorkerPoolConfig { worker_count: 1 },
        )
        .unwrap();
        let six = run(
            &policies,
            &mortality,
            &lapse,
            &expenses,
            &scenarios,
            &Multipliers::default(),
            WorkerPoolConfig { worker_count: 6 },
        )
        .unwrap();

        assert_eq!(one, six);
    }

    #[test]
    fn empty_scenario_set_yields_empty_result() {
        let (mortality, lapse, expenses) = flat_tables();
        let scenarios = ScenarioSet::new(vec![]);
        let result = run(
            &[policy(1)],
            &mortality,
            &lapse,
            &expenses,
            &scenarios,
            &Multipliers::default(),
            WorkerPoolConfig::default(),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn non_finite_result_reports_the_real_policy_index() {
        let (mortality, lapse, _) = flat_tables();
        let expenses = ExpenseAssumptions {
            per_policy_acquisition: 0.0,
            per_policy_maintenance: 0.0,
            percent_of_premium: 0.0,
            per_claim: 0.0,
        };
        // rate = -1.0 makes the discount factor divide by zero for every policy;
        // policy index 1 is the one that should be reported as the offender.
        let policies = vec![policy(1), policy(2)];
        let scenarios = ScenarioSet::new(vec![Scenario::from_rates([0.0; 50]), Scenario::from_rates([-1.0; 50])]);
        let err = run(
            &policies,
            &mortality,
            &lapse,
            &expenses,
            &scenarios,
            &Multipliers::default(),
            WorkerPoolConfig { worker_count: 1 },
        )
        .unwrap_err();
        assert_eq!(err.code(), "E_NON_FINITE");
        match err {
            CoreError::NonFiniteResult {
                policy_index,
                scenario_index,
                ..
            } => {
                assert_eq!(policy_index, 0);
                assert_eq!(scenario_index, 1);
            }
            other => panic!("expected NonFiniteResult, got {other:?}"),
        }
    }

    #[test]
    fn zero_workers_is_rejected() {
        let (mortality, lapse, expenses) = flat_tables();
        let scenarios = ScenarioSet::new(vec![Scenario::from_rates([0.05; 50])]);
        let err = run(
            &[policy(1)],
            &mortality,
            &lapse,
            &expenses,
            &scenarios,
            &Multipliers::default(),
            WorkerPoolConfig { worker_count: 0 },
        )
        .unwrap_err();
        assert_eq!(err.code(), "E_ZERO_WORKERS");
    }

    #[test]
    fn pre_cancelled_token_aborts_with_cancelled_error() {
        let (mortality, lapse, expenses) = flat_tables();
        let scenarios = ScenarioSet::new(vec![Scenario::from_rates([0.05; 50]); 4]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_cancellable(
            &[policy(1)],
            &mortality,
            &lapse,
            &expenses,
            &scenarios,
            &Multipliers::default(),
            WorkerPoolConfig { worker_count: 2 },
            &cancel,
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "E_CANCELLED");
    }
}
