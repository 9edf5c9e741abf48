//! Batch CLI driver for the nested-stochastic valuation engine (§6).
//!
//! Loads a portfolio and assumption tables from the logical CSV/JSON
//! schemas, generates a scenario set, runs a valuation across a worker
//! pool, and writes the summary statistics (and optionally the full
//! distribution) to a JSON output file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use nested_stochastic_valuation::assumptions::{load_expenses_csv, load_expenses_json, load_lapse_csv, load_mortality_csv};
use nested_stochastic_valuation::policy::load_policies_csv;
use nested_stochastic_valuation::projection::Multipliers;
use nested_stochastic_valuation::scenario::ScenarioParams;
use nested_stochastic_valuation::valuation::ValuationInputs;
use nested_stochastic_valuation::worker::WorkerPoolConfig;
use nested_stochastic_valuation::{run_valuation, CoreError, ScenarioSet};

/// Nested-stochastic life-insurance valuation engine: portfolio x
/// scenario NPV projection with a parallel worker pool (§6 CLI surface).
#[derive(Parser, Debug)]
#[command(name = "valuation", version, about)]
struct Cli {
    /// Path to the policy portfolio CSV (policy_id, age, gender,
    /// sum_assured, premium, term, product_type).
    #[arg(long)]
    policies: PathBuf,

    /// Path to the mortality table CSV (age, male, female).
    #[arg(long)]
    mortality: PathBuf,

    /// Path to the lapse table CSV (year, rate).
    #[arg(long)]
    lapse: PathBuf,

    /// Path to the expense assumptions file. CSV (parameter,value) or
    /// JSON, selected by file extension.
    #[arg(long)]
    expenses: PathBuf,

    /// Number of scenarios to generate.
    #[arg(long = "scenarios")]
    scenario_count: usize,

    /// 64-bit seed for the scenario generator (§4.2, §6).
    #[arg(long)]
    seed: u64,

    /// Path to write the output JSON summary to.
    #[arg(long)]
    output: PathBuf,

    /// Initial nominal interest rate for the scenario generator.
    #[arg(long = "initial-rate", default_value_t = 0.03)]
    initial_rate: f64,

    /// Annual drift of the GBM rate process.
    #[arg(long, default_value_t = 0.0)]
    drift: f64,

    /// Annual volatility of the GBM rate process.
    #[arg(long, default_value_t = 0.015)]
    volatility: f64,

    /// Lower clamp bound on generated rates.
    #[arg(long = "min-rate", default_value_t = 0.0)]
    min_rate: f64,

    /// Upper clamp bound on generated rates.
    #[arg(long = "max-rate", default_value_t = 0.20)]
    max_rate: f64,

    /// Mortality stress multiplier (1.0 is the identity, §4.1).
    #[arg(long = "mortality-mult", default_value_t = 1.0)]
    mortality_mult: f64,

    /// Lapse stress multiplier.
    #[arg(long = "lapse-mult", default_value_t = 1.0)]
    lapse_mult: f64,

    /// Expense stress multiplier.
    #[arg(long = "expense-mult", default_value_t = 1.0)]
    expense_mult: f64,

    /// Number of worker threads; defaults to host-reported concurrency.
    #[arg(long)]
    workers: Option<usize>,

    /// Retain the full S-scenario distribution in the output JSON.
    #[arg(long, default_value_t = false)]
    retain_distribution: bool,
}

#[derive(Serialize)]
struct PercentilesJson {
    p50: f64,
    p75: f64,
    p90: f64,
    p95: f64,
    p99: f64,
}

#[derive(Serialize)]
struct StatisticsJson {
    mean: f64,
    #[serde(rename = "stdDev")]
    std_dev: f64,
    percentiles: PercentilesJson,
    cte95: f64,
}

#[derive(Serialize)]
struct OutputJson {
    statistics: StatisticsJson,
    #[serde(rename = "executionTimeMs")]
    execution_time_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution: Option<Vec<f64>>,
}

fn load_expenses(path: &std::path::Path) -> Result<nested_stochastic_valuation::assumptions::ExpenseAssumptions, CoreError> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let text = fs::read_to_string(path).map_err(|_| CoreError::MissingTable("expenses"))?;
        load_expenses_json(&text)
    } else {
        load_expenses_csv(path)
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!("loading policies from {}", cli.policies.display());
    let policies = load_policies_csv(&cli.policies).context("loading policies")?;

    info!("loading mortality table from {}", cli.mortality.display());
    let mortality = load_mortality_csv(&cli.mortality).context("loading mortality table")?;
    mortality.validate().context("validating mortality table")?;

    info!("loading lapse table from {}", cli.lapse.display());
    let lapse = load_lapse_csv(&cli.lapse).context("loading lapse table")?;
    lapse.validate().context("validating lapse table")?;

    info!("loading expense assumptions from {}", cli.expenses.display());
    let expenses = load_expenses(&cli.expenses).context("loading expense assumptions")?;
    expenses.validate().context("validating expense assumptions")?;

    for (index, policy) in policies.iter().enumerate() {
        policy.validate(index).context("validating portfolio")?;
    }

    let scenario_params = ScenarioParams {
        initial_rate: cli.initial_rate,
        drift: cli.drift,
        volatility: cli.volatility,
        min_rate: cli.min_rate,
        max_rate: cli.max_rate,
    };
    info!(
        "generating {} scenarios from seed {} (initial_rate={}, drift={}, volatility={})",
        cli.scenario_count, cli.seed, cli.initial_rate, cli.drift, cli.volatility
    );
    let scenarios = ScenarioSet::generate(cli.scenario_count, &scenario_params, cli.seed);

    let multipliers = Multipliers {
        mortality: cli.mortality_mult,
        lapse: cli.lapse_mult,
        expense: cli.expense_mult,
    };
    let pool_config = cli
        .workers
        .map(|worker_count| WorkerPoolConfig { worker_count })
        .unwrap_or_default();

    let inputs = ValuationInputs {
        policies: &policies,
        mortality: &mortality,
        lapse: &lapse,
        expenses: &expenses,
        multipliers,
    };

    info!(
        "running valuation: {} policies x {} scenarios across {} workers",
        policies.len(),
        scenarios.size(),
        pool_config.worker_count
    );
    let (result, execution_time_ms) = run_valuation(&inputs, &scenarios, pool_config, cli.retain_distribution)
        .context("running valuation")?;
    info!("valuation finished in {execution_time_ms} ms");

    let output = OutputJson {
        statistics: StatisticsJson {
            mean: result.mean,
            std_dev: result.std_dev,
            percentiles: PercentilesJson {
                p50: result.percentiles.p50,
                p75: result.percentiles.p75,
                p90: result.percentiles.p90,
                p95: result.percentiles.p95,
                p99: result.percentiles.p99,
            },
            cte95: result.cte95,
        },
        execution_time_ms,
        scenario_count: result.scenario_count,
        distribution: result.distribution,
    };

    let json = serde_json::to_string_pretty(&output).context("serializing output JSON")?;
    fs::write(&cli.output, json).with_context(|| format!("writing output to {}", cli.output.display()))?;
    info!("wrote results to {}", cli.output.display());

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
