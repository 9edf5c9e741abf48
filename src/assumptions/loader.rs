//! Logical CSV/JSON front-ends for the assumption tables (§6). Each
//! loader fills the fixed 121/50/4-slot on-wire layout from a sparse or
//! partial logical schema, clamping missing entries to the nearest
//! present one as §6 requires for mortality.

use std::collections::HashMap;
use std::path::Path;

use csv::Reader;
use serde::Deserialize;

use crate::error::CoreError;
use crate::policy::MAX_AGE;

use super::expenses::ExpenseAssumptions;
use super::lapse::LapseTable;
use super::mortality::MortalityTable;

const AGE_COUNT: usize = MAX_AGE as usize + 1;
const MAX_TERM: usize = 50;

/// For each index in `0..present.len()`, find the nearest index that is
/// `present`, breaking ties toward the lower index (§6: "missing ages
/// clamp to the nearest present age"). Present indices map to themselves.
/// Panics only if `present` is entirely `false`, which callers must rule
/// out beforehand.
fn nearest_present_source(present: &[bool]) -> Vec<usize> {
    let len = present.len();

    let mut prev = vec![None; len];
    let mut last = None;
    for (i, &is_present) in present.iter().enumerate() {
        if is_present {
            last = Some(i);
        }
        prev[i] = last;
    }

    let mut next = vec![None; len];
    let mut upcoming = None;
    for i in (0..len).rev() {
        if present[i] {
            upcoming = Some(i);
        }
        next[i] = upcoming;
    }

    (0..len)
        .map(|i| {
            if present[i] {
                return i;
            }
            match (prev[i], next[i]) {
                (Some(p), Some(n)) => {
                    if n - i < i - p {
                        n
                    } else {
                        p
                    }
                }
                (Some(p), None) => p,
                (None, Some(n)) => n,
                (None, None) => unreachable!("caller must ensure at least one present entry"),
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct MortalityRow {
    age: u16,
    #[serde(alias = "male_qx")]
    male: f64,
    #[serde(alias = "female_qx")]
    female: f64,
}

/// Load a mortality table from the logical `age, male, female` CSV
/// schema (§6). Ages may start or end short of `0..120`; missing ages
/// clamp to the nearest present age on either side.
pub fn load_mortality_csv<P: AsRef<Path>>(path: P) -> Result<MortalityTable, CoreError> {
    let mut reader = Reader::from_path(path.as_ref())
        .map_err(|_| CoreError::MissingTable("mortality"))?;

    let mut rows: Vec<(usize, f64, f64)> = Vec::new();
    for result in reader.deserialize() {
        let row: MortalityRow = result.map_err(|_| CoreError::MalformedRecord {
            expected: 3,
            actual: 0,
        })?;
        let age = (row.age as usize).min(MAX_AGE as usize);
        rows.push((age, row.male, row.female));
    }

    if rows.is_empty() {
        return Err(CoreError::MissingTable("mortality"));
    }
    rows.sort_by_key(|(age, _, _)| *age);

    let mut pairs = vec![(0.0, 0.0); AGE_COUNT];
    let mut present = vec![false; AGE_COUNT];
    for (age, male, female) in &rows {
        pairs[*age] = (*male, *female);
        present[*age] = true;
    }

    // clamp every missing age to its nearest present age, comparing
    // distance to the bracketing entries rather than always carrying the
    // lower one forward (§6).
    let source = nearest_present_source(&present);
    let original = pairs.clone();
    for (age, &src) in source.iter().enumerate() {
        pairs[age] = original[src];
    }

    Ok(MortalityTable::from_pairs(&pairs))
}

#[derive(Debug, Deserialize)]
struct LapseRow {
    year: u32,
    rate: f64,
}

/// Load a lapse table from the logical `year, rate` CSV schema (§6).
/// Missing years clamp to the nearest present year, same rule as
/// mortality.
pub fn load_lapse_csv<P: AsRef<Path>>(path: P) -> Result<LapseTable, CoreError> {
    let mut reader = Reader::from_path(path.as_ref())
        .map_err(|_| CoreError::MissingTable("lapse"))?;

    let mut by_year: HashMap<usize, f64> = HashMap::new();
    for result in reader.deserialize() {
        let row: LapseRow = result.map_err(|_| CoreError::MalformedRecord {
            expected: 2,
            actual: 0,
        })?;
        let year = (row.year as usize).clamp(1, MAX_TERM);
        by_year.insert(year, row.rate);
    }

    if by_year.is_empty() {
        return Err(CoreError::MissingTable("lapse"));
    }

    let mut rates = vec![0.0; MAX_TERM];
    let mut present = vec![false; MAX_TERM];
    for (year, rate) in &by_year {
        rates[*year - 1] = *rate;
        present[*year - 1] = true;
    }

    // Same nearest-present-year rule as mortality (§6).
    let source = nearest_present_source(&present);
    let original = rates.clone();
    for (i, &src) in source.iter().enumerate() {
        rates[i] = original[src];
    }

    Ok(LapseTable::from_flat(rates))
}

#[derive(Debug, Deserialize)]
struct ExpenseRow {
    parameter: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ExpenseJson {
    #[serde(alias = "perPolicyAcquisition")]
    per_policy_acquisition: f64,
    #[serde(alias = "perPolicyMaintenance")]
    per_policy_maintenance: f64,
    #[serde(alias = "percentOfPremium")]
    percent_of_premium: f64,
    #[serde(alias = "claimExpense")]
    claim_expense: f64,
}

/// Load expense assumptions from the logical `parameter,value` CSV
/// schema. Keys are `per_policy_acquisition`, `per_policy_maintenance`,
/// `percent_of_premium`, `claim_expense` (§6).
pub fn load_expenses_csv<P: AsRef<Path>>(path: P) -> Result<ExpenseAssumptions, CoreError> {
    let mut reader = Reader::from_path(path.as_ref())
        .map_err(|_| CoreError::MissingTable("expenses"))?;

    let mut values: HashMap<String, f64> = HashMap::new();
    for result in reader.deserialize() {
        let row: ExpenseRow = result.map_err(|_| CoreError::MalformedRecord {
            expected: 2,
            actual: 0,
        })?;
        values.insert(row.parameter, row.value);
    }

    let get = |key: &str| -> Result<f64, CoreError> {
        values
            .get(key)
            .copied()
            .ok_or(CoreError::MissingTable("expenses"))
    };

    Ok(ExpenseAssumptions {
        per_policy_acquisition: get("per_policy_acquisition")?,
        per_policy_maintenance: get("per_policy_maintenance")?,
        percent_of_premium: get("percent_of_premium")?,
        per_claim: get("claim_expense")?,
    })
}

/// Load expense assumptions from the logical JSON schema (snake or
/// camel keys), §6.
pub fn load_expenses_json(text: &str) -> Result<ExpenseAssumptions, CoreError> {
    let parsed: ExpenseJson = serde_json::from_str(text)
        .map_err(|_| CoreError::MissingTable("expenses"))?;
    Ok(ExpenseAssumptions {
        per_policy_acquisition: parsed.per_policy_acquisition,
        per_policy_maintenance: parsed.per_policy_maintenance,
        percent_of_premium: parsed.percent_of_premium,
        per_claim: parsed.claim_expense,
    })
}
