//! Scenario store: per-year interest rate paths and their cumulative
//! discount factors (C3, §3, §4.2).

pub mod generator;

pub use generator::{generate, ScenarioParams};

use crate::policy::MAX_TERM;

const HORIZON: usize = MAX_TERM as usize; // 50

/// One interest-rate path: 50 per-year nominal rates plus the derived
/// end-of-year cumulative discount factors (§3, §4.2).
#[derive(Debug, Clone)]
pub struct Scenario {
    rates: [f64; HORIZON],
    discount_factors: [f64; HORIZON],
}

impl Scenario {
    /// Build from a 50-element rate path, eagerly computing the
    /// cumulative discount factors `D_n = Prod_{k=1..n} 1/(1+r_k)`.
    pub fn from_rates(rates: [f64; HORIZON]) -> Self {
        let mut discount_factors = [0.0; HORIZON];
        let mut cumulative = 1.0;
        for (n, &r) in rates.iter().enumerate() {
            cumulative *= 1.0 / (1.0 + r);
            discount_factors[n] = cumulative;
        }
        Self {
            rates,
            discount_factors,
        }
    }

    fn index(year: u32) -> usize {
        year.clamp(1, HORIZON as u32) as usize - 1
    }

    /// Per-year nominal interest rate, `year ∈ 1..50` (§4.2).
    pub fn rate(&self, year: u32) -> f64 {
        self.rates[Self::index(year)]
    }

    /// End-of-year cumulative discount factor `D_year` (§4.2). This is
    /// the sole supported discounting convention.
    pub fn cumulative_discount_factor(&self, year: u32) -> f64 {
        self.discount_factors[Self::index(year)]
    }

    /// On-wire 400-byte form: the 50 rates only, as for `LapseTable` —
    /// discount factors are derived, not serialized (§6 reuses the Lapse
    /// layout for rate paths).
    pub fn to_bytes(&self) -> [u8; HORIZON * 8] {
        let mut buf = [0u8; HORIZON * 8];
        for (i, r) in self.rates.iter().enumerate() {
            buf[i * 8..i * 8 + 8].copy_from_slice(&r.to_le_bytes());
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::error::CoreError> {
        let expected = HORIZON * 8;
        if bytes.len() != expected {
            return Err(crate::error::CoreError::MalformedRecord {
                expected,
                actual: bytes.len(),
            });
        }
        let mut rates = [0.0; HORIZON];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            rates[i] = f64::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(Self::from_rates(rates))
    }
}

/// An insertion-ordered collection of scenarios, indexed `0..size()`
/// (§3).
#[derive(Debug, Clone, Default)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn size(&self) -> usize {
        self.scenarios.len()
    }

    pub fn at(&self, index: usize) -> &Scenario {
        &self.scenarios[index]
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Generate `count` scenarios deterministically from `params` and
    /// `seed` (§4.2). Single-threaded and run once by the driver before
    /// any worker starts, so adding or removing workers never changes
    /// the resulting scenario set.
    pub fn generate(count: usize, params: &ScenarioParams, seed: u64) -> Self {
        Self::new(generator::generate(count, params, seed))
    }
}
