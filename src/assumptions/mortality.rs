//! Mortality table: a (age, gender) lookup of one-year death probability
//! (C2, §3, §4.1).

use crate::error::CoreError;
use crate::policy::{Gender, MAX_AGE};

const AGE_COUNT: usize = MAX_AGE as usize + 1; // ages 0..=120

/// Two-dimensional mortality lookup. Stored flat as `age*2 + gender` to
/// match the on-wire layout of §6 exactly (1,936 bytes = 121 ages x 2
/// genders x 8 bytes).
#[derive(Debug, Clone)]
pub struct MortalityTable {
    rates: Vec<f64>,
}

impl MortalityTable {
    /// Build from a flat rate array already in on-wire order.
    pub fn from_flat(rates: Vec<f64>) -> Self {
        debug_assert_eq!(rates.len(), AGE_COUNT * 2);
        Self { rates }
    }

    /// Build from per-age (male, female) pairs, as produced by the CSV
    /// loader.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let mut rates = vec![0.0; AGE_COUNT * 2];
        for (age, &(male, female)) in pairs.iter().enumerate().take(AGE_COUNT) {
            rates[age * 2] = male;
            rates[age * 2 + 1] = female;
        }
        Self { rates }
    }

    fn index(age: u8, gender: Gender) -> usize {
        let clamped = age.min(MAX_AGE) as usize;
        clamped * 2 + if gender == Gender::Female { 1 } else { 0 }
    }

    /// Base probability of death within one policy year for the given
    /// (age, gender). Out-of-range ages clamp to the table's extremes
    /// (§4.1).
    pub fn qx(&self, age: u8, gender: Gender) -> f64 {
        self.rates[Self::index(age, gender)]
    }

    /// Stressed lookup: `min(1.0, qx(age,gender) * multiplier)`. The cap
    /// is mandatory: probabilities must never exceed 1 (§4.1).
    pub fn qx_stressed(&self, age: u8, gender: Gender, multiplier: f64) -> f64 {
        (self.qx(age, gender) * multiplier).min(1.0)
    }

    /// On-wire 1,936-byte serialized form, `[age*2 + gender]` (§6).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.rates.len() * 8);
        for r in &self.rates {
            buf.extend_from_slice(&r.to_le_bytes());
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let expected = AGE_COUNT * 2 * 8;
        if bytes.len() != expected {
            return Err(CoreError::MalformedRecord {
                expected,
                actual: bytes.len(),
            });
        }
        let rates = bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Ok(Self { rates })
    }

    /// Reject tables with an entry outside [0,1] (§4.1 failure modes).
    pub fn validate(&self) -> Result<(), CoreError> {
        for (i, &r) in self.rates.iter().enumerate() {
            if !(0.0..=1.0).contains(&r) {
                return Err(CoreError::ProbabilityOutOfRange {
                    table: "mortality",
                    index: i,
                    value: r,
                });
            }
        }
        Ok(())
    }
}
