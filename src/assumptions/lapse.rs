//! Lapse table: a one-year voluntary-termination probability indexed by
//! policy year (C2, §3, §4.1).

use crate::error::CoreError;
use crate::policy::MAX_TERM;

/// Lapse probability by policy year, `1..=MAX_TERM`. Stored 0-indexed
/// internally (`rates[year - 1]`).
#[derive(Debug, Clone)]
pub struct LapseTable {
    rates: Vec<f64>,
}

impl LapseTable {
    /// Build from a rate-per-year array already in on-wire order
    /// (`rates[0]` is year 1).
    pub fn from_flat(rates: Vec<f64>) -> Self {
        debug_assert_eq!(rates.len(), MAX_TERM as usize);
        Self { rates }
    }

    fn index(year: u32) -> usize {
        year.clamp(1, MAX_TERM) as usize - 1
    }

    /// Base lapse probability for `year`. Years outside `1..=50` clamp to
    /// the table's extremes (§4.1).
    pub fn lapse(&self, year: u32) -> f64 {
        self.rates[Self::index(year)]
    }

    /// Stressed lookup: `min(1.0, lapse(year) * multiplier)` (§4.1).
    pub fn lapse_stressed(&self, year: u32, multiplier: f64) -> f64 {
        (self.lapse(year) * multiplier).min(1.0)
    }

    /// On-wire 400-byte serialized form, `rates[0..50]` (§6).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.rates.len() * 8);
        for r in &self.rates {
            buf.extend_from_slice(&r.to_le_bytes());
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let expected = MAX_TERM as usize * 8;
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
                    table: "lapse",
                    index: i,
                    value: r,
                });
            }
        }
        Ok(())
    }
}
