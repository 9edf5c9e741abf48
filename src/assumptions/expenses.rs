//! Expense assumptions: four non-negative constants applied each
//! in-force policy year (C2, §3, §4.1, §6 — 32-byte section).

use crate::error::CoreError;

/// Per-policy expense loads. All four fields are annual amounts or
/// fractions applied uniformly across the portfolio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpenseAssumptions {
    /// Flat amount charged once, in the first in-force year.
    pub per_policy_acquisition: f64,
    /// Flat amount charged every in-force year.
    pub per_policy_maintenance: f64,
    /// Fraction of premium charged every in-force year.
    pub percent_of_premium: f64,
    /// Flat amount charged on each claim (death or surrender).
    pub per_claim: f64,
}

impl ExpenseAssumptions {
    /// Validate every constant is non-negative (§4.1 failure modes).
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("per_policy_acquisition", self.per_policy_acquisition),
            ("per_policy_maintenance", self.per_policy_maintenance),
            ("percent_of_premium", self.percent_of_premium),
            ("per_claim", self.per_claim),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(CoreError::NegativeExpenseConstant {
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// A stressed copy with all four constants scaled uniformly (§4.1).
    pub fn stressed(&self, multiplier: f64) -> Self {
        Self {
            per_policy_acquisition: self.per_policy_acquisition * multiplier,
            per_policy_maintenance: self.per_policy_maintenance * multiplier,
            percent_of_premium: self.percent_of_premium * multiplier,
            per_claim: self.per_claim * multiplier,
        }
    }

    /// On-wire 32-byte form, four little-endian f64 fields in declaration
    /// order (§6).
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[0..8].copy_from_slice(&self.per_policy_acquisition.to_le_bytes());
        buf[8..16].copy_from_slice(&self.per_policy_maintenance.to_le_bytes());
        buf[16..24].copy_from_slice(&self.percent_of_premium.to_le_bytes());
        buf[24..32].copy_from_slice(&self.per_claim.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != 32 {
            return Err(CoreError::MalformedRecord {
                expected: 32,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            per_policy_acquisition: f64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            per_policy_maintenance: f64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            percent_of_premium: f64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            per_claim: f64::from_le_bytes(bytes[24..32].try_into().unwrap()),
        })
    }
}
