//! Policy record and the fixed 32-byte on-wire layout (§3, §6).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Gender of the policyholder, used as the second mortality-table axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Wire encoding: 0 = male, 1 = female (§6).
    pub fn from_wire(byte: u8) -> Self {
        if byte == 1 {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }
}

/// Product tag. The core implements term semantics only; other tags are
/// accepted and projected identically to `Term` until extended (§3, §4.3,
/// §9 design notes on avoiding virtual dispatch for surrender value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Term,
    Whole,
    Endowment,
}

impl ProductType {
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            1 => ProductType::Whole,
            2 => ProductType::Endowment,
            _ => ProductType::Term,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            ProductType::Term => 0,
            ProductType::Whole => 1,
            ProductType::Endowment => 2,
        }
    }

    /// Surrender value as a fraction of sum assured for policy year `k`.
    /// Term products surrender for 0; non-term tags are left at 0 in the
    /// core pending an explicit product contract (§9 Open Questions).
    pub fn surrender_value_fraction(self, _policy_year: u32) -> f64 {
        match self {
            ProductType::Term => 0.0,
            ProductType::Whole | ProductType::Endowment => 0.0,
        }
    }
}

/// Highest age the tables index; ages beyond this clamp (§3).
pub const MAX_AGE: u8 = 120;
/// Longest projection horizon the core supports (§3, §4.3).
pub const MAX_TERM: u32 = 50;

/// A single insurance contract (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Policy {
    /// Opaque integer, unique within a run.
    pub policy_id: u64,
    /// Age in \[0,120\] at valuation date; values above 120 clamp.
    pub age: u8,
    pub gender: Gender,
    pub product_type: ProductType,
    /// Projection horizon in years, clamped to 50 by the projector.
    pub term: u32,
    /// Non-negative death-benefit amount.
    pub sum_assured: f64,
    /// Non-negative annual premium paid at the start of each in-force year.
    pub premium: f64,
}

impl Policy {
    /// Validate the invariants of §3: non-negative financial fields. Ages
    /// beyond 120 and terms beyond 50 are clamped by the projector rather
    /// than rejected here — only financial-field sign is a hard error.
    pub fn validate(&self, index: usize) -> Result<(), CoreError> {
        if self.sum_assured < 0.0 {
            return Err(CoreError::InvalidPolicy {
                index,
                reason: format!("negative sum_assured: {}", self.sum_assured),
            });
        }
        if self.premium < 0.0 {
            return Err(CoreError::InvalidPolicy {
                index,
                reason: format!("negative premium: {}", self.premium),
            });
        }
        if !self.sum_assured.is_finite() || !self.premium.is_finite() {
            return Err(CoreError::InvalidPolicy {
                index,
                reason: "non-finite financial field".to_string(),
            });
        }
        Ok(())
    }

    /// Age clamped to the mortality table's domain, for a given projection
    /// year `k` (1-indexed). §4.3 step 2.
    pub fn attained_age(&self, k: u32) -> u8 {
        let raw = self.age as u32 + k.saturating_sub(1);
        raw.min(MAX_AGE as u32) as u8
    }

    /// Term clamped to the core's supported horizon (§4.3 edge cases).
    pub fn clamped_term(&self) -> u32 {
        self.term.min(MAX_TERM)
    }
}

/// On-wire size of a serialized Policy record, in bytes.
///
/// The distilled spec states both "24 bytes" and a field list
/// (`u64 + 3*u8 + 1 pad + u32 + f64 + f64`) that sums to 32 bytes; see
/// DESIGN.md for the resolution. This implementation uses 32 bytes,
/// matching the literal field layout at full `f64` monetary precision.
pub const POLICY_RECORD_SIZE: usize = 32;

impl Policy {
    /// Serialize to the fixed 32-byte little-endian on-wire form (§6).
    pub fn to_bytes(&self) -> [u8; POLICY_RECORD_SIZE] {
        let mut buf = [0u8; POLICY_RECORD_SIZE];
        buf[0..8].copy_from_slice(&self.policy_id.to_le_bytes());
        buf[8] = self.age;
        buf[9] = self.gender.to_wire();
        buf[10] = self.product_type.to_wire();
        buf[11] = 0; // padding
        buf[12..16].copy_from_slice(&self.term.to_le_bytes());
        buf[16..24].copy_from_slice(&self.sum_assured.to_le_bytes());
        buf[24..32].copy_from_slice(&self.premium.to_le_bytes());
        buf
    }

    /// Parse a policy from a 32-byte little-endian slice (§6).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != POLICY_RECORD_SIZE {
            return Err(CoreError::MalformedRecord {
                expected: POLICY_RECORD_SIZE,
                actual: bytes.len(),
            });
        }
        let policy_id = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let age = bytes[8];
        let gender = Gender::from_wire(bytes[9]);
        let product_type = ProductType::from_wire(bytes[10]);
        let term = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let sum_assured = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let premium = f64::from_le_bytes(bytes[24..32].try_into().unwrap());

        Ok(Policy {
            policy_id,
            age,
            gender,
            product_type,
            term,
            sum_assured,
            premium,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields() {
        let p = Policy {
            policy_id: 2000,
            age: 40,
            gender: Gender::Male,
            product_type: ProductType::Term,
            term: 20,
            sum_assured: 100_000.0,
            premium: 1_000.0,
        };
        let bytes = p.to_bytes();
        let back = Policy::from_bytes(&bytes).unwrap();
        assert_eq!(back.policy_id, p.policy_id);
        assert_eq!(back.age, p.age);
        assert_eq!(back.gender, p.gender);
        assert_eq!(back.product_type, p.product_type);
        assert_eq!(back.term, p.term);
        assert_eq!(back.sum_assured, p.sum_assured);
        assert_eq!(back.premium, p.premium);
    }

    #[test]
    fn malformed_size_is_rejected() {
        let err = Policy::from_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(err.code(), "E_MALFORMED_RECORD");
    }

    #[test]
    fn negative_premium_fails_validation() {
        let p = Policy {
            policy_id: 1,
            age: 40,
            gender: Gender::Male,
            product_type: ProductType::Term,
            term: 10,
            sum_assured: 1000.0,
            premium: -5.0,
        };
        assert!(p.validate(0).is_err());
    }

    #[test]
    fn attained_age_clamps_at_120() {
        let p = Policy {
            policy_id: 1,
            age: 115,
            gender: Gender::Female,
            product_type: ProductType::Term,
            term: 50,
            sum_assured: 1000.0,
            premium: 10.0,
        };
        assert_eq!(p.attained_age(1), 115);
        assert_eq!(p.attained_age(10), 120);
    }

    #[test]
    fn term_clamps_at_50() {
        let p = Policy {
            policy_id: 1,
            age: 30,
            gender: Gender::Male,
            product_type: ProductType::Term,
            term: 75,
            sum_assured: 1000.0,
            premium: 10.0,
        };
        assert_eq!(p.clamped_term(), 50);
    }
}
