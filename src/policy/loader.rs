//! Policy loading: binary on-wire records and the logical CSV front-end (§6).

use std::path::Path;

use csv::Reader;
use log::warn;
use serde::Deserialize;
use std::collections::HashSet;

use super::data::{Gender, Policy, ProductType, POLICY_RECORD_SIZE};
use crate::error::CoreError;

/// Parse a contiguous buffer of 32-byte records into policies, as delivered
/// by `load_policies` at the C9 boundary. Duplicate ids warn rather than
/// fail (§7); the caller gets every record including duplicates.
pub fn load_policies_from_bytes(bytes: &[u8]) -> Result<Vec<Policy>, CoreError> {
    if bytes.len() % POLICY_RECORD_SIZE != 0 {
        return Err(CoreError::MalformedRecord {
            expected: POLICY_RECORD_SIZE,
            actual: bytes.len() % POLICY_RECORD_SIZE,
        });
    }

    let count = bytes.len() / POLICY_RECORD_SIZE;
    let mut policies = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);

    for i in 0..count {
        let start = i * POLICY_RECORD_SIZE;
        let record = Policy::from_bytes(&bytes[start..start + POLICY_RECORD_SIZE])?;
        if !seen.insert(record.policy_id) {
            warn!("duplicate policy id {} at record {}", record.policy_id, i);
        }
        policies.push(record);
    }

    Ok(policies)
}

/// Serialize a policy set back to its on-wire form, for round-tripping or
/// for assembling the shared-memory Policies section (§3, §6).
pub fn policies_to_bytes(policies: &[Policy]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(policies.len() * POLICY_RECORD_SIZE);
    for p in policies {
        buf.extend_from_slice(&p.to_bytes());
    }
    buf
}

/// Logical CSV row: `policy_id, age, gender, sum_assured, premium, term,
/// product_type` (§6). Gender accepts M/F/male/female/0/1; product_type
/// accepts term/whole/endowment (case-insensitive) or a numeric tag.
#[derive(Debug, Deserialize)]
struct PolicyCsvRow {
    policy_id: u64,
    age: u16,
    gender: String,
    sum_assured: f64,
    premium: f64,
    term: u32,
    product_type: String,
}

fn parse_gender(raw: &str) -> Result<Gender, CoreError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "m" | "male" | "0" => Ok(Gender::Male),
        "f" | "female" | "1" => Ok(Gender::Female),
        other => Err(CoreError::InvalidPolicy {
            index: 0,
            reason: format!("unrecognised gender: {other}"),
        }),
    }
}

fn parse_product_type(raw: &str) -> ProductType {
    match raw.trim().to_ascii_lowercase().as_str() {
        "whole" | "1" => ProductType::Whole,
        "endowment" | "2" => ProductType::Endowment,
        _ => ProductType::Term,
    }
}

impl PolicyCsvRow {
    fn into_policy(self, row_index: usize) -> Result<Policy, CoreError> {
        let gender = parse_gender(&self.gender).map_err(|_| CoreError::InvalidPolicy {
            index: row_index,
            reason: format!("unrecognised gender: {}", self.gender),
        })?;
        let age = self.age.min(super::data::MAX_AGE as u16) as u8;

        Ok(Policy {
            policy_id: self.policy_id,
            age,
            gender,
            product_type: parse_product_type(&self.product_type),
            term: self.term,
            sum_assured: self.sum_assured,
            premium: self.premium,
        })
    }
}

/// Load policies from the logical CSV schema of §6, validating and
/// clamping as the binary loader would.
pub fn load_policies_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Policy>, CoreError> {
    let mut reader = Reader::from_path(path.as_ref()).map_err(|e| CoreError::InvalidPolicy {
        index: 0,
        reason: format!("failed to open {}: {e}", path.as_ref().display()),
    })?;
    load_policies_csv_from_reader(&mut reader)
}

fn load_policies_csv_from_reader<R: std::io::Read>(
    reader: &mut Reader<R>,
) -> Result<Vec<Policy>, CoreError> {
    let mut policies = Vec::new();
    let mut seen = HashSet::new();

    for (index, result) in reader.deserialize().enumerate() {
        let row: PolicyCsvRow = result.map_err(|e| CoreError::InvalidPolicy {
            index,
            reason: e.to_string(),
        })?;
        let policy = row.into_policy(index)?;
        policy.validate(index)?;
        if !seen.insert(policy.policy_id) {
            warn!("duplicate policy id {} at CSV row {}", policy.policy_id, index);
        }
        policies.push(policy);
    }

    Ok(policies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> Policy {
        Policy {
            policy_id: 7,
            age: 40,
            gender: Gender::Male,
            product_type: ProductType::Term,
            term: 10,
            sum_assured: 100_000.0,
            premium: 1_000.0,
        }
    }

    #[test]
    fn binary_round_trip_through_bytes() {
        let policies = vec![sample_policy(), sample_policy()];
        let bytes = policies_to_bytes(&policies);
        let back = load_policies_from_bytes(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].policy_id, 7);
    }

    #[test]
    fn malformed_byte_count_rejected() {
        let err = load_policies_from_bytes(&[0u8; 17]).unwrap_err();
        assert_eq!(err.code(), "E_MALFORMED_RECORD");
    }

    #[test]
    fn gender_parsing_accepts_all_documented_forms() {
        for raw in ["M", "male", "0", "F", "female", "1"] {
            assert!(parse_gender(raw).is_ok(), "failed to parse {raw}");
        }
        assert!(parse_gender("X").is_err());
    }
}
