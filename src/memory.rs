//! Shared-memory layout (C7, §3, §4.5, §6): the single contiguous byte
//! region the host builds once and every worker reads from, plus the
//! per-worker result slabs workers write into without synchronisation.
//!
//! Only the driver's initialization phase writes the header, policies,
//! and assumption sections; after `build` returns they are read-only
//! for the lifetime of the region. Each worker owns a distinct slab
//! (§4.5 invariants), so slab writes need no locking.

use crate::assumptions::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::error::CoreError;
use crate::policy::{Policy, POLICY_RECORD_SIZE};

/// `0x4C43_5356` = "LCSV" in ASCII, chosen to spell out "life-contract
/// stochastic valuation" (§6 leaves the exact constant
/// implementation-chosen, documented here).
pub const MAGIC: u32 = 0x4C43_5356;
pub const VERSION: u32 = 1;

pub const HEADER_SIZE: usize = 32;
pub const MORTALITY_SIZE: usize = 1_936;
pub const LAPSE_SIZE: usize = 400;
pub const EXPENSES_SIZE: usize = 32;

const ALIGNMENT: usize = 16;

/// Round `n` up to the next multiple of the section alignment (§3: "all
/// sections are 16-byte aligned").
fn align_up(n: usize) -> usize {
    (n + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT
}

/// Parsed form of the 32-byte header (§6): magic, version, counts, and
/// the offsets needed to locate every other section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub policy_count: u32,
    pub scenario_count: u32,
    pub worker_count: u32,
    pub max_scenarios_per_worker: u32,
    pub policies_offset: u32,
    pub results_offset: u32,
}

impl Header {
    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.policy_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.scenario_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.worker_count.to_le_bytes());
        buf[20..24].copy_from_slice(&self.max_scenarios_per_worker.to_le_bytes());
        buf[24..28].copy_from_slice(&self.policies_offset.to_le_bytes());
        buf[28..32].copy_from_slice(&self.results_offset.to_le_bytes());
        buf
    }

    /// Parse and validate the header at the front of `bytes`. The magic
    /// and version are checked first and fail fast on mismatch (§4.5).
    fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CoreError::BufferTooSmall {
                needed: HEADER_SIZE,
                have: bytes.len(),
            });
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(CoreError::MagicMismatch {
                expected: MAGIC,
                actual: magic,
            });
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != VERSION {
            return Err(CoreError::VersionMismatch {
                expected: VERSION,
                actual: version,
            });
        }
        Ok(Header {
            policy_count: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            scenario_count: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            worker_count: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            max_scenarios_per_worker: u32::from_le_bytes(bytes[20..24].try_into().unwrap()),
            policies_offset: u32::from_le_bytes(bytes[24..28].try_into().unwrap()),
            results_offset: u32::from_le_bytes(bytes[28..32].try_into().unwrap()),
        })
    }
}

/// Section offsets within the region, all 16-byte aligned (§3).
#[derive(Debug, Clone, Copy)]
struct Layout {
    policies_offset: usize,
    mortality_offset: usize,
    lapse_offset: usize,
    expenses_offset: usize,
    results_offset: usize,
    slab_stride: usize,
    total_size: usize,
}

fn layout_for(policy_count: usize, worker_count: usize, max_scenarios_per_worker: usize) -> Layout {
    let policies_offset = align_up(HEADER_SIZE);
    let mortality_offset = align_up(policies_offset + policy_count * POLICY_RECORD_SIZE);
    let lapse_offset = align_up(mortality_offset + MORTALITY_SIZE);
    let expenses_offset = align_up(lapse_offset + LAPSE_SIZE);
    let results_offset = align_up(expenses_offset + EXPENSES_SIZE);
    let slab_stride = align_up(max_scenarios_per_worker * 8);
    let total_size = results_offset + slab_stride * worker_count;
    Layout {
        policies_offset,
        mortality_offset,
        lapse_offset,
        expenses_offset,
        results_offset,
        slab_stride,
        total_size,
    }
}

/// A fully-built shared region: header, read-only data sections, and
/// one result slab per worker, all in one contiguous `Vec<u8>`.
///
/// The same contiguous-buffer representation serves both execution
/// modes described in §4.5/§9: when the host environment supports true
/// shared memory, this buffer *is* the region every worker attaches
/// to; when it doesn't (the fallback mode), the driver instead clones
/// the read-only sections per worker and keeps only this struct on the
/// host side as the canonical record workers' slabs are copied back
/// into. Either way the section contract — single-writer slabs,
/// read-only data after `build` — holds.
#[derive(Debug, Clone)]
pub struct SharedRegion {
    buf: Vec<u8>,
    layout: Layout,
    header: Header,
}

/// Caps the total region size a single run is allowed to request (§5
/// resource limits). `build` rejects configurations that would exceed
/// this unless a larger explicit maximum is supplied.
pub const DEFAULT_MAX_REGION_BYTES: usize = 512 * 1024 * 1024;

impl SharedRegion {
    /// Build the region from the driver's initialization phase: the
    /// only point at which header, policies, and assumption sections
    /// are written (§4.5 invariants). `max_scenarios_per_worker` sizes
    /// every slab identically so the layout does not depend on how
    /// scenarios happen to partition across workers.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        policies: &[Policy],
        mortality: &MortalityTable,
        lapse: &LapseTable,
        expenses: &ExpenseAssumptions,
        worker_count: usize,
        max_scenarios_per_worker: usize,
        max_region_bytes: usize,
    ) -> Result<Self, CoreError> {
        let layout = layout_for(policies.len(), worker_count.max(1), max_scenarios_per_worker);
        if layout.total_size > max_region_bytes {
            return Err(CoreError::RegionTooLarge {
                requested: layout.total_size,
                maximum: max_region_bytes,
            });
        }

        let mut buf = vec![0u8; layout.total_size];

        let header = Header {
            policy_count: policies.len() as u32,
            scenario_count: 0,
            worker_count: worker_count as u32,
            max_scenarios_per_worker: max_scenarios_per_worker as u32,
            policies_offset: layout.policies_offset as u32,
            results_offset: layout.results_offset as u32,
        };
        buf[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        for (i, policy) in policies.iter().enumerate() {
            let start = layout.policies_offset + i * POLICY_RECORD_SIZE;
            buf[start..start + POLICY_RECORD_SIZE].copy_from_slice(&policy.to_bytes());
        }

        let mortality_bytes = mortality.to_bytes();
        buf[layout.mortality_offset..layout.mortality_offset + MORTALITY_SIZE]
            .copy_from_slice(&mortality_bytes);

        let lapse_bytes = lapse.to_bytes();
        buf[layout.lapse_offset..layout.lapse_offset + LAPSE_SIZE].copy_from_slice(&lapse_bytes);

        let expenses_bytes = expenses.to_bytes();
        buf[layout.expenses_offset..layout.expenses_offset + EXPENSES_SIZE]
            .copy_from_slice(&expenses_bytes);

        Ok(Self { buf, layout, header })
    }

    /// Attach to an existing region (e.g. one handed off by a host
    /// process), validating the header first (§4.5: "a mismatch fails
    /// fast").
    pub fn attach(bytes: Vec<u8>) -> Result<Self, CoreError> {
        let header = Header::from_bytes(&bytes)?;
        let layout = layout_for(
            header.policy_count as usize,
            header.worker_count.max(1) as usize,
            header.max_scenarios_per_worker as usize,
        );
        if bytes.len() < layout.total_size {
            return Err(CoreError::BufferTooSmall {
                needed: layout.total_size,
                have: bytes.len(),
            });
        }
        Ok(Self {
            buf: bytes,
            layout,
            header,
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn policies(&self) -> Result<Vec<Policy>, CoreError> {
        let count = self.header.policy_count as usize;
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let start = self.layout.policies_offset + i * POLICY_RECORD_SIZE;
            out.push(Policy::from_bytes(&self.buf[start..start + POLICY_RECORD_SIZE])?);
        }
        Ok(out)
    }

    pub fn mortality(&self) -> Result<MortalityTable, CoreError> {
        let start = self.layout.mortality_offset;
        MortalityTable::from_bytes(&self.buf[start..start + MORTALITY_SIZE])
    }

    pub fn lapse(&self) -> Result<LapseTable, CoreError> {
        let start = self.layout.lapse_offset;
        LapseTable::from_bytes(&self.buf[start..start + LAPSE_SIZE])
    }

    pub fn expenses(&self) -> Result<ExpenseAssumptions, CoreError> {
        let start = self.layout.expenses_offset;
        ExpenseAssumptions::from_bytes(&self.buf[start..start + EXPENSES_SIZE])
    }

    fn slab_bounds(&self, worker_index: usize) -> (usize, usize) {
        let start = self.layout.results_offset + worker_index * self.layout.slab_stride;
        (start, start + self.layout.max_scenarios_per_worker() * 8)
    }

    /// Write one worker's scenario-NPV slab (§3, §4.5: "writes to a
    /// slab are performed by exactly one worker"). `npvs.len()` must
    /// not exceed `max_scenarios_per_worker`.
    pub fn write_slab(&mut self, worker_index: usize, npvs: &[f64]) -> Result<(), CoreError> {
        let max = self.header.max_scenarios_per_worker as usize;
        if npvs.len() > max {
            return Err(CoreError::BufferTooSmall {
                needed: npvs.len() * 8,
                have: max * 8,
            });
        }
        let (start, _) = self.slab_bounds(worker_index);
        for (i, v) in npvs.iter().enumerate() {
            let offset = start + i * 8;
            self.buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
        }
        Ok(())
    }

    /// Read back `count` entries of one worker's slab, in index order.
    pub fn read_slab(&self, worker_index: usize, count: usize) -> Vec<f64> {
        let (start, _) = self.slab_bounds(worker_index);
        (0..count)
            .map(|i| {
                let offset = start + i * 8;
                f64::from_le_bytes(self.buf[offset..offset + 8].try_into().unwrap())
            })
            .collect()
    }

    pub fn total_size(&self) -> usize {
        self.layout.total_size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Layout {
    fn max_scenarios_per_worker(&self) -> usize {
        self.slab_stride / 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Gender, ProductType};

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

    fn sample_tables() -> (MortalityTable, LapseTable, ExpenseAssumptions) {
        (
            MortalityTable::from_flat(vec![0.01; 121 * 2]),
            LapseTable::from_flat(vec![0.02; 50]),
            ExpenseAssumptions {
                per_policy_acquisition: 10.0,
                per_policy_maintenance: 2.0,
                percent_of_premium: 0.01,
                per_claim: 50.0,
            },
        )
    }

    #[test]
    fn sections_are_sixteen_byte_aligned() {
        let layout = layout_for(3, 2, 100);
        assert_eq!(layout.policies_offset % ALIGNMENT, 0);
        assert_eq!(layout.mortality_offset % ALIGNMENT, 0);
        assert_eq!(layout.lapse_offset % ALIGNMENT, 0);
        assert_eq!(layout.expenses_offset % ALIGNMENT, 0);
        assert_eq!(layout.results_offset % ALIGNMENT, 0);
    }

    #[test]
    fn build_then_read_back_round_trips_every_section() {
        let (mortality, lapse, expenses) = sample_tables();
        let policies = vec![sample_policy(1), sample_policy(2)];
        let region = SharedRegion::build(&policies, &mortality, &lapse, &expenses, 2, 10, DEFAULT_MAX_REGION_BYTES)
            .unwrap();

        let back_policies = region.policies().unwrap();
        assert_eq!(back_policies.len(), 2);
        assert_eq!(back_policies[0].policy_id, 1);

        let back_mortality = region.mortality().unwrap();
        assert_eq!(back_mortality.qx(40, Gender::Male), 0.01);

        let back_lapse = region.lapse().unwrap();
        assert_eq!(back_lapse.lapse(5), 0.02);

        let back_expenses = region.expenses().unwrap();
        assert_eq!(back_expenses, expenses);
    }

    #[test]
    fn slab_write_then_read_preserves_values() {
        let (mortality, lapse, expenses) = sample_tables();
        let mut region =
            SharedRegion::build(&[], &mortality, &lapse, &expenses, 3, 5, DEFAULT_MAX_REGION_BYTES).unwrap();

        region.write_slab(0, &[1.0, 2.0, 3.0]).unwrap();
        region.write_slab(1, &[4.0, 5.0]).unwrap();
        region.write_slab(2, &[6.0]).unwrap();

        assert_eq!(region.read_slab(0, 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(region.read_slab(1, 2), vec![4.0, 5.0]);
        assert_eq!(region.read_slab(2, 1), vec![6.0]);
    }

    #[test]
    fn slab_overflow_is_rejected() {
        let (mortality, lapse, expenses) = sample_tables();
        let mut region =
            SharedRegion::build(&[], &mortality, &lapse, &expenses, 1, 2, DEFAULT_MAX_REGION_BYTES).unwrap();
        let err = region.write_slab(0, &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err.code(), "E_BUFFER_TOO_SMALL");
    }

    #[test]
    fn attach_round_trips_a_built_region() {
        let (mortality, lapse, expenses) = sample_tables();
        let policies = vec![sample_policy(7)];
        let built = SharedRegion::build(&policies, &mortality, &lapse, &expenses, 1, 4, DEFAULT_MAX_REGION_BYTES)
            .unwrap();
        let bytes = built.as_bytes().to_vec();

        let attached = SharedRegion::attach(bytes).unwrap();
        assert_eq!(attached.header().policy_count, 1);
        assert_eq!(attached.policies().unwrap()[0].policy_id, 7);
    }

    #[test]
    fn magic_mismatch_fails_fast() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let err = SharedRegion::attach(bytes).unwrap_err();
        assert_eq!(err.code(), "E_MAGIC_MISMATCH");
    }

    #[test]
    fn version_mismatch_fails_fast() {
        let (mortality, lapse, expenses) = sample_tables();
        let built = SharedRegion::build(&[], &mortality, &lapse, &expenses, 1, 1, DEFAULT_MAX_REGION_BYTES)
            .unwrap();
        let mut bytes = built.as_bytes().to_vec();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let err = SharedRegion::attach(bytes).unwrap_err();
        assert_eq!(err.code(), "E_VERSION_MISMATCH");
    }

    #[test]
    fn oversized_region_is_rejected() {
        let (mortality, lapse, expenses) = sample_tables();
        let err = SharedRegion::build(&[], &mortality, &lapse, &expenses, 4, 1_000_000, 1_024).unwrap_err();
        assert_eq!(err.code(), "E_REGION_TOO_LARGE");
    }

    #[test]
    fn truncated_buffer_on_attach_is_rejected() {
        let (mortality, lapse, expenses) = sample_tables();
        let built = SharedRegion::build(&[], &mortality, &lapse, &expenses, 1, 4, DEFAULT_MAX_REGION_BYTES)
            .unwrap();
        let truncated = built.as_bytes()[..HEADER_SIZE + 4].to_vec();
        let err = SharedRegion::attach(truncated).unwrap_err();
        assert_eq!(err.code(), "E_BUFFER_TOO_SMALL");
    }
}
