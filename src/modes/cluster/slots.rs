//! Cluster slot ownership as reported by `CLUSTER NODES`

use crate::utils::CLUSTER_SLOTS;
use std::collections::HashMap;

/// Which master serves each of the 16384 slots
#[derive(Debug, Clone)]
pub struct SlotMap {
    /// Indexed by slot number
    slot_owner: Vec<Option<String>>,
    /// Maps master address to its slot ranges
    master_slots: HashMap<String, Vec<SlotRange>>,
    /// Maps master address to the number of replicas following it
    replica_counts: HashMap<String, usize>,
    /// Addresses of nodes flagged as failing
    failed_nodes: Vec<String>,
}

/// Represents a contiguous range of slots owned by one master
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    pub fn size(&self) -> u16 {
        self.end - self.start + 1
    }

    /// Parts of this range not covered by `other`
    pub fn subtract(&self, other: &SlotRange) -> Vec<SlotRange> {
        if other.end < self.start || other.start > self.end {
            return vec![self.clone()];
        }

        let mut rest = Vec::new();
        if self.start < other.start {
            rest.push(SlotRange::new(self.start, other.start - 1));
        }
        if self.end > other.end {
            rest.push(SlotRange::new(other.end + 1, self.end));
        }
        rest
    }
}

impl SlotMap {
    pub fn new() -> Self {
        Self {
            slot_owner: vec![None; CLUSTER_SLOTS as usize],
            master_slots: HashMap::new(),
            replica_counts: HashMap::new(),
            failed_nodes: Vec::new(),
        }
    }

    /// Build a map from raw `CLUSTER NODES` output
    pub fn from_cluster_nodes(cluster_nodes: &str) -> Result<Self, SlotParseError> {
        let mut map = Self::new();
        map.update_from_cluster_nodes(cluster_nodes)?;
        Ok(map)
    }

    /// Assign a range of slots to a master. Previous owners keep whatever
    /// part of their ranges falls outside `range`.
    pub fn assign_slots(&mut self, master: &str, range: SlotRange) {
        let mut displaced: Vec<String> = Vec::new();
        for slot in range.start..=range.end {
            if let Some(previous) = self.slot_owner[slot as usize].replace(master.to_string()) {
                if previous != master && !displaced.contains(&previous) {
                    displaced.push(previous);
                }
            }
        }

        for previous in displaced {
            if let Some(ranges) = self.master_slots.get_mut(&previous) {
                let kept: Vec<SlotRange> = ranges.iter().flat_map(|r| r.subtract(&range)).collect();
                *ranges = kept;
                if ranges.is_empty() {
                    self.master_slots.remove(&previous);
                }
            }
        }

        let own = self.master_slots.entry(master.to_string()).or_default();
        let kept: Vec<SlotRange> = own.iter().flat_map(|r| r.subtract(&range)).collect();
        *own = kept;
        own.push(range);
    }

    /// Master serving `slot`, if any
    pub fn master_for_slot(&self, slot: u16) -> Option<&str> {
        self.slot_owner.get(slot as usize)?.as_deref()
    }

    /// All slot ranges for a master
    pub fn slots_for_master(&self, master: &str) -> Option<&Vec<SlotRange>> {
        self.master_slots.get(master)
    }

    pub fn replica_count(&self, master: &str) -> usize {
        self.replica_counts.get(master).copied().unwrap_or(0)
    }

    pub fn failed_nodes(&self) -> &[String] {
        &self.failed_nodes
    }

    /// Check if every slot has an owner
    pub fn is_complete(&self) -> bool {
        self.slot_owner.iter().all(Option::is_some)
    }

    /// Get coverage statistics
    pub fn coverage(&self) -> SlotCoverage {
        let assigned_slots = self.slot_owner.iter().filter(|owner| owner.is_some()).count();
        let coverage_percentage = (assigned_slots as f64 / CLUSTER_SLOTS as f64) * 100.0;

        let master_distribution: HashMap<String, u16> = self
            .master_slots
            .iter()
            .map(|(master, ranges)| (master.clone(), ranges.iter().map(SlotRange::size).sum()))
            .collect();

        SlotCoverage {
            assigned_slots: assigned_slots as u16,
            total_slots: CLUSTER_SLOTS,
            coverage_percentage,
            master_distribution,
        }
    }

    /// Masters that own at least one slot, sorted by address
    pub fn masters(&self) -> Vec<String> {
        let mut masters: Vec<String> = self.master_slots.keys().cloned().collect();
        masters.sort();
        masters
    }

    /// Slots with no owner
    pub fn missing_slots(&self) -> Vec<u16> {
        (0..CLUSTER_SLOTS)
            .filter(|slot| self.slot_owner[*slot as usize].is_none())
            .collect()
    }

    /// Replace the mapping with the contents of a `CLUSTER NODES` reply
    pub fn update_from_cluster_nodes(&mut self, cluster_nodes: &str) -> Result<(), SlotParseError> {
        *self = Self::new();

        let mut ids: HashMap<&str, String> = HashMap::new();
        let mut followers: Vec<&str> = Vec::new();

        for line in cluster_nodes.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 8 {
                return Err(SlotParseError::InvalidFormat(line.trim().to_string()));
            }

            let node_id = parts[0];
            // host:port@cport[,hostname]
            let address = parts[1].split(['@', ',']).next().unwrap_or(parts[1]).to_string();
            // `fail?` is only one node's suspicion; `fail` is the agreed state
            let flags: Vec<&str> = parts[2].split(',').collect();
            ids.insert(node_id, address.clone());

            if flags.contains(&"fail") {
                self.failed_nodes.push(address);
                continue;
            }

            if flags.contains(&"slave") || flags.contains(&"replica") {
                followers.push(parts[3]);
                continue;
            }

            for slot_spec in &parts[8..] {
                // Migrating/importing markers look like [slot->-node]
                if slot_spec.starts_with('[') {
                    continue;
                }
                let range = parse_slot_range(slot_spec)?;
                self.assign_slots(&address, range);
            }
        }

        for master_id in followers {
            if let Some(master) = ids.get(master_id) {
                *self.replica_counts.entry(master.clone()).or_default() += 1;
            }
        }

        Ok(())
    }
}

fn parse_slot_range(spec: &str) -> Result<SlotRange, SlotParseError> {
    let invalid = || SlotParseError::InvalidRange(spec.to_string());
    let parse = |s: &str| {
        s.parse::<u16>()
            .ok()
            .filter(|slot| *slot < CLUSTER_SLOTS)
            .ok_or_else(invalid)
    };

    match spec.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(invalid());
            }
            Ok(SlotRange::new(start, end))
        }
        None => {
            let slot = parse(spec)?;
            Ok(SlotRange::new(slot, slot))
        }
    }
}

/// Statistics about slot coverage
#[derive(Debug, Clone)]
pub struct SlotCoverage {
    pub assigned_slots: u16,
    pub total_slots: u16,
    pub coverage_percentage: f64,
    pub master_distribution: HashMap<String, u16>,
}

/// Error type for slot parsing
#[derive(Debug, thiserror::Error)]
pub enum SlotParseError {
    #[error("Invalid cluster nodes line: {0}")]
    InvalidFormat(String),
    #[error("Invalid slot range: {0}")]
    InvalidRange(String),
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}
