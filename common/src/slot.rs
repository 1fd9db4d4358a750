//! SlotTable: divides the 16384-slot ring into one contiguous, disjoint
//! range per node and resolves slot -> node.
//!
//! Generalizes the "one node, one `Range<u16>`, membership check on every
//! access" idea to the full ordered partition owned by the dispatcher.

use crate::crc16::crc16;
use crate::error::ClusterError;
use serde::{Deserialize, Serialize};

pub const SLOT_COUNT: u16 = 16384;

pub type Slot = u16;

/// A closed, inclusive interval of slots: `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: Slot,
    pub end: Slot,
}

impl SlotRange {
    pub fn new(start: Slot, end: Slot) -> Self {
        SlotRange { start, end }
    }

    pub fn contains(&self, slot: Slot) -> bool {
        slot >= self.start && slot <= self.end
    }

    pub fn width(&self) -> u32 {
        self.end as u32 - self.start as u32 + 1
    }
}

/// Descriptor for one storage node as known to the routing table.
///
/// `addresses` is an ordered sequence of transport addresses (e.g.
/// `"127.0.0.1:7000"`), deliberately kept as opaque strings so the
/// `SlotTable` stays independent of any one `PeerTransport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: String,
    pub slots: SlotRange,
    #[serde(alias = "swarm")]
    pub addresses: Vec<String>,
}

/// Computes the slot for a routing key: `CRC16(key) mod SLOT_COUNT`.
pub fn slot_for_key(key: &[u8]) -> Slot {
    crc16(key) % SLOT_COUNT
}

#[derive(Debug, Clone)]
pub struct SlotTable {
    nodes: Vec<NodeDescriptor>,
    range_len: u32,
}

impl SlotTable {
    /// Builds a fresh SlotTable from an ordered node list, assigning ranges
    /// by the wide/narrow placement algorithm and overwriting whatever
    /// `slots` each descriptor carried in.
    pub fn build(mut nodes: Vec<NodeDescriptor>) -> Result<Self, ClusterError> {
        let n = nodes.len();
        if n == 0 {
            return Err(ClusterError::new_config_invalid(
                "cannot build a SlotTable over zero nodes",
                "slot_table",
            ));
        }
        for (i, range) in compute_ranges(n).into_iter().enumerate() {
            nodes[i].slots = range;
        }
        let range_len = SLOT_COUNT as u32 / n as u32;
        Ok(SlotTable { nodes, range_len })
    }

    /// Restores a SlotTable from a persisted node list, verifying that
    /// recomputing ranges by the construction algorithm reproduces the
    /// persisted ranges bit-for-bit.
    pub fn restore(nodes: Vec<NodeDescriptor>) -> Result<Self, ClusterError> {
        let n = nodes.len();
        if n == 0 {
            return Err(ClusterError::new_config_invalid(
                "cannot restore a SlotTable over zero nodes",
                "slot_table",
            ));
        }
        let expected = compute_ranges(n);
        for (i, node) in nodes.iter().enumerate() {
            if node.slots != expected[i] {
                return Err(ClusterError::new_config_invalid(
                    format!(
                        "node '{}' has range {:?}, expected {:?} for a {}-node table",
                        node.id, node.slots, expected[i], n
                    ),
                    "slot_table",
                ));
            }
        }
        let range_len = SLOT_COUNT as u32 / n as u32;
        Ok(SlotTable { nodes, range_len })
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn nodes_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_for_slot(&self, slot: Slot) -> Result<&NodeDescriptor, ClusterError> {
        let candidate = (slot as u32 / self.range_len.max(1)) as usize;
        let candidate = candidate.min(self.nodes.len() - 1);

        if self.nodes[candidate].slots.contains(slot) {
            return Ok(&self.nodes[candidate]);
        }
        // Wide ranges can shift the boundary by at most one node in either
        // direction; step until we land in the owning range.
        let mut i = candidate;
        loop {
            if self.nodes[i].slots.contains(slot) {
                return Ok(&self.nodes[i]);
            }
            if slot < self.nodes[i].slots.start {
                if i == 0 {
                    break;
                }
                i -= 1;
            } else {
                if i + 1 >= self.nodes.len() {
                    break;
                }
                i += 1;
            }
        }
        Err(ClusterError::new_config_invalid(
            format!("slot {slot} is not covered by any node range"),
            "slot_table",
        ))
    }

    pub fn node_for_key(&self, key: &[u8]) -> Result<&NodeDescriptor, ClusterError> {
        self.node_for_slot(slot_for_key(key))
    }
}

/// The wide/narrow placement algorithm: `base = SLOT_COUNT / n`, `rem =
/// SLOT_COUNT mod n` nodes get width `base+1`, placed at index
/// `floor((k + 0.5) * n / rem)` for `k in [0, rem)`.
fn compute_ranges(n: usize) -> Vec<SlotRange> {
    let base = SLOT_COUNT as usize / n;
    let rem = SLOT_COUNT as usize % n;

    let mut wide = vec![false; n];
    for k in 0..rem {
        let idx = (((k as f64) + 0.5) * n as f64 / rem as f64).floor() as usize;
        wide[idx.min(n - 1)] = true;
    }

    let mut ranges = Vec::with_capacity(n);
    let mut cursor: u32 = 0;
    for is_wide in wide {
        let width = if is_wide { base + 1 } else { base } as u32;
        let start = cursor as Slot;
        let end = (cursor + width - 1) as Slot;
        ranges.push(SlotRange::new(start, end));
        cursor += width;
    }
    ranges
}
