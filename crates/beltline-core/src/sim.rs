//! Per-frame bookkeeping: what happened during an update, and a
//! deterministic hash for comparing two factories.

use std::hash::Hasher;

use crate::fixed::{Fixed64, Frames};
use beltline_spatial::GridPosition;

// ---------------------------------------------------------------------------
// Frame report
// ---------------------------------------------------------------------------

/// Counts of completed hand-offs during one [`Factory::update`](crate::factory::Factory::update).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// The frame number after this update.
    pub frame: Frames,
    /// Items that arrived at the next belt slot.
    pub belt_transfers: u32,
    /// Items an inserter picked up.
    pub inserter_pickups: u32,
    /// Items an inserter delivered.
    pub inserter_drops: u32,
    /// Assembler crafting cycles that finished.
    pub crafts_completed: u32,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit) accumulator behind [`Factory::state_hash`](crate::factory::Factory::state_hash).
///
/// Integers are always fed little-endian so two machines agree on the
/// result. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(u64);

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Written in place of an absent item, link or recipe.
const NONE_MARKER: u32 = u32::MAX;

impl StateHash {
    pub fn new() -> Self {
        Self(FNV_OFFSET)
    }

    pub fn write_position(&mut self, position: GridPosition) {
        self.write_i32(position.x);
        self.write_i32(position.y);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write_i64(v.to_bits());
    }

    pub fn write_flag(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    pub fn write_optional(&mut self, v: Option<u32>) {
        self.write_u32(v.unwrap_or(NONE_MARKER));
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for StateHash {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    fn write_i64(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
