//! Spatial linking: derive `next`/`prev` edges from positions and facings.
//!
//! Nothing stores a link permanently. On every recalculation the factory
//! rebuilds the [`Grid`], clears all links and asks each object what sits
//! one footprint-length ahead of it. Belt nodes link first, then their
//! slots; a slot only links into its own node or the node its node feeds.

use crate::belt::BeltNetwork;
use crate::id::*;
use beltline_spatial::{Facing, Footprint, GridIndex, GridPosition};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Anything that occupies cells on the grid.
pub trait Positioned {
    /// Top-left cell.
    fn position(&self) -> GridPosition;
    fn footprint(&self) -> Footprint;

    fn occupies(&self, cell: GridPosition) -> bool {
        self.footprint().contains(self.position(), cell)
    }
}

/// Anything that looks forward to find a neighbour.
pub trait Linkable: Positioned {
    fn facing(&self) -> Facing;

    /// How far forward to look: the footprint's extent along the facing.
    fn step(&self) -> i32 {
        self.footprint().extent_along(self.facing())
    }

    fn forward_cell(&self) -> GridPosition {
        self.position().step(self.facing(), self.step())
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// What a grid cell can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occupant {
    Slot(SlotId),
    Inserter(InserterId),
    Container(ContainerId),
    Assembler(AssemblerId),
}

/// Cell index used during recalculation.
pub type Grid = GridIndex<Occupant>;

/// Look one step ahead of `object`.
pub fn link<L: Linkable>(object: &L, grid: &Grid) -> Option<Occupant> {
    grid.get(object.forward_cell())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A broken structural invariant found during recalculation. These point at
/// a bug in the caller or the factory, never at a bad layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("belt node {node:?} refers to slot {slot:?}, which does not exist")]
    MissingSlot { node: BeltNodeId, slot: SlotId },
    #[error("slot {slot:?} belongs to node {node:?}, which does not exist")]
    MissingNode { slot: SlotId, node: BeltNodeId },
    #[error("assembler {assembler:?} is bound to unknown recipe {recipe:?}")]
    UnknownRecipe {
        assembler: AssemblerId,
        recipe: RecipeId,
    },
}

// ---------------------------------------------------------------------------
// Belt passes
// ---------------------------------------------------------------------------

/// Link every node to the node whose slot sits two cells ahead.
///
/// `order` is placement order; when two nodes feed the same target, the
/// later one becomes its `prev`.
pub fn link_nodes(
    belts: &mut BeltNetwork,
    grid: &Grid,
    order: &[BeltNodeId],
) -> Result<(), TopologyError> {
    let mut edges = Vec::with_capacity(order.len());
    for &id in order {
        let Some(node) = belts.nodes.get(id) else {
            continue;
        };
        let next = match link(node, grid) {
            Some(Occupant::Slot(slot)) => {
                let target = belts
                    .slots
                    .get(slot)
                    .map(|s| s.node)
                    .ok_or(TopologyError::MissingSlot { node: id, slot })?;
                if !belts.nodes.contains_key(target) {
                    return Err(TopologyError::MissingNode { slot, node: target });
                }
                Some(target)
            }
            _ => None,
        };
        edges.push((id, next));
    }

    for node in belts.nodes.values_mut() {
        node.prev = None;
    }
    for (id, next) in edges {
        if let Some(node) = belts.nodes.get_mut(id) {
            node.next = next;
        }
        if let Some(target) = next.and_then(|n| belts.nodes.get_mut(n)) {
            target.prev = Some(id);
        }
    }
    Ok(())
}

/// Link every live slot of every node.
///
/// A slot with a corner override links to the override. Otherwise the
/// forward cell is accepted only if it is a live slot of the same node or of
/// the node's `next`.
pub fn link_slots(
    belts: &mut BeltNetwork,
    grid: &Grid,
    order: &[BeltNodeId],
) -> Result<(), TopologyError> {
    let mut edges = Vec::with_capacity(order.len() * 4);
    for &id in order {
        let Some(node) = belts.nodes.get(id) else {
            continue;
        };
        for &sid in &node.slots {
            let slot = belts
                .slots
                .get(sid)
                .ok_or(TopologyError::MissingSlot { node: id, slot: sid })?;
            if slot.dead {
                edges.push((sid, None));
                continue;
            }
            let candidate = match slot.link_override {
                Some(target) => Some(target),
                None => match link(slot, grid) {
                    Some(Occupant::Slot(target)) => Some(target),
                    _ => None,
                },
            };
            let next = candidate.filter(|&target| {
                belts.slots.get(target).is_some_and(|t| {
                    !t.dead && (t.node == id || Some(t.node) == node.next || slot.link_override.is_some())
                })
            });
            edges.push((sid, next));
        }
    }

    for slot in belts.slots.values_mut() {
        slot.prev = None;
    }
    for (sid, next) in edges {
        if let Some(slot) = belts.slots.get_mut(sid) {
            slot.next = next;
        }
        if let Some(target) = next.and_then(|n| belts.slots.get_mut(n)) {
            target.prev = Some(sid);
        }
    }
    Ok(())
}
