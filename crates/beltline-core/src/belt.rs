//! Belt nodes, their four slots, and the per-frame slot transport pass.
//!
//! A [`BeltNode`] is what the player places: a 2x2 tile with a facing and a
//! speed class. It owns exactly four [`BeltSlot`]s, indexed
//! `0 = (0,0)`, `1 = (1,0)`, `2 = (0,1)`, `3 = (1,1)` relative to the node
//! origin. Slots are the unit items actually move between.
//!
//! Both live in [`BeltNetwork`], a pair of `slotmap` arenas. Links between
//! nodes and slots are plain ids rebuilt by the linker on every
//! recalculation; a removed node leaves stale ids that resolve to nothing.

use crate::config::Tuning;
use crate::corner::CornerShape;
use crate::fixed::{Fixed64, fixed64_to_f32, lerp};
use crate::id::*;
use crate::link::{Linkable, Positioned};
use crate::item::ItemArena;
use crate::transport::{
    Carrier, ItemSink, ItemSource, SlotState, SlotTransport, TransferContext,
};
use beltline_spatial::{Facing, Footprint, GridPosition};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Footprint of a placed belt node.
pub const NODE_FOOTPRINT: Footprint = Footprint::square(2);

/// Footprint of one slot.
pub const SLOT_FOOTPRINT: Footprint = Footprint::square(1);

// ---------------------------------------------------------------------------
// Speed
// ---------------------------------------------------------------------------

/// Belt tier. Each tier has its own throughput multiplier in [`Tuning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpeedClass {
    #[default]
    Normal,
    Fast,
    Super,
}

// ---------------------------------------------------------------------------
// Node and slot
// ---------------------------------------------------------------------------

/// A placed 2x2 belt tile.
#[derive(Debug, Clone)]
pub struct BeltNode {
    /// Top-left corner.
    pub position: GridPosition,
    pub facing: Facing,
    pub speed: SpeedClass,
    pub slots: [SlotId; 4],
    pub next: Option<BeltNodeId>,
    pub prev: Option<BeltNodeId>,
    /// Set when the corner corrector turned this node into a curve.
    pub corner: Option<CornerShape>,
    /// Scroll offset of the belt texture, in `[0, 1)`.
    pub animation_phase: Fixed64,
}

/// One quarter of a belt node.
#[derive(Debug, Clone)]
pub struct BeltSlot {
    pub node: BeltNodeId,
    /// Index within the parent node, `x + 2y` in local coordinates.
    pub index: u8,
    pub position: GridPosition,
    pub facing: Facing,
    /// Sprite rotation. Equal to `facing.angle()` except on a corner entry.
    pub render_angle: f64,
    pub speed: SpeedClass,
    pub next: Option<SlotId>,
    pub prev: Option<SlotId>,
    /// Corner slot excluded from transport and rendering.
    pub dead: bool,
    /// Forced `next` installed by the corner corrector.
    pub link_override: Option<SlotId>,
    pub transport: SlotTransport,
}

impl BeltSlot {
    /// Local `(dx, dy)` offset of slot `index` inside its node.
    pub fn local_offset(index: u8) -> (i32, i32) {
        ((index % 2) as i32, (index / 2) as i32)
    }

    fn new(node: BeltNodeId, index: u8, origin: GridPosition, facing: Facing, speed: SpeedClass) -> Self {
        let (dx, dy) = Self::local_offset(index);
        Self {
            node,
            index,
            position: origin.offset(dx, dy),
            facing,
            render_angle: facing.angle(),
            speed,
            next: None,
            prev: None,
            dead: false,
            link_override: None,
            transport: SlotTransport::default(),
        }
    }

    /// Render centre of the slot.
    pub fn center(&self) -> (f32, f32) {
        SLOT_FOOTPRINT.center(self.position)
    }

    pub fn item(&self) -> Option<ItemObjectId> {
        self.transport.item
    }
}

impl Positioned for BeltNode {
    fn position(&self) -> GridPosition {
        self.position
    }

    fn footprint(&self) -> Footprint {
        NODE_FOOTPRINT
    }
}

impl Linkable for BeltNode {
    fn facing(&self) -> Facing {
        self.facing
    }
}

impl Positioned for BeltSlot {
    fn position(&self) -> GridPosition {
        self.position
    }

    fn footprint(&self) -> Footprint {
        SLOT_FOOTPRINT
    }
}

impl Linkable for BeltSlot {
    fn facing(&self) -> Facing {
        self.facing
    }
}

impl ItemSource for BeltSlot {
    fn retrieve(&mut self, _ctx: &mut TransferContext<'_>) -> Option<ItemObjectId> {
        if self.dead {
            return None;
        }
        self.transport.take()
    }
}

impl ItemSink for BeltSlot {
    fn reserve(&mut self, by: Carrier) -> bool {
        !self.dead && self.transport.can_receive(by) && self.transport.reserve(by)
    }

    fn insert(&mut self, item: ItemObjectId, by: Carrier, ctx: &mut TransferContext<'_>) -> bool {
        if self.dead || !self.transport.can_receive(by) {
            return false;
        }
        self.transport.receive(item, ctx.tuning.receive_cooldown);
        ctx.items.set_position(item, self.center());
        true
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Arena storage for every belt node and slot in a factory.
#[derive(Debug, Default)]
pub struct BeltNetwork {
    pub(crate) nodes: SlotMap<BeltNodeId, BeltNode>,
    pub(crate) slots: SlotMap<SlotId, BeltSlot>,
}

impl BeltNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node and its four slots. Links stay empty until the next
    /// recalculation.
    pub fn spawn(&mut self, position: GridPosition, facing: Facing, speed: SpeedClass) -> BeltNodeId {
        let slots = &mut self.slots;
        self.nodes.insert_with_key(|node| BeltNode {
            position,
            facing,
            speed,
            slots: std::array::from_fn(|i| {
                slots.insert(BeltSlot::new(node, i as u8, position, facing, speed))
            }),
            next: None,
            prev: None,
            corner: None,
            animation_phase: Fixed64::ZERO,
        })
    }

    /// Remove a node and its slots. Returns the items the slots were holding;
    /// they are still alive in the item arena.
    pub fn despawn(&mut self, id: BeltNodeId) -> Vec<ItemObjectId> {
        let Some(node) = self.nodes.remove(id) else {
            return Vec::new();
        };
        node.slots
            .iter()
            .filter_map(|&s| self.slots.remove(s))
            .filter_map(|slot| slot.transport.item)
            .collect()
    }

    pub fn node(&self, id: BeltNodeId) -> Option<&BeltNode> {
        self.nodes.get(id)
    }

    pub fn slot(&self, id: SlotId) -> Option<&BeltSlot> {
        self.slots.get(id)
    }

    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut BeltSlot> {
        self.slots.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (BeltNodeId, &BeltNode)> {
        self.nodes.iter()
    }

    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &BeltSlot)> {
        self.slots.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot `index` of `node`.
    pub fn slot_of(&self, node: BeltNodeId, index: u8) -> Option<SlotId> {
        self.nodes.get(node).and_then(|n| n.slots.get(index as usize).copied())
    }

    /// Turn a node (and its slots) to a new facing.
    pub fn set_facing(&mut self, id: BeltNodeId, facing: Facing) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.facing = facing;
        for &s in &node.slots {
            if let Some(slot) = self.slots.get_mut(s) {
                slot.facing = facing;
                slot.render_angle = facing.angle();
            }
        }
    }

    /// Clear every link, corner mark, override and in-flight send.
    pub fn reset_links(&mut self) {
        for node in self.nodes.values_mut() {
            node.next = None;
            node.prev = None;
            node.corner = None;
        }
        for slot in self.slots.values_mut() {
            slot.next = None;
            slot.prev = None;
            slot.dead = false;
            slot.link_override = None;
            slot.render_angle = slot.facing.angle();
            slot.transport.reset();
        }
    }

    /// Advance every slot by one frame. Returns the number of completed
    /// slot-to-slot transfers.
    pub fn advance(&mut self, dt: Fixed64, tuning: &Tuning) -> u32 {
        // Cooldowns first, so a slot that received last frame counts down
        // before anyone checks it.
        for slot in self.slots.values_mut() {
            slot.transport.tick_cooldown();
        }
        for node in self.nodes.values_mut() {
            node.animation_phase = (node.animation_phase + tuning.belt_step(node.speed, dt)).frac();
        }

        let ids: Vec<SlotId> = self.slots.keys().collect();
        let mut transfers = 0;
        for id in ids {
            let Some(slot) = self.slots.get(id) else {
                continue;
            };
            if slot.dead {
                continue;
            }
            let (next, speed, empty) = (slot.next, slot.speed, slot.transport.is_empty());
            match slot.transport.state {
                SlotState::Idle => {
                    if empty {
                        continue;
                    }
                    if self.try_start_send(id, next) {
                        if let Some(slot) = self.slots.get_mut(id) {
                            slot.transport.state = SlotState::Sending;
                            slot.transport.progress = Fixed64::ONE;
                        }
                    }
                }
                SlotState::Sending => {
                    let Some(next) = next else {
                        debug_assert!(false, "sending slot {id:?} has no next");
                        if let Some(slot) = self.slots.get_mut(id) {
                            slot.transport.reset();
                        }
                        continue;
                    };
                    if self.step_send(id, next, tuning.belt_step(speed, dt), tuning.receive_cooldown) {
                        transfers += 1;
                    }
                }
                SlotState::Receiving { .. } => {}
            }
        }
        transfers
    }

    fn try_start_send(&mut self, from: SlotId, next: Option<SlotId>) -> bool {
        let Some(target) = next.and_then(|n| self.slots.get_mut(n)) else {
            return false;
        };
        let carrier = Carrier::Slot(from);
        !target.dead && target.transport.accepts_sender(carrier) && target.transport.reserve(carrier)
    }

    /// Move a sending slot's progress on; hand the item over once it
    /// reaches 0 and `next` is free. Returns true if the item moved.
    fn step_send(&mut self, from: SlotId, next: SlotId, step: Fixed64, cooldown: u32) -> bool {
        let Some(slot) = self.slots.get_mut(from) else {
            return false;
        };
        slot.transport.progress = (slot.transport.progress - step).max(Fixed64::ZERO);
        if slot.transport.progress > Fixed64::ZERO {
            return false;
        }

        let carrier = Carrier::Slot(from);
        let ready = self
            .slots
            .get(next)
            .is_some_and(|t| !t.dead && t.transport.can_receive(carrier));
        if !ready {
            // Backpressure: hold at 0 with the item.
            return false;
        }

        let Some(slot) = self.slots.get_mut(from) else {
            return false;
        };
        slot.transport.state = SlotState::Idle;
        let Some(item) = slot.transport.item.take() else {
            debug_assert!(false, "sending slot {from:?} holds no item");
            return false;
        };
        if let Some(target) = self.slots.get_mut(next) {
            target.transport.receive(item, cooldown);
        }
        true
    }

    /// Render position for an item in `slot`: its centre, or partway to
    /// `next` while sending.
    pub fn item_position(&self, id: SlotId) -> Option<(f32, f32)> {
        let slot = self.slots.get(id)?;
        let here = slot.center();
        if slot.transport.state == SlotState::Sending {
            if let Some(next) = slot.next.and_then(|n| self.slots.get(n)) {
                let t = 1.0 - fixed64_to_f32(slot.transport.progress);
                return Some(lerp(here, next.center(), t));
            }
        }
        Some(here)
    }

    /// Copy every held item's render position into the arena.
    pub fn sync_item_positions(&self, items: &mut ItemArena) {
        for (id, slot) in &self.slots {
            if let (Some(item), Some(pos)) = (slot.transport.item, self.item_position(id)) {
                items.set_position(item, pos);
            }
        }
    }

    /// Every item currently sitting on a slot.
    pub fn held_items(&self) -> impl Iterator<Item = (SlotId, ItemObjectId)> + '_ {
        self.slots
            .iter()
            .filter_map(|(id, s)| s.transport.item.map(|item| (id, item)))
    }
}
