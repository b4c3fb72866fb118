//! The item-transport contract shared by belt slots, inserters, containers
//! and assemblers.
//!
//! Every hand-off is a pair of calls: the receiving side is first asked to
//! [`reserve`](ItemSink::reserve) itself for a carrier, then to
//! [`insert`](ItemSink::insert) the item. Both return `false` instead of
//! failing; the caller keeps the item and retries next frame. This is how
//! backpressure propagates without any item ever being dropped.
//!
//! A belt slot additionally runs the [`SlotTransport`] state machine:
//!
//! ```text
//!   Idle --(item, next accepts, next reserved)--> Sending
//!   Sending --(progress hits 0, next idle+empty)--> Idle   (next -> Receiving)
//!   Receiving{cooldown} --(cooldown hits 0)--> Idle
//! ```

use crate::catalog::Catalog;
use crate::config::Tuning;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::item::ItemArena;

// ---------------------------------------------------------------------------
// Parties to a transfer
// ---------------------------------------------------------------------------

/// Whoever is about to deliver an item: an upstream belt slot or an inserter.
/// Stored in a slot's reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Carrier {
    Slot(SlotId),
    Inserter(InserterId),
}

/// Something an inserter can take from or deliver to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Slot(SlotId),
    Container(ContainerId),
    Assembler(AssemblerId),
}

/// Shared state every transfer may touch.
pub struct TransferContext<'a> {
    pub items: &'a mut ItemArena,
    pub catalog: &'a Catalog,
    pub tuning: &'a Tuning,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Something items can be taken from.
pub trait ItemSource {
    /// Take one item. `None` if there is nothing to take right now.
    fn retrieve(&mut self, ctx: &mut TransferContext<'_>) -> Option<ItemObjectId>;
}

/// Something items can be delivered to.
pub trait ItemSink {
    /// Claim the right to deliver. `false` if someone else holds it or the
    /// sink can't take anything at all.
    fn reserve(&mut self, by: Carrier) -> bool;

    /// Deliver `item`. On success the sink owns the item (and may despawn
    /// it); on failure the caller still owns it.
    fn insert(&mut self, item: ItemObjectId, by: Carrier, ctx: &mut TransferContext<'_>) -> bool;
}

/// Endpoint-addressed access to every source and sink in a factory.
///
/// Inserters talk to the world through this so their arm logic doesn't
/// need to know which arena an endpoint lives in.
pub trait Ports {
    fn retrieve(&mut self, at: Endpoint, ctx: &mut TransferContext<'_>) -> Option<ItemObjectId>;
    fn reserve(&mut self, at: Endpoint, by: Carrier) -> bool;
    fn insert(
        &mut self,
        at: Endpoint,
        item: ItemObjectId,
        by: Carrier,
        ctx: &mut TransferContext<'_>,
    ) -> bool;
}

// ---------------------------------------------------------------------------
// Slot state machine
// ---------------------------------------------------------------------------

/// Where a belt slot is in its hand-off cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    /// Moving the held item towards `next`, which is reserved for us.
    Sending,
    /// Just received an item; refuses new ones until the cooldown runs out.
    Receiving { cooldown: u32 },
}

/// Per-slot transport bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTransport {
    pub state: SlotState,
    pub item: Option<ItemObjectId>,
    /// 1 at the start of a send, 0 when the item has arrived at `next`.
    pub progress: Fixed64,
    pub reserved_by: Option<Carrier>,
}

impl SlotTransport {
    pub fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    fn reservation_open_to(&self, by: Carrier) -> bool {
        self.reserved_by.is_none() || self.reserved_by == Some(by)
    }

    /// Whether an upstream slot may start sending towards this one.
    ///
    /// A slot that is itself sending will be empty by the time the upstream
    /// item arrives, so it accepts too.
    pub fn accepts_sender(&self, from: Carrier) -> bool {
        if !self.reservation_open_to(from) {
            return false;
        }
        match self.state {
            SlotState::Sending => true,
            SlotState::Idle => self.is_empty(),
            SlotState::Receiving { .. } => false,
        }
    }

    /// Whether an item could be put here right now by `by`.
    pub fn can_receive(&self, by: Carrier) -> bool {
        self.state == SlotState::Idle && self.is_empty() && self.reservation_open_to(by)
    }

    pub fn reserve(&mut self, by: Carrier) -> bool {
        if !self.reservation_open_to(by) {
            return false;
        }
        self.reserved_by = Some(by);
        true
    }

    /// Accept an item. Caller has checked [`can_receive`](Self::can_receive).
    pub fn receive(&mut self, item: ItemObjectId, cooldown: u32) {
        debug_assert!(self.is_empty(), "receive into occupied slot");
        self.item = Some(item);
        self.progress = Fixed64::ZERO;
        self.reserved_by = None;
        self.state = if cooldown == 0 {
            SlotState::Idle
        } else {
            SlotState::Receiving { cooldown }
        };
    }

    /// Remove the held item unless it is mid-send.
    pub fn take(&mut self) -> Option<ItemObjectId> {
        if self.state == SlotState::Sending {
            return None;
        }
        self.item.take()
    }

    /// Count down a receive cooldown by one frame.
    pub fn tick_cooldown(&mut self) {
        if let SlotState::Receiving { cooldown } = self.state {
            self.state = if cooldown <= 1 {
                SlotState::Idle
            } else {
                SlotState::Receiving {
                    cooldown: cooldown - 1,
                }
            };
        }
    }

    /// Abort any send in flight and drop reservations. Items stay put.
    pub fn reset(&mut self) {
        if self.state == SlotState::Sending {
            self.state = SlotState::Idle;
        }
        self.progress = Fixed64::ZERO;
        self.reserved_by = None;
    }
}
