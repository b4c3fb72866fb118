//! Beltline Core -- the belt/link topology engine for a grid factory sandbox.
//!
//! Placed objects (belt nodes, inserters, containers, assemblers) know only
//! their own position and facing. This crate derives the directed flow graph
//! between them, straightens out curved belts, and moves items along that
//! graph one frame at a time.
//!
//! # Recalculation Protocol
//!
//! Every topology-changing edit (place, rotate, remove, load) runs
//! [`factory::Factory::recalculate`] synchronously:
//!
//! 1. **Reset** -- clear every `next`/`prev` link, corner mark and reservation.
//! 2. **Grid** -- rebuild the [`link::Grid`] from the placed objects.
//! 3. **Link** -- node-to-node, then slot-to-slot forward lookups.
//! 4. **Correct** -- turn nodes with exactly one unfed slot into curves.
//! 5. **Re-link** -- slot linking again, honouring the corner rewiring.
//! 6. **Endpoints** -- inserters resolve their input and output cells.
//!
//! # Frame Pipeline
//!
//! [`factory::Factory::update`] advances one frame in a fixed order:
//! belts, assemblers, inserters, then item render positions. Every item
//! hand-off goes through the transport contract in [`transport`]
//! (`reserve`, `retrieve`, `insert`), which reports success instead of
//! failing loudly.
//!
//! ```rust,ignore
//! let mut factory = Factory::new(catalog, TransportConfig::default());
//! factory.place(Placement::belt(GridPosition::new(0, 0), Facing::East, SpeedClass::Normal))?;
//! factory.update(Fixed64::ONE);
//! let tasks = factory.render_tasks(&assets);
//! ```
//!
//! # Key Types
//!
//! - [`factory::Factory`] -- owns every object and runs recalculation/update.
//! - [`belt::BeltNode`] / [`belt::BeltSlot`] -- 2x2 belt tiles and their slots.
//! - [`transport::SlotTransport`] -- the Idle/Sending/Receiving state machine.
//! - [`corner`] -- the turn table that converts a node into a curve.
//! - [`inserter::Inserter`] -- range-based arm with arc motion.
//! - [`editor::Editor`] -- mouse/keyboard surface for the host UI.
//! - [`serialize`] -- save records and the type-tag registry.

pub mod assembler;
pub mod belt;
pub mod catalog;
pub mod config;
pub mod container;
pub mod corner;
pub mod editor;
pub mod factory;
pub mod fixed;
pub mod id;
pub mod inserter;
pub mod item;
pub mod link;
pub mod render;
pub mod serialize;
pub mod sim;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use beltline_spatial::{Facing, Footprint, GridIndex, GridPosition};

/// Side length of one placeable tile, in slot units.
pub const TILE: i32 = 2;
