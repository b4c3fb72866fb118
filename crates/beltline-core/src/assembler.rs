//! Assemblers: 3x3-tile crafters bound to one recipe.
//!
//! Inserters feed recipe inputs in through [`ItemSink`] and take finished
//! outputs out through [`ItemSource`]. Between those, the assembler runs a
//! small state machine once per frame:
//!
//! - **Idle / Stalled** -- if the output has room for one craft and the
//!   input buffer covers every recipe input, consume them and start working.
//!   Otherwise record why not.
//! - **Working** -- accumulate frames; at the recipe duration, put the
//!   outputs into the output buffer and go back to Idle.

use crate::catalog::{Catalog, RecipeDef};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::item::Inventory;
use crate::link::Positioned;
use crate::transport::{Carrier, ItemSink, ItemSource, TransferContext};
use beltline_spatial::{Footprint, GridPosition};

pub const ASSEMBLER_FOOTPRINT: Footprint = Footprint::square(6);

/// Why the assembler cannot make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    MissingInputs,
    OutputFull,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CraftState {
    #[default]
    Idle,
    /// Frames spent on the current craft.
    Working { progress: Fixed64 },
    Stalled { reason: StallReason },
}

#[derive(Debug, Clone)]
pub struct Assembler {
    pub position: GridPosition,
    pub recipe: RecipeId,
    pub input: Inventory,
    pub output: Inventory,
    pub state: CraftState,
}

impl Assembler {
    pub fn new(position: GridPosition, recipe: RecipeId, def: &RecipeDef) -> Self {
        Self {
            position,
            recipe,
            input: Inventory::new(def.inputs.len().max(1)),
            output: Inventory::new(def.outputs.len().max(1)),
            state: CraftState::Idle,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        ASSEMBLER_FOOTPRINT.center(self.position)
    }

    /// Whether one more unit of `item_type` would be buffered.
    pub fn accepts(&self, item_type: ItemTypeId, catalog: &Catalog, buffer_crafts: u32) -> bool {
        let Some(def) = catalog.recipe(self.recipe) else {
            return false;
        };
        let per_craft = def.input_quantity(item_type);
        per_craft > 0
            && self.input.quantity(item_type) < per_craft.saturating_mul(buffer_crafts)
            && self.input.has_space_for(item_type, catalog.stack_size(item_type))
    }

    fn output_has_room(&self, def: &RecipeDef, catalog: &Catalog) -> bool {
        let mut probe = self.output.clone();
        def.outputs
            .iter()
            .all(|o| probe.add(o.item, o.quantity, catalog.stack_size(o.item)) == 0)
    }

    fn inputs_ready(&self, def: &RecipeDef) -> bool {
        def.inputs
            .iter()
            .all(|i| self.input.quantity(i.item) >= def.input_quantity(i.item))
    }

    /// Advance crafting by `dt` frames. Returns true if a craft finished.
    pub fn tick(&mut self, dt: Fixed64, catalog: &Catalog) -> bool {
        let Some(def) = catalog.recipe(self.recipe) else {
            return false;
        };

        if !matches!(self.state, CraftState::Working { .. }) {
            if !self.output_has_room(def, catalog) {
                self.state = CraftState::Stalled {
                    reason: StallReason::OutputFull,
                };
                return false;
            }
            if !self.inputs_ready(def) {
                self.state = CraftState::Stalled {
                    reason: StallReason::MissingInputs,
                };
                return false;
            }
            for entry in &def.inputs {
                let taken = self.input.remove(entry.item, entry.quantity);
                debug_assert_eq!(taken, entry.quantity, "inputs were checked");
            }
            self.state = CraftState::Working {
                progress: Fixed64::ZERO,
            };
        }

        let CraftState::Working { progress } = &mut self.state else {
            return false;
        };
        *progress += dt;
        if *progress < Fixed64::from_num(def.duration) {
            return false;
        }

        for entry in &def.outputs {
            let overflow = self.output.add(entry.item, entry.quantity, catalog.stack_size(entry.item));
            debug_assert_eq!(overflow, 0, "output room was checked");
        }
        self.state = CraftState::Idle;
        true
    }
}

impl Positioned for Assembler {
    fn position(&self) -> GridPosition {
        self.position
    }

    fn footprint(&self) -> Footprint {
        ASSEMBLER_FOOTPRINT
    }
}

impl ItemSource for Assembler {
    fn retrieve(&mut self, ctx: &mut TransferContext<'_>) -> Option<ItemObjectId> {
        let item_type = self.output.first_item()?;
        if self.output.remove(item_type, 1) == 0 {
            return None;
        }
        Some(ctx.items.spawn(item_type, self.center()))
    }
}

impl ItemSink for Assembler {
    fn reserve(&mut self, _by: Carrier) -> bool {
        true
    }

    fn insert(&mut self, item: ItemObjectId, _by: Carrier, ctx: &mut TransferContext<'_>) -> bool {
        let Some(item_type) = ctx.items.item_type(item) else {
            return false;
        };
        if !self.accepts(item_type, ctx.catalog, ctx.tuning.assembler_buffer_crafts) {
            return false;
        }
        if self.input.add(item_type, 1, ctx.catalog.stack_size(item_type)) != 0 {
            return false;
        }
        ctx.items.despawn(item);
        true
    }
}
