//! Inserters: arms that lift an item from behind them and drop it in front.
//!
//! Reach is measured from the footprint edge: range 1 touches the cell
//! directly adjacent to the arm on either side, range 2 skips one cell.

use crate::config::Tuning;
use crate::fixed::{Fixed64, fixed64_to_f32, lerp};
use crate::id::*;
use crate::link::{Linkable, Positioned};
use crate::transport::{Carrier, Endpoint, Ports, TransferContext};
use beltline_spatial::{Facing, Footprint, GridPosition};
use std::f32::consts::PI;

pub const INSERTER_FOOTPRINT: Footprint = Footprint::square(2);

/// What an inserter did during one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmEvent {
    Idle,
    PickedUp,
    Moving,
    Dropped,
    /// At full extension, output refused the item.
    Blocked,
}

#[derive(Debug, Clone)]
pub struct Inserter {
    pub position: GridPosition,
    pub facing: Facing,
    /// Reach in slot units, on each side.
    pub range: i32,
    /// Swings per unit of `inserter_constant`.
    pub speed: Fixed64,
    pub held: Option<ItemObjectId>,
    /// 0 at the input, 1 at the output.
    pub progress: Fixed64,
    pub input: Option<Endpoint>,
    pub output: Option<Endpoint>,
}

impl Inserter {
    pub fn new(position: GridPosition, facing: Facing, range: i32, speed: Fixed64) -> Self {
        Self {
            position,
            facing,
            range: range.max(1),
            speed,
            held: None,
            progress: Fixed64::ZERO,
            input: None,
            output: None,
        }
    }

    /// First cell outside the footprint towards `side`, in the row or
    /// column of the arm's origin.
    fn edge_cell(&self, side: Facing) -> GridPosition {
        let reach = match side {
            Facing::East | Facing::South => INSERTER_FOOTPRINT.extent_along(side),
            Facing::West | Facing::North => 1,
        };
        self.position.step(side, reach)
    }

    /// Cell the arm picks from.
    pub fn input_cell(&self) -> GridPosition {
        let back = self.facing.opposite();
        self.edge_cell(back).step(back, self.range - 1)
    }

    /// Cell the arm drops onto.
    pub fn output_cell(&self) -> GridPosition {
        self.edge_cell(self.facing).step(self.facing, self.range - 1)
    }

    /// Point on the swing at progress `t`: straight between the endpoint
    /// cell centres, lifted towards screen-up by `sin(πt) · range · arc_height`.
    pub fn arc_point(&self, t: f32, arc_height: f32) -> (f32, f32) {
        let centre = |cell: GridPosition| (cell.x as f32 + 0.5, cell.y as f32 + 0.5);
        let (x, y) = lerp(centre(self.input_cell()), centre(self.output_cell()), t);
        let lift = (PI * t).sin() * self.range as f32 * arc_height;
        (x, y - lift)
    }

    /// Where the held item should be drawn.
    pub fn held_position(&self, arc_height: f32) -> (f32, f32) {
        self.arc_point(fixed64_to_f32(self.progress), arc_height)
    }

    /// Forget resolved endpoints. A held item and swing progress are kept.
    pub fn reset_endpoints(&mut self) {
        self.input = None;
        self.output = None;
    }

    /// Run one frame of the arm.
    ///
    /// Empty: try to retrieve from the input. Holding: swing towards the
    /// output, and at full extension reserve then insert. A refused insert
    /// leaves the arm extended with the item until the output frees up.
    pub fn update(
        &mut self,
        id: InserterId,
        dt: Fixed64,
        tuning: &Tuning,
        ports: &mut impl Ports,
        ctx: &mut TransferContext<'_>,
    ) -> ArmEvent {
        let Some(item) = self.held else {
            self.progress = Fixed64::ZERO;
            let Some(input) = self.input else {
                return ArmEvent::Idle;
            };
            return match ports.retrieve(input, ctx) {
                Some(item) => {
                    self.held = Some(item);
                    ctx.items.set_position(item, self.held_position(tuning.arc_height));
                    ArmEvent::PickedUp
                }
                None => ArmEvent::Idle,
            };
        };

        self.progress = (self.progress + dt * self.speed * tuning.inserter_constant).min(Fixed64::ONE);
        if self.progress < Fixed64::ONE {
            return ArmEvent::Moving;
        }

        let Some(output) = self.output else {
            return ArmEvent::Blocked;
        };
        let by = Carrier::Inserter(id);
        if ports.reserve(output, by) && ports.insert(output, item, by, ctx) {
            self.held = None;
            self.progress = Fixed64::ZERO;
            ArmEvent::Dropped
        } else {
            log::trace!("inserter {id:?} blocked at {output:?}");
            ArmEvent::Blocked
        }
    }
}

impl Positioned for Inserter {
    fn position(&self) -> GridPosition {
        self.position
    }

    fn footprint(&self) -> Footprint {
        INSERTER_FOOTPRINT
    }
}

impl Linkable for Inserter {
    fn facing(&self) -> Facing {
        self.facing
    }

    fn forward_cell(&self) -> GridPosition {
        self.output_cell()
    }
}
