//! Mouse and keyboard editing surface.
//!
//! The host translates device coordinates into grid cells and forwards
//! events here. The editor snaps the cursor to tile boundaries, keeps the
//! current tool and facing, drag-places belts (turning each one towards the
//! next so that a dragged line bends into corners), and renders a ghost of
//! what a click would place.

use crate::TILE;
use crate::belt::SpeedClass;
use crate::factory::{Factory, Placement};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::render::{AssetTable, Layer, RenderStyle, RenderTask};
use beltline_spatial::{Facing, GridPosition};

/// What a left click places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Belt(SpeedClass),
    Inserter { range: i32 },
    Container,
    Assembler(RecipeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Place with the current tool.
    Left,
    /// Remove whatever is under the cursor.
    Right,
}

/// A placement the editor would attempt, and whether it currently fits.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub placement: Placement,
    pub valid: bool,
}

#[derive(Debug, Clone)]
pub struct Editor {
    tool: Option<Tool>,
    facing: Facing,
    cursor: GridPosition,
    pressed: Option<MouseButton>,
    /// Last belt placed during the current drag.
    dragged: Option<(GridPosition, ObjectRef)>,
    inserter_speed: Fixed64,
}

impl Default for Editor {
    fn default() -> Self {
        Self {
            tool: None,
            facing: Facing::East,
            cursor: GridPosition::ORIGIN,
            pressed: None,
            dragged: None,
            inserter_speed: Fixed64::ONE,
        }
    }
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, tool: Option<Tool>) {
        self.tool = tool;
    }

    pub fn tool(&self) -> Option<Tool> {
        self.tool
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn cursor(&self) -> GridPosition {
        self.cursor
    }

    pub fn set_inserter_speed(&mut self, speed: Fixed64) {
        self.inserter_speed = speed;
    }

    /// The placement under the cursor for the current tool.
    pub fn candidate(&self, factory: &Factory) -> Option<Candidate> {
        let placement = match self.tool? {
            Tool::Belt(speed) => Placement::belt(self.cursor, self.facing, speed),
            Tool::Inserter { range } => {
                Placement::inserter(self.cursor, self.facing, range, self.inserter_speed)
            }
            Tool::Container => Placement::container(self.cursor),
            Tool::Assembler(recipe) => Placement::assembler(self.cursor, recipe),
        };
        let valid = factory.validate(&placement).is_ok();
        Some(Candidate { placement, valid })
    }

    /// Cursor moved. While dragging, places or removes on each new tile.
    /// Returns true if the factory changed.
    pub fn mousemove(&mut self, factory: &mut Factory, pos: GridPosition) -> bool {
        let cell = pos.snapped(TILE);
        if cell == self.cursor {
            return false;
        }
        let from = self.cursor;
        self.cursor = cell;

        match self.pressed {
            Some(MouseButton::Left) => {
                if matches!(self.tool, Some(Tool::Belt(_))) {
                    self.bend_drag(factory, from, cell);
                }
                self.click_place(factory)
            }
            Some(MouseButton::Right) => self.click_remove(factory, cell),
            None => false,
        }
    }

    pub fn mousedown(&mut self, factory: &mut Factory, pos: GridPosition, button: MouseButton) -> bool {
        self.cursor = pos.snapped(TILE);
        self.pressed = Some(button);
        self.dragged = None;
        match button {
            MouseButton::Left => self.click_place(factory),
            MouseButton::Right => self.click_remove(factory, pos),
        }
    }

    pub fn mouseup(&mut self, pos: GridPosition, button: MouseButton) {
        self.cursor = pos.snapped(TILE);
        if self.pressed == Some(button) {
            self.pressed = None;
            self.dragged = None;
        }
    }

    /// Turn the tool clockwise. With no tool, turn the object under the
    /// cursor instead.
    pub fn rotate(&mut self, factory: &mut Factory) -> bool {
        if self.tool.is_some() {
            self.facing = self.facing.rotate_cw();
            return true;
        }
        let Some(object) = factory.object_at(self.cursor) else {
            return false;
        };
        match factory.rotate_object(object) {
            Ok(rotated) => rotated,
            Err(e) => {
                log::error!("rotate {object:?}: {e}");
                false
            }
        }
    }

    /// Try to place a candidate. Invalid candidates are refused quietly.
    pub fn place(&mut self, factory: &mut Factory, candidate: &Candidate) -> bool {
        match factory.place(candidate.placement.clone()) {
            Ok(object) => {
                if matches!(object, ObjectRef::Belt(_)) {
                    self.dragged = Some((candidate.placement.position(), object));
                }
                true
            }
            Err(e) => {
                log::trace!("editor place refused: {e}");
                false
            }
        }
    }

    pub fn remove(&mut self, factory: &mut Factory, object: ObjectRef) -> bool {
        match factory.remove(object) {
            Ok(removed) => removed,
            Err(e) => {
                log::error!("remove {object:?}: {e}");
                false
            }
        }
    }

    /// Ghost preview of the candidate, drawn on the overlay layer.
    pub fn render(&self, factory: &Factory, assets: &AssetTable) -> Vec<RenderTask> {
        let Some(candidate) = self.candidate(factory) else {
            return Vec::new();
        };
        let placement = &candidate.placement;
        let style = if candidate.valid {
            RenderStyle::Ghost
        } else {
            RenderStyle::Blocked
        };
        vec![RenderTask::new(
            Layer::Overlay,
            placement.asset_key(),
            assets,
            placement.footprint().center(placement.position()),
        )
        .with_angle(placement.facing().angle())
        .with_style(style)]
    }

    fn click_place(&mut self, factory: &mut Factory) -> bool {
        match self.candidate(factory) {
            Some(candidate) if candidate.valid => self.place(factory, &candidate),
            _ => false,
        }
    }

    fn click_remove(&mut self, factory: &mut Factory, pos: GridPosition) -> bool {
        match factory.object_at(pos) {
            Some(object) => self.remove(factory, object),
            None => false,
        }
    }

    /// Face the drag direction, and turn the belt placed on the previous
    /// tile to point at the new one.
    fn bend_drag(&mut self, factory: &mut Factory, from: GridPosition, to: GridPosition) {
        let Some(direction) = Facing::all()
            .into_iter()
            .find(|&f| from.step(f, TILE) == to)
        else {
            return;
        };
        self.facing = direction;
        if let Some((at, object)) = self.dragged {
            if at == from {
                if let Err(e) = factory.set_facing(object, direction) {
                    log::error!("re-facing dragged belt: {e}");
                }
            }
        }
    }
}
