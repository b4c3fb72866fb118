//! Grid geometry for the belt topology engine.
//!
//! Everything in a factory lives on one axis-aligned integer grid measured
//! in *slot units* (the finest resolution: one quarter of a belt tile).
//! This crate provides the position and facing primitives, rectangular
//! footprints, and the [`GridIndex`] that maps a cell to whatever occupies
//! it. It knows nothing about belts or items; the simulation crate decides
//! what an occupant is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A cell on the slot-unit grid. `y` grows downward (screen space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const ORIGIN: GridPosition = GridPosition { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset by a raw `(dx, dy)` pair.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Step `distance` cells in the given facing.
    pub fn step(self, facing: Facing, distance: i32) -> Self {
        let (dx, dy) = facing.vector();
        self.offset(dx * distance, dy * distance)
    }

    /// Snap down to the nearest multiple of `cell` on both axes.
    ///
    /// Used by hosts to align a cursor to a tile boundary before placing.
    pub fn snapped(self, cell: i32) -> Self {
        debug_assert!(cell > 0, "snap cell must be positive");
        Self::new(self.x.div_euclid(cell) * cell, self.y.div_euclid(cell) * cell)
    }
}

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// One of the four cardinal directions an object can point.
///
/// The discriminant order follows the angle: East is 0, South is π/2,
/// West is π and North is 3π/2. Because `y` grows downward, a positive
/// angle turns clockwise on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    East,
    South,
    West,
    North,
}

impl Facing {
    /// All four facings in angle order.
    pub fn all() -> [Facing; 4] {
        [Facing::East, Facing::South, Facing::West, Facing::North]
    }

    /// Angle in radians, in `{0, π/2, π, 3π/2}`.
    pub fn angle(self) -> f64 {
        match self {
            Facing::East => 0.0,
            Facing::South => FRAC_PI_2,
            Facing::West => PI,
            Facing::North => PI + FRAC_PI_2,
        }
    }

    /// Unit step for this facing: `(round(cos θ), round(sin θ))`.
    pub fn vector(self) -> (i32, i32) {
        match self {
            Facing::East => (1, 0),
            Facing::South => (0, 1),
            Facing::West => (-1, 0),
            Facing::North => (0, -1),
        }
    }

    /// Rotate 90 degrees clockwise (on screen).
    pub fn rotate_cw(self) -> Self {
        match self {
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
            Facing::North => Facing::East,
        }
    }

    pub fn opposite(self) -> Self {
        self.rotate_cw().rotate_cw()
    }

    /// True for East/West.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Facing::East | Facing::West)
    }
}

// ---------------------------------------------------------------------------
// Footprint
// ---------------------------------------------------------------------------

/// The rectangular extent of a placed object, in slot units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A square footprint.
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// Extent along the axis of `facing` (how far one step forward moves).
    pub fn extent_along(&self, facing: Facing) -> i32 {
        if facing.is_horizontal() {
            self.width as i32
        } else {
            self.height as i32
        }
    }

    /// True if `pos` lies inside this footprint placed at `origin`.
    pub fn contains(&self, origin: GridPosition, pos: GridPosition) -> bool {
        pos.x >= origin.x
            && pos.y >= origin.y
            && pos.x < origin.x + self.width as i32
            && pos.y < origin.y + self.height as i32
    }

    /// True if two placed footprints share at least one cell.
    pub fn intersects(
        &self,
        origin: GridPosition,
        other: &Footprint,
        other_origin: GridPosition,
    ) -> bool {
        origin.x < other_origin.x + other.width as i32
            && other_origin.x < origin.x + self.width as i32
            && origin.y < other_origin.y + other.height as i32
            && other_origin.y < origin.y + self.height as i32
    }

    /// Centre of the footprint in continuous slot units.
    pub fn center(&self, origin: GridPosition) -> (f32, f32) {
        (
            origin.x as f32 + self.width as f32 / 2.0,
            origin.y as f32 + self.height as f32 / 2.0,
        )
    }
}

// ---------------------------------------------------------------------------
// GridIndex
// ---------------------------------------------------------------------------

/// Cell → occupant map, rebuilt from scratch on every recalculation.
///
/// No merging: `put` overwrites. Callers guarantee (via placement checks)
/// that two live objects never register the same cell.
#[derive(Debug, Clone)]
pub struct GridIndex<T> {
    cells: BTreeMap<GridPosition, T>,
}

impl<T> Default for GridIndex<T> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }
}

impl<T: Copy> GridIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Register `occupant` at `pos`. Returns the previous occupant, if any.
    pub fn put(&mut self, pos: GridPosition, occupant: T) -> Option<T> {
        self.cells.insert(pos, occupant)
    }

    pub fn get(&self, pos: GridPosition) -> Option<T> {
        self.cells.get(&pos).copied()
    }
}
