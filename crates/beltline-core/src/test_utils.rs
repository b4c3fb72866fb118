//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::belt::SpeedClass;
use crate::catalog::{Catalog, CatalogBuilder, RecipeEntry};
use crate::config::TransportConfig;
use crate::factory::{Factory, Placement};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::sim::FrameReport;
use crate::TILE;
use beltline_spatial::{Facing, GridPosition};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Catalog
// ===========================================================================

/// Iron and copper plates (stack 100), gears (stack 50), and a 30-frame
/// recipe turning two iron plates into one gear.
pub fn test_catalog() -> Catalog {
    let mut b = CatalogBuilder::new();
    let iron = b.register_item("iron_plate", "items/iron_plate", 100);
    b.register_item("copper_plate", "items/copper_plate", 100);
    let gear = b.register_item("iron_gear", "items/iron_gear", 50);
    b.register_recipe(
        "iron_gear",
        vec![RecipeEntry {
            item: iron,
            quantity: 2,
        }],
        vec![RecipeEntry {
            item: gear,
            quantity: 1,
        }],
        30,
    );
    b.build().expect("test catalog is valid")
}

pub fn iron(catalog: &Catalog) -> ItemTypeId {
    catalog.item_id("iron_plate").expect("iron_plate registered")
}

pub fn copper(catalog: &Catalog) -> ItemTypeId {
    catalog.item_id("copper_plate").expect("copper_plate registered")
}

pub fn gear(catalog: &Catalog) -> ItemTypeId {
    catalog.item_id("iron_gear").expect("iron_gear registered")
}

pub fn gear_recipe(catalog: &Catalog) -> RecipeId {
    catalog.recipe_id("iron_gear").expect("iron_gear recipe registered")
}

// ===========================================================================
// Factory builders
// ===========================================================================

/// Empty factory over [`test_catalog`] with default tuning.
pub fn factory() -> Factory {
    Factory::new(test_catalog(), TransportConfig::default())
}

pub fn place_belt(factory: &mut Factory, at: GridPosition, facing: Facing) -> BeltNodeId {
    match factory.place(Placement::belt(at, facing, SpeedClass::Normal)) {
        Ok(ObjectRef::Belt(id)) => id,
        other => panic!("belt at {at:?}: {other:?}"),
    }
}

/// `count` belt nodes in a straight line starting at `start`.
pub fn belt_line(
    factory: &mut Factory,
    start: GridPosition,
    facing: Facing,
    count: usize,
    speed: SpeedClass,
) -> Vec<BeltNodeId> {
    (0..count as i32)
        .map(|i| {
            let at = start.step(facing, i * TILE);
            match factory.place(Placement::belt(at, facing, speed)) {
                Ok(ObjectRef::Belt(id)) => id,
                other => panic!("belt {i} at {at:?}: {other:?}"),
            }
        })
        .collect()
}

pub fn place_container(factory: &mut Factory, at: GridPosition) -> ContainerId {
    match factory.place(Placement::container(at)) {
        Ok(ObjectRef::Container(id)) => id,
        other => panic!("container at {at:?}: {other:?}"),
    }
}

pub fn place_inserter(factory: &mut Factory, at: GridPosition, facing: Facing, range: i32) -> InserterId {
    match factory.place(Placement::inserter(at, facing, range, Fixed64::ONE)) {
        Ok(ObjectRef::Inserter(id)) => id,
        other => panic!("inserter at {at:?}: {other:?}"),
    }
}

pub fn place_assembler(factory: &mut Factory, at: GridPosition, recipe: RecipeId) -> AssemblerId {
    match factory.place(Placement::assembler(at, recipe)) {
        Ok(ObjectRef::Assembler(id)) => id,
        other => panic!("assembler at {at:?}: {other:?}"),
    }
}

// ===========================================================================
// Running
// ===========================================================================

/// Run `frames` nominal frames and sum the reports.
pub fn run(factory: &mut Factory, frames: u32) -> FrameReport {
    let mut total = FrameReport::default();
    for _ in 0..frames {
        let report = factory.update(Fixed64::ONE);
        total.frame = report.frame;
        total.belt_transfers += report.belt_transfers;
        total.inserter_pickups += report.inserter_pickups;
        total.inserter_drops += report.inserter_drops;
        total.crafts_completed += report.crafts_completed;
    }
    total
}

/// Item objects currently in the arena plus units in every inventory.
pub fn total_items(factory: &Factory) -> u32 {
    let loose = factory.items().len() as u32;
    let stored: u32 = factory
        .objects()
        .iter()
        .map(|&o| match o {
            ObjectRef::Container(id) => factory.container(id).map_or(0, |c| c.inventory.total()),
            ObjectRef::Assembler(id) => factory
                .assembler(id)
                .map_or(0, |a| a.input.total() + a.output.total()),
            ObjectRef::Belt(_) | ObjectRef::Inserter(_) => 0,
        })
        .sum();
    loose + stored
}
