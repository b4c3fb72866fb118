use crate::id::*;
use crate::item::Inventory;
use crate::link::Positioned;
use crate::transport::{Carrier, ItemSink, ItemSource, TransferContext};
use beltline_spatial::{Footprint, GridPosition};

pub const CONTAINER_FOOTPRINT: Footprint = Footprint::square(2);

/// A 2x2 chest. Passive: it never acts on its own, inserters move items in
/// and out through the transport contract.
#[derive(Debug, Clone)]
pub struct Container {
    pub position: GridPosition,
    pub inventory: Inventory,
}

impl Container {
    pub fn new(position: GridPosition, stacks: usize) -> Self {
        Self {
            position,
            inventory: Inventory::new(stacks),
        }
    }

    pub fn center(&self) -> (f32, f32) {
        CONTAINER_FOOTPRINT.center(self.position)
    }
}

impl Positioned for Container {
    fn position(&self) -> GridPosition {
        self.position
    }

    fn footprint(&self) -> Footprint {
        CONTAINER_FOOTPRINT
    }
}

impl ItemSource for Container {
    /// Take one unit from the first non-empty stack as a fresh item object.
    fn retrieve(&mut self, ctx: &mut TransferContext<'_>) -> Option<ItemObjectId> {
        let item_type = self.inventory.first_item()?;
        if self.inventory.remove(item_type, 1) == 0 {
            return None;
        }
        Some(ctx.items.spawn(item_type, self.center()))
    }
}

impl ItemSink for Container {
    fn reserve(&mut self, _by: Carrier) -> bool {
        true
    }

    fn insert(&mut self, item: ItemObjectId, _by: Carrier, ctx: &mut TransferContext<'_>) -> bool {
        let Some(item_type) = ctx.items.item_type(item) else {
            return false;
        };
        let limit = ctx.catalog.stack_size(item_type);
        if !self.inventory.has_space_for(item_type, limit) {
            return false;
        }
        if self.inventory.add(item_type, 1, limit) != 0 {
            return false;
        }
        ctx.items.despawn(item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogBuilder};
    use crate::config::Tuning;
    use crate::item::ItemArena;

    fn catalog() -> (Catalog, ItemTypeId, ItemTypeId) {
        let mut b = CatalogBuilder::new();
        let iron = b.register_item("iron_plate", "items/iron_plate", 2);
        let copper = b.register_item("copper_plate", "items/copper_plate", 2);
        (b.build().unwrap(), iron, copper)
    }

    fn inserter_id() -> InserterId {
        let mut m: slotmap::SlotMap<InserterId, ()> = slotmap::SlotMap::with_key();
        m.insert(())
    }

    #[test]
    fn retrieve_spawns_item_at_centre() {
        let (catalog, iron, _) = catalog();
        let tuning = Tuning::default();
        let mut items = ItemArena::new();
        let mut ctx = TransferContext {
            items: &mut items,
            catalog: &catalog,
            tuning: &tuning,
        };
        let mut chest = Container::new(GridPosition::new(2, 4), 1);
        assert_eq!(chest.inventory.add(iron, 1, 2), 0);

        let item = chest.retrieve(&mut ctx).unwrap();
        assert_eq!(ctx.items.item_type(item), Some(iron));
        assert_eq!(ctx.items.get(item).unwrap().position, (3.0, 5.0));
        assert_eq!(chest.retrieve(&mut ctx), None);
    }

    #[test]
    fn insert_consumes_item_until_full() {
        let (catalog, iron, copper) = catalog();
        let tuning = Tuning::default();
        let mut items = ItemArena::new();
        let by = Carrier::Inserter(inserter_id());
        let mut chest = Container::new(GridPosition::ORIGIN, 1);

        let a = items.spawn(iron, (0.0, 0.0));
        let b = items.spawn(iron, (0.0, 0.0));
        let c = items.spawn(iron, (0.0, 0.0));
        let d = items.spawn(copper, (0.0, 0.0));
        let mut ctx = TransferContext {
            items: &mut items,
            catalog: &catalog,
            tuning: &tuning,
        };
        assert!(chest.reserve(by));
        assert!(chest.insert(a, by, &mut ctx));
        assert!(chest.insert(b, by, &mut ctx));
        // One stack of size 2: full.
        assert!(!chest.insert(c, by, &mut ctx));
        assert!(!chest.insert(d, by, &mut ctx));

        assert_eq!(chest.inventory.quantity(iron), 2);
        assert!(!ctx.items.contains(a));
        assert!(ctx.items.contains(c));
        assert!(ctx.items.contains(d));
    }
}
