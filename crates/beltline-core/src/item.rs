use crate::id::*;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Physical items
// ---------------------------------------------------------------------------

/// A physical item unit in the world.
///
/// Created when something retrieves from a container or assembler, destroyed
/// when one is inserted back into one. While on a belt or in an inserter's
/// hand it is referenced by id; otherwise it is loose.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemObject {
    pub item_type: ItemTypeId,
    /// Render position in continuous slot units (centre of the sprite).
    pub position: (f32, f32),
}

/// Arena of live item instances.
#[derive(Debug, Default)]
pub struct ItemArena {
    items: SlotMap<ItemObjectId, ItemObject>,
}

impl ItemArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, item_type: ItemTypeId, position: (f32, f32)) -> ItemObjectId {
        self.items.insert(ItemObject {
            item_type,
            position,
        })
    }

    pub fn despawn(&mut self, id: ItemObjectId) -> Option<ItemObject> {
        self.items.remove(id)
    }

    pub fn get(&self, id: ItemObjectId) -> Option<&ItemObject> {
        self.items.get(id)
    }

    pub fn item_type(&self, id: ItemObjectId) -> Option<ItemTypeId> {
        self.items.get(id).map(|i| i.item_type)
    }

    pub fn set_position(&mut self, id: ItemObjectId, position: (f32, f32)) {
        if let Some(item) = self.items.get_mut(id) {
            item.position = position;
        }
    }

    pub fn contains(&self, id: ItemObjectId) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemObjectId, &ItemObject)> {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Fungible storage
// ---------------------------------------------------------------------------

/// A stack of fungible items of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_type: ItemTypeId, quantity: u32) -> Self {
        Self {
            item_type,
            quantity,
        }
    }
}

/// Fixed number of stacks, each limited by a per-type stack size.
///
/// Containers and assembler buffers store counts here rather than
/// [`ItemObject`]s; an object only exists while something is moving it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    stacks: Vec<Option<ItemStack>>,
}

impl Inventory {
    pub fn new(stack_count: usize) -> Self {
        Self {
            stacks: vec![None; stack_count],
        }
    }

    /// Add items, topping up existing stacks first. Returns the amount that
    /// didn't fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn add(&mut self, item_type: ItemTypeId, quantity: u32, stack_limit: u32) -> u32 {
        let mut remaining = quantity;

        for stack in self.stacks.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if stack.item_type == item_type && stack.quantity < stack_limit {
                let to_add = remaining.min(stack_limit - stack.quantity);
                stack.quantity += to_add;
                remaining -= to_add;
            }
        }

        for slot in self.stacks.iter_mut() {
            if remaining == 0 || stack_limit == 0 {
                break;
            }
            if slot.is_none() {
                let to_add = remaining.min(stack_limit);
                *slot = Some(ItemStack::new(item_type, to_add));
                remaining -= to_add;
            }
        }

        remaining
    }

    /// Remove items. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, item_type: ItemTypeId, quantity: u32) -> u32 {
        let mut removed = 0;
        for slot in self.stacks.iter_mut().rev() {
            if removed == quantity {
                break;
            }
            if let Some(stack) = slot {
                if stack.item_type == item_type {
                    let take = (quantity - removed).min(stack.quantity);
                    stack.quantity -= take;
                    removed += take;
                    if stack.quantity == 0 {
                        *slot = None;
                    }
                }
            }
        }
        removed
    }

    /// Quantity of a specific item type across all stacks.
    pub fn quantity(&self, item_type: ItemTypeId) -> u32 {
        self.stacks
            .iter()
            .flatten()
            .filter(|s| s.item_type == item_type)
            .map(|s| s.quantity)
            .sum()
    }

    /// Total items across all types.
    pub fn total(&self) -> u32 {
        self.stacks.iter().flatten().map(|s| s.quantity).sum()
    }

    /// Whether one more unit of `item_type` fits.
    pub fn has_space_for(&self, item_type: ItemTypeId, stack_limit: u32) -> bool {
        if stack_limit == 0 {
            return false;
        }
        self.stacks.iter().any(|slot| match slot {
            None => true,
            Some(s) => s.item_type == item_type && s.quantity < stack_limit,
        })
    }

    /// Whether any stack is empty.
    pub fn has_free_stack(&self) -> bool {
        self.stacks.iter().any(Option::is_none)
    }

    /// The item type in the first non-empty stack.
    pub fn first_item(&self) -> Option<ItemTypeId> {
        self.stacks.iter().flatten().next().map(|s| s.item_type)
    }

    /// Non-empty stacks in slot order.
    pub fn stacks(&self) -> impl Iterator<Item = &ItemStack> {
        self.stacks.iter().flatten()
    }

    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IRON: ItemTypeId = ItemTypeId(0);
    const COPPER: ItemTypeId = ItemTypeId(1);

    #[test]
    fn arena_spawn_and_despawn() {
        let mut arena = ItemArena::new();
        let a = arena.spawn(IRON, (0.5, 0.5));
        let b = arena.spawn(COPPER, (1.5, 0.5));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.item_type(b), Some(COPPER));

        arena.set_position(a, (3.0, 4.0));
        assert_eq!(arena.get(a).unwrap().position, (3.0, 4.0));

        let gone = arena.despawn(a).unwrap();
        assert_eq!(gone.item_type, IRON);
        assert!(!arena.contains(a));
        assert_eq!(arena.item_type(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn inventory_add_and_remove() {
        let mut inv = Inventory::new(2);
        assert_eq!(inv.add(IRON, 50, 100), 0);
        assert_eq!(inv.quantity(IRON), 50);
        assert_eq!(inv.remove(IRON, 30), 30);
        assert_eq!(inv.quantity(IRON), 20);
    }

    #[test]
    fn inventory_spills_into_new_stacks() {
        let mut inv = Inventory::new(2);
        assert_eq!(inv.add(IRON, 150, 100), 0);
        assert_eq!(inv.stacks().count(), 2);
        assert_eq!(inv.quantity(IRON), 150);

        // Both stacks are in use; copper has nowhere to go.
        assert_eq!(inv.add(COPPER, 5, 100), 5);
        assert!(!inv.has_space_for(COPPER, 100));
        assert!(inv.has_space_for(IRON, 100));
    }

    #[test]
    fn inventory_overflow() {
        let mut inv = Inventory::new(1);
        assert_eq!(inv.add(IRON, 15, 10), 5);
        assert_eq!(inv.quantity(IRON), 10);
        assert!(!inv.has_space_for(IRON, 10));
    }

    #[test]
    fn inventory_remove_frees_stack() {
        let mut inv = Inventory::new(1);
        let _ = inv.add(IRON, 5, 10);
        assert_eq!(inv.remove(IRON, 10), 5);
        assert!(inv.has_free_stack());
        assert_eq!(inv.first_item(), None);
        assert_eq!(inv.add(COPPER, 3, 10), 0);
        assert_eq!(inv.first_item(), Some(COPPER));
    }

    #[test]
    fn inventory_multiple_types() {
        let mut inv = Inventory::new(4);
        let _ = inv.add(IRON, 30, 100);
        let _ = inv.add(COPPER, 20, 100);
        assert_eq!(inv.total(), 50);
        assert_eq!(inv.first_item(), Some(IRON));
        assert_eq!(inv.stack_count(), 4);
    }

    #[test]
    fn zero_stack_limit_accepts_nothing() {
        let mut inv = Inventory::new(2);
        assert_eq!(inv.add(IRON, 3, 0), 3);
        assert!(!inv.has_space_for(IRON, 0));
    }
}
