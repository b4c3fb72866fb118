use crate::id::*;
use std::collections::HashMap;

/// Static reference data for an item type. Never instanced per item unit;
/// physical [`ItemObject`](crate::item::ItemObject)s point here by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub name: String,
    /// Key the host's asset loader uses to find the item sprite.
    pub sprite: String,
    /// Maximum units of this item in one container stack.
    pub stack_size: u32,
}

/// A recipe input/output entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeEntry {
    pub item: ItemTypeId,
    pub quantity: u32,
}

/// A recipe an assembler can be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDef {
    pub name: String,
    pub inputs: Vec<RecipeEntry>,
    pub outputs: Vec<RecipeEntry>,
    /// Frames to complete one crafting cycle.
    pub duration: u32,
}

impl RecipeDef {
    /// Quantity of `item` consumed per craft, or 0 if it is not an input.
    pub fn input_quantity(&self, item: ItemTypeId) -> u32 {
        self.inputs
            .iter()
            .filter(|e| e.item == item)
            .map(|e| e.quantity)
            .sum()
    }
}

/// Builder for constructing an immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDetails>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Returns its ID.
    pub fn register_item(&mut self, name: &str, sprite: &str, stack_size: u32) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemDetails {
            name: name.to_string(),
            sprite: sprite.to_string(),
            stack_size,
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Register a recipe. Returns its ID.
    pub fn register_recipe(
        &mut self,
        name: &str,
        inputs: Vec<RecipeEntry>,
        outputs: Vec<RecipeEntry>,
        duration: u32,
    ) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(RecipeDef {
            name: name.to_string(),
            inputs,
            outputs,
            duration,
        });
        self.recipe_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Lookup item type ID by name.
    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Finalize and build the immutable catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if self.item_name_to_id.len() != self.items.len() {
            let mut seen = HashMap::new();
            for item in &self.items {
                if seen.insert(item.name.as_str(), ()).is_some() {
                    return Err(CatalogError::DuplicateName(item.name.clone()));
                }
            }
        }
        if self.recipe_name_to_id.len() != self.recipes.len() {
            let mut seen = HashMap::new();
            for recipe in &self.recipes {
                if seen.insert(recipe.name.as_str(), ()).is_some() {
                    return Err(CatalogError::DuplicateName(recipe.name.clone()));
                }
            }
        }

        for item in &self.items {
            if item.stack_size == 0 {
                return Err(CatalogError::ZeroStackSize(item.name.clone()));
            }
        }

        for recipe in &self.recipes {
            if recipe.outputs.is_empty() {
                return Err(CatalogError::NoOutputs(recipe.name.clone()));
            }
            for entry in recipe.inputs.iter().chain(recipe.outputs.iter()) {
                if entry.item.0 as usize >= self.items.len() {
                    return Err(CatalogError::InvalidItemRef(entry.item));
                }
            }
        }

        Ok(Catalog {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
        })
    }
}

/// Immutable item and recipe tables. Frozen after `build()`, owned by the
/// factory and handed to whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<ItemDetails>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl Catalog {
    pub fn item(&self, id: ItemTypeId) -> Option<&ItemDetails> {
        self.items.get(id.0 as usize)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    /// Stack size for an item, or 0 for an unknown id (nothing fits).
    pub fn stack_size(&self, id: ItemTypeId) -> u32 {
        self.item(id).map(|d| d.stack_size).unwrap_or(0)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemTypeId),
    #[error("item {0} has a stack size of zero")]
    ZeroStackSize(String),
    #[error("recipe {0} produces nothing")]
    NoOutputs(String),
}
