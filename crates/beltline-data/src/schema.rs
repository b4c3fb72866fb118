//! Serde data file structs for factory content.
//!
//! These define the on-disk format of the catalog. They are deserialized
//! from RON, JSON, or TOML and then resolved into a
//! [`Catalog`](beltline_core::catalog::Catalog) by the loader. Tuning is
//! read straight into [`TransportConfig`](beltline_core::config::TransportConfig).

use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    /// Asset key for the item sprite. Defaults to `items/<name>`.
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default = "default_stack_size")]
    pub stack_size: u32,
}

fn default_stack_size() -> u32 {
    50
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe input or output, in short tuple form or full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipeEntryData {
    /// Short form: `("item_name", quantity)`.
    Short(String, u32),
    /// Full form: `{ item = "item_name", quantity = 2 }`.
    Full { item: String, quantity: u32 },
}

impl RecipeEntryData {
    pub fn item(&self) -> &str {
        match self {
            RecipeEntryData::Short(item, _) | RecipeEntryData::Full { item, .. } => item,
        }
    }

    pub fn quantity(&self) -> u32 {
        match *self {
            RecipeEntryData::Short(_, quantity) | RecipeEntryData::Full { quantity, .. } => quantity,
        }
    }
}

/// A recipe definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<RecipeEntryData>,
    pub outputs: Vec<RecipeEntryData>,
    /// Frames per craft.
    pub duration: u32,
}

// ===========================================================================
// Catalog file
// ===========================================================================

/// Top level of a `catalog.{ron,toml,json}` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ron_catalog_with_both_entry_forms() {
        let text = r#"(
            items: [
                (name: "iron_plate", stack_size: 100),
                (name: "iron_gear", sprite: Some("sprites/gear")),
            ],
            recipes: [
                (
                    name: "iron_gear",
                    inputs: [("iron_plate", 2)],
                    outputs: [(item: "iron_gear", quantity: 1)],
                    duration: 30,
                ),
            ],
        )"#;
        let data: CatalogData = ron::from_str(text).unwrap();
        assert_eq!(data.items.len(), 2);
        assert_eq!(data.items[0].stack_size, 100);
        assert_eq!(data.items[1].stack_size, 50);
        assert_eq!(data.items[1].sprite.as_deref(), Some("sprites/gear"));

        let recipe = &data.recipes[0];
        assert_eq!(recipe.inputs[0].item(), "iron_plate");
        assert_eq!(recipe.inputs[0].quantity(), 2);
        assert_eq!(recipe.outputs[0].item(), "iron_gear");
        assert_eq!(recipe.outputs[0].quantity(), 1);
    }

    #[test]
    fn toml_catalog() {
        let text = r#"
[[items]]
name = "iron_plate"

[[recipes]]
name = "smelt"
outputs = [["iron_plate", 1]]
duration = 10
"#;
        let data: CatalogData = toml::from_str(text).unwrap();
        assert_eq!(data.items[0].name, "iron_plate");
        assert!(data.recipes[0].inputs.is_empty());
        assert_eq!(data.recipes[0].outputs[0].quantity(), 1);
    }

    #[test]
    fn json_catalog_defaults_to_empty() {
        let data: CatalogData = serde_json::from_str("{}").unwrap();
        assert!(data.items.is_empty());
        assert!(data.recipes.is_empty());
    }
}
