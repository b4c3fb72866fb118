use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed 2x2 belt node.
    pub struct BeltNodeId;

    /// Identifies one of the four slots owned by a belt node.
    pub struct SlotId;

    /// Identifies a placed inserter.
    pub struct InserterId;

    /// Identifies a placed container.
    pub struct ContainerId;

    /// Identifies a placed assembler.
    pub struct AssemblerId;

    /// Identifies a physical item instance.
    pub struct ItemObjectId;
}

/// Identifies an item type in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a recipe in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// A placed object of any kind. This is the closed set of top-level things
/// a factory owns; slots are never placed on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Belt(BeltNodeId),
    Inserter(InserterId),
    Container(ContainerId),
    Assembler(AssemblerId),
}
