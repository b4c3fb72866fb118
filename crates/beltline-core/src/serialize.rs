//! Save files.
//!
//! Saving walks the placed objects in placement order and turns each into an
//! [`ObjectRecord`] tagged with its kind. Loading looks every tag up in a
//! [`RecordRegistry`], places the object it describes through the same
//! validation as interactive placement, restores whatever it was holding,
//! and recalculates once at the end. The resulting topology is the one the
//! same placements would have produced by hand.
//!
//! Files are `bitcode` bytes, or JSON text with the `json` feature. Both
//! carry a [`SaveHeader`] that is checked before any record is applied.

use crate::assembler::CraftState;
use crate::belt::SpeedClass;
use crate::catalog::Catalog;
use crate::config::TransportConfig;
use crate::factory::{Factory, PlaceError, Placement};
use crate::fixed::Fixed64;
use crate::id::*;
use crate::item::Inventory;
use crate::link::TopologyError;
use crate::transport::SlotState;
use beltline_spatial::{Facing, GridPosition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a beltline save file.
pub const SAVE_MAGIC: u32 = 0xBE17_5A7E;

/// Current format version. Increment when breaking the record layout.
pub const FORMAT_VERSION: u32 = 1;

pub const BELT_TAG: &str = "belt";
pub const INSERTER_TAG: &str = "inserter";
pub const CONTAINER_TAG: &str = "container";
pub const ASSEMBLER_TAG: &str = "assembler";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[cfg(feature = "json")]
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[cfg(feature = "json")]
    #[error("json decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version {0} (this build reads {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("no constructor registered for tag {0:?}")]
    UnknownTag(String),
    #[error("{tag} record is missing {field}")]
    MissingField { tag: String, field: &'static str },
    #[error("unknown recipe {0:?}")]
    UnknownRecipe(String),
    #[error("unknown item type {0:?}")]
    UnknownItem(ItemTypeId),
    #[error("could not restore contents of {0:?}")]
    Contents(ObjectRef),
    #[error(transparent)]
    Place(#[from] PlaceError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    /// Frame counter at the time of saving.
    pub frame: u64,
}

impl SaveHeader {
    pub fn new(frame: u64) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
            frame,
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.magic != SAVE_MAGIC {
            return Err(LoadError::InvalidMagic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// An item sitting on one belt slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub index: u8,
    pub item: ItemTypeId,
    /// Remaining receive cooldown, 0 if idle.
    pub cooldown: u32,
}

/// An item in an inserter's hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldRecord {
    pub item: ItemTypeId,
    /// Swing progress as raw fixed-point bits.
    pub progress_bits: i64,
}

/// An item object not held by anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LooseRecord {
    pub item: ItemTypeId,
    pub x: f32,
    pub y: f32,
}

/// One placed object. Fields that don't apply to `tag` are left empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub tag: String,
    pub position: GridPosition,
    pub facing: Facing,
    #[serde(default)]
    pub speed: Option<SpeedClass>,
    #[serde(default)]
    pub range: Option<i32>,
    /// Inserter swing speed as raw fixed-point bits.
    #[serde(default)]
    pub swing_bits: Option<i64>,
    /// Recipe name, so saves survive catalog reordering.
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotRecord>,
    #[serde(default)]
    pub held: Option<HeldRecord>,
    /// Container inventory or assembler input buffer.
    #[serde(default)]
    pub inventory: Option<Inventory>,
    /// Assembler output buffer.
    #[serde(default)]
    pub output: Option<Inventory>,
    /// Progress of the assembler's current craft as raw fixed-point bits.
    #[serde(default)]
    pub crafting_bits: Option<i64>,
}

impl ObjectRecord {
    pub fn new(tag: &str, position: GridPosition, facing: Facing) -> Self {
        Self {
            tag: tag.to_string(),
            position,
            facing,
            speed: None,
            range: None,
            swing_bits: None,
            recipe: None,
            slots: Vec::new(),
            held: None,
            inventory: None,
            output: None,
            crafting_bits: None,
        }
    }

    fn require<T: Copy>(&self, value: Option<T>, field: &'static str) -> Result<T, LoadError> {
        value.ok_or_else(|| LoadError::MissingField {
            tag: self.tag.clone(),
            field,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub header: SaveHeader,
    pub records: Vec<ObjectRecord>,
    #[serde(default)]
    pub loose: Vec<LooseRecord>,
}

impl SaveFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveError> {
        bitcode::serialize(self).map_err(|e| SaveError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, LoadError> {
        let file: SaveFile = bitcode::deserialize(data).map_err(|e| LoadError::Decode(e.to_string()))?;
        file.header.validate()?;
        Ok(file)
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "json")]
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let file: SaveFile = serde_json::from_str(text)?;
        file.header.validate()?;
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Turns a record into the placement it describes.
pub type RecordConstructor = fn(&ObjectRecord, &Catalog) -> Result<Placement, LoadError>;

/// Type tag → constructor table. [`Default`] registers the four built-in
/// object kinds.
#[derive(Debug, Clone)]
pub struct RecordRegistry {
    constructors: HashMap<String, RecordConstructor>,
}

impl RecordRegistry {
    /// A registry with no tags at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor, returning the one it replaced.
    pub fn register(&mut self, tag: &str, constructor: RecordConstructor) -> Option<RecordConstructor> {
        self.constructors.insert(tag.to_string(), constructor)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn construct(&self, record: &ObjectRecord, catalog: &Catalog) -> Result<Placement, LoadError> {
        let constructor = self
            .constructors
            .get(&record.tag)
            .ok_or_else(|| LoadError::UnknownTag(record.tag.clone()))?;
        constructor(record, catalog)
    }
}

impl Default for RecordRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(BELT_TAG, construct_belt);
        registry.register(INSERTER_TAG, construct_inserter);
        registry.register(CONTAINER_TAG, construct_container);
        registry.register(ASSEMBLER_TAG, construct_assembler);
        registry
    }
}

fn construct_belt(record: &ObjectRecord, _catalog: &Catalog) -> Result<Placement, LoadError> {
    Ok(Placement::belt(
        record.position,
        record.facing,
        record.speed.unwrap_or_default(),
    ))
}

fn construct_inserter(record: &ObjectRecord, _catalog: &Catalog) -> Result<Placement, LoadError> {
    let range = record.require(record.range, "range")?;
    let swing = record.swing_bits.map_or(Fixed64::ONE, Fixed64::from_bits);
    Ok(Placement::inserter(record.position, record.facing, range, swing))
}

fn construct_container(record: &ObjectRecord, _catalog: &Catalog) -> Result<Placement, LoadError> {
    Ok(Placement::container(record.position))
}

fn construct_assembler(record: &ObjectRecord, catalog: &Catalog) -> Result<Placement, LoadError> {
    let name = record.recipe.as_deref().ok_or_else(|| LoadError::MissingField {
        tag: record.tag.clone(),
        field: "recipe",
    })?;
    let recipe = catalog
        .recipe_id(name)
        .ok_or_else(|| LoadError::UnknownRecipe(name.to_string()))?;
    Ok(Placement::assembler(record.position, recipe))
}

// ---------------------------------------------------------------------------
// Factory save / load
// ---------------------------------------------------------------------------

/// Outcome of applying a save file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub placed: usize,
    /// Records that failed to construct, place or restore.
    pub skipped: usize,
    pub loose: usize,
}

impl Factory {
    /// One record per placed object, in placement order.
    pub fn records(&self) -> Vec<ObjectRecord> {
        self.objects()
            .iter()
            .filter_map(|&object| self.record(object))
            .collect()
    }

    fn record(&self, object: ObjectRef) -> Option<ObjectRecord> {
        let items = self.items();
        match object {
            ObjectRef::Belt(id) => {
                let node = self.belts().node(id)?;
                let mut record = ObjectRecord::new(BELT_TAG, node.position, node.facing);
                record.speed = Some(node.speed);
                for (index, &sid) in node.slots.iter().enumerate() {
                    let Some(slot) = self.belts().slot(sid) else {
                        continue;
                    };
                    let Some(item) = slot.transport.item.and_then(|i| items.item_type(i)) else {
                        continue;
                    };
                    let cooldown = match slot.transport.state {
                        SlotState::Receiving { cooldown } => cooldown,
                        SlotState::Idle | SlotState::Sending => 0,
                    };
                    record.slots.push(SlotRecord {
                        index: index as u8,
                        item,
                        cooldown,
                    });
                }
                Some(record)
            }
            ObjectRef::Inserter(id) => {
                let ins = self.inserter(id)?;
                let mut record = ObjectRecord::new(INSERTER_TAG, ins.position, ins.facing);
                record.range = Some(ins.range);
                record.swing_bits = Some(ins.speed.to_bits());
                record.held = ins.held.and_then(|i| items.item_type(i)).map(|item| HeldRecord {
                    item,
                    progress_bits: ins.progress.to_bits(),
                });
                Some(record)
            }
            ObjectRef::Container(id) => {
                let chest = self.container(id)?;
                let mut record = ObjectRecord::new(CONTAINER_TAG, chest.position, Facing::East);
                record.inventory = Some(chest.inventory.clone());
                Some(record)
            }
            ObjectRef::Assembler(id) => {
                let asm = self.assembler(id)?;
                let mut record = ObjectRecord::new(ASSEMBLER_TAG, asm.position, Facing::East);
                record.recipe = self.catalog().recipe(asm.recipe).map(|r| r.name.clone());
                record.inventory = Some(asm.input.clone());
                record.output = Some(asm.output.clone());
                if let CraftState::Working { progress } = asm.state {
                    record.crafting_bits = Some(progress.to_bits());
                }
                Some(record)
            }
        }
    }

    pub fn save_file(&self) -> SaveFile {
        let loose = self
            .loose_items()
            .into_iter()
            .filter_map(|id| self.items().get(id))
            .map(|item| LooseRecord {
                item: item.item_type,
                x: item.position.0,
                y: item.position.1,
            })
            .collect();
        SaveFile {
            header: SaveHeader::new(self.frame()),
            records: self.records(),
            loose,
        }
    }

    pub fn save(&self) -> Result<Vec<u8>, SaveError> {
        self.save_file().to_bytes()
    }

    #[cfg(feature = "json")]
    pub fn save_json(&self) -> Result<String, SaveError> {
        self.save_file().to_json()
    }

    /// Build a factory from bitcode bytes.
    pub fn load(
        data: &[u8],
        catalog: Catalog,
        config: TransportConfig,
        registry: &RecordRegistry,
    ) -> Result<(Factory, LoadReport), LoadError> {
        let file = SaveFile::from_bytes(data)?;
        let mut factory = Factory::new(catalog, config);
        let report = factory.apply_save(&file, registry)?;
        Ok((factory, report))
    }

    #[cfg(feature = "json")]
    pub fn load_json(
        text: &str,
        catalog: Catalog,
        config: TransportConfig,
        registry: &RecordRegistry,
    ) -> Result<(Factory, LoadReport), LoadError> {
        let file = SaveFile::from_json(text)?;
        let mut factory = Factory::new(catalog, config);
        let report = factory.apply_save(&file, registry)?;
        Ok((factory, report))
    }

    /// Apply a save file's records in order, then recalculate once.
    ///
    /// A record that cannot be constructed, placed or restored is skipped
    /// with a warning; the rest of the file still loads.
    pub fn apply_save(&mut self, file: &SaveFile, registry: &RecordRegistry) -> Result<LoadReport, LoadError> {
        file.header.validate()?;
        let mut report = LoadReport::default();

        for record in &file.records {
            match self.apply_record(record, registry) {
                Ok(()) => report.placed += 1,
                Err(e) => {
                    log::warn!("skipping {} record at {:?}: {e}", record.tag, record.position);
                    report.skipped += 1;
                }
            }
        }
        for loose in &file.loose {
            if self.catalog().item(loose.item).is_none() {
                log::warn!("skipping loose item of unknown type {:?}", loose.item);
                continue;
            }
            self.spawn_loose(loose.item, (loose.x, loose.y));
            report.loose += 1;
        }

        self.set_frame(file.header.frame);
        self.recalculate()?;
        log::debug!(
            "loaded {} records ({} skipped), {} loose items, frame {}",
            report.placed,
            report.skipped,
            report.loose,
            file.header.frame
        );
        Ok(report)
    }

    fn apply_record(&mut self, record: &ObjectRecord, registry: &RecordRegistry) -> Result<(), LoadError> {
        let placement = registry.construct(record, self.catalog())?;
        self.check_contents(record)?;
        let object = self.place_unlinked(placement)?;

        let restored = match object {
            ObjectRef::Belt(id) => record
                .slots
                .iter()
                .all(|s| self.restore_slot(id, s.index, s.item, s.cooldown)),
            ObjectRef::Inserter(id) => match &record.held {
                Some(held) => self.restore_held(id, held.item, Fixed64::from_bits(held.progress_bits)),
                None => true,
            },
            ObjectRef::Container(_) | ObjectRef::Assembler(_) => match &record.inventory {
                Some(inventory) => self.restore_inventory(
                    object,
                    inventory.clone(),
                    record.output.clone(),
                    record.crafting_bits.map(Fixed64::from_bits),
                ),
                None => true,
            },
        };
        if !restored {
            return Err(LoadError::Contents(object));
        }
        Ok(())
    }

    /// Every item type the record mentions must be in the catalog.
    fn check_contents(&self, record: &ObjectRecord) -> Result<(), LoadError> {
        let catalog = self.catalog();
        let known = |item: ItemTypeId| {
            if catalog.item(item).is_some() {
                Ok(())
            } else {
                Err(LoadError::UnknownItem(item))
            }
        };
        for slot in &record.slots {
            known(slot.item)?;
        }
        if let Some(held) = &record.held {
            known(held.item)?;
        }
        for inventory in record.inventory.iter().chain(record.output.iter()) {
            for stack in inventory.stacks() {
                known(stack.item_type)?;
            }
        }
        Ok(())
    }
}
