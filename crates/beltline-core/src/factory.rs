//! The factory orchestrator.
//!
//! [`Factory`] owns every placed object, the item arena, the catalog and the
//! resolved tuning. All topology lives in links that [`Factory::recalculate`]
//! rebuilds from scratch after every edit; [`Factory::update`] then advances
//! one frame in a fixed order (belts, assemblers, inserters, item render
//! positions).

use std::collections::HashSet;
use std::hash::Hasher;

use crate::assembler::{ASSEMBLER_FOOTPRINT, Assembler, CraftState};
use crate::belt::{BeltNetwork, NODE_FOOTPRINT, SpeedClass};
use crate::catalog::Catalog;
use crate::config::{TransportConfig, Tuning};
use crate::container::{CONTAINER_FOOTPRINT, Container};
use crate::corner;
use crate::fixed::{Fixed64, Frames, fixed64_to_f32};
use crate::id::*;
use crate::inserter::{ArmEvent, INSERTER_FOOTPRINT, Inserter};
use crate::item::{Inventory, ItemArena};
use crate::link::{Grid, Occupant, Positioned, TopologyError, link_nodes, link_slots};
use crate::render::{AssetKey, AssetTable, Layer, RenderTask, sort_tasks};
use crate::sim::{FrameReport, StateHash};
use crate::transport::{
    Carrier, Endpoint, ItemSink, ItemSource, Ports, SlotState, TransferContext,
};
use beltline_spatial::{Facing, Footprint, GridPosition};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// A request to place one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Belt {
        position: GridPosition,
        facing: Facing,
        speed: SpeedClass,
    },
    Inserter {
        position: GridPosition,
        facing: Facing,
        range: i32,
        speed: Fixed64,
    },
    Container {
        position: GridPosition,
    },
    Assembler {
        position: GridPosition,
        recipe: RecipeId,
    },
}

impl Placement {
    pub fn belt(position: GridPosition, facing: Facing, speed: SpeedClass) -> Self {
        Placement::Belt {
            position,
            facing,
            speed,
        }
    }

    pub fn inserter(position: GridPosition, facing: Facing, range: i32, speed: Fixed64) -> Self {
        Placement::Inserter {
            position,
            facing,
            range,
            speed,
        }
    }

    pub fn container(position: GridPosition) -> Self {
        Placement::Container { position }
    }

    pub fn assembler(position: GridPosition, recipe: RecipeId) -> Self {
        Placement::Assembler { position, recipe }
    }

    pub fn position(&self) -> GridPosition {
        match *self {
            Placement::Belt { position, .. }
            | Placement::Inserter { position, .. }
            | Placement::Container { position }
            | Placement::Assembler { position, .. } => position,
        }
    }

    pub fn footprint(&self) -> Footprint {
        match self {
            Placement::Belt { .. } => NODE_FOOTPRINT,
            Placement::Inserter { .. } => INSERTER_FOOTPRINT,
            Placement::Container { .. } => CONTAINER_FOOTPRINT,
            Placement::Assembler { .. } => ASSEMBLER_FOOTPRINT,
        }
    }

    /// Facing of directional objects; East for the rest.
    pub fn facing(&self) -> Facing {
        match *self {
            Placement::Belt { facing, .. } | Placement::Inserter { facing, .. } => facing,
            Placement::Container { .. } | Placement::Assembler { .. } => Facing::East,
        }
    }

    pub fn asset_key(&self) -> AssetKey {
        match *self {
            Placement::Belt { speed, .. } => AssetKey::Belt(speed),
            Placement::Inserter { .. } => AssetKey::Inserter,
            Placement::Container { .. } => AssetKey::Container,
            Placement::Assembler { .. } => AssetKey::Assembler,
        }
    }

    /// Same placement at another position.
    pub fn at(mut self, to: GridPosition) -> Self {
        match &mut self {
            Placement::Belt { position, .. }
            | Placement::Inserter { position, .. }
            | Placement::Container { position }
            | Placement::Assembler { position, .. } => *position = to,
        }
        self
    }

    /// Same placement turned 90° clockwise. Non-directional objects are
    /// returned unchanged.
    pub fn rotated(mut self) -> Self {
        if let Placement::Belt { facing, .. } | Placement::Inserter { facing, .. } = &mut self {
            *facing = facing.rotate_cw();
        }
        self
    }
}

/// Why a placement was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaceError {
    #[error("placement at {position:?} overlaps {with:?}")]
    Overlaps {
        position: GridPosition,
        with: ObjectRef,
    },
    #[error("unknown recipe {0:?}")]
    UnknownRecipe(RecipeId),
    #[error("inserter range must be positive, got {0}")]
    InvalidRange(i32),
    #[error("inserter speed must be positive")]
    InvalidSpeed,
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Counts from one recalculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalcSummary {
    pub nodes: usize,
    pub slots: usize,
    pub inserters: usize,
    pub corners: usize,
    /// Items pushed off slots that became dead corners.
    pub ejected: usize,
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct Factory {
    catalog: Catalog,
    config: TransportConfig,
    tuning: Tuning,
    belts: BeltNetwork,
    inserters: SlotMap<InserterId, Inserter>,
    containers: SlotMap<ContainerId, Container>,
    assemblers: SlotMap<AssemblerId, Assembler>,
    items: ItemArena,
    grid: Grid,
    /// Every placed object, in placement order.
    objects: Vec<ObjectRef>,
    frame: Frames,
}

impl Factory {
    pub fn new(catalog: Catalog, config: TransportConfig) -> Self {
        let tuning = config.tuning();
        Self {
            catalog,
            config,
            tuning,
            belts: BeltNetwork::new(),
            inserters: SlotMap::with_key(),
            containers: SlotMap::with_key(),
            assemblers: SlotMap::with_key(),
            items: ItemArena::new(),
            grid: Grid::new(),
            objects: Vec::new(),
            frame: 0,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn belts(&self) -> &BeltNetwork {
        &self.belts
    }

    pub fn items(&self) -> &ItemArena {
        &self.items
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn inserter(&self, id: InserterId) -> Option<&Inserter> {
        self.inserters.get(id)
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn assembler(&self, id: AssemblerId) -> Option<&Assembler> {
        self.assemblers.get(id)
    }

    /// Every placed object in placement order.
    pub fn objects(&self) -> &[ObjectRef] {
        &self.objects
    }

    pub fn frame(&self) -> Frames {
        self.frame
    }

    pub(crate) fn set_frame(&mut self, frame: Frames) {
        self.frame = frame;
    }

    fn node_order(&self) -> Vec<BeltNodeId> {
        self.objects
            .iter()
            .filter_map(|o| match *o {
                ObjectRef::Belt(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Origin and footprint of a placed object.
    pub fn bounds(&self, object: ObjectRef) -> Option<(GridPosition, Footprint)> {
        fn of<P: Positioned>(p: &P) -> (GridPosition, Footprint) {
            (p.position(), p.footprint())
        }
        match object {
            ObjectRef::Belt(id) => self.belts.node(id).map(of),
            ObjectRef::Inserter(id) => self.inserters.get(id).map(of),
            ObjectRef::Container(id) => self.containers.get(id).map(of),
            ObjectRef::Assembler(id) => self.assemblers.get(id).map(of),
        }
    }

    /// The first placed object whose footprint overlaps the given area.
    pub fn intersects(&self, position: GridPosition, footprint: Footprint) -> Option<ObjectRef> {
        self.objects.iter().copied().find(|&o| {
            self.bounds(o)
                .is_some_and(|(at, fp)| fp.intersects(at, &footprint, position))
        })
    }

    /// The topmost (most recently placed) object covering `cell`.
    pub fn object_at(&self, cell: GridPosition) -> Option<ObjectRef> {
        self.objects
            .iter()
            .rev()
            .copied()
            .find(|&o| self.bounds(o).is_some_and(|(at, fp)| fp.contains(at, cell)))
    }

    // -- editing ------------------------------------------------------------

    /// Check a placement without applying it.
    pub fn validate(&self, placement: &Placement) -> Result<(), PlaceError> {
        match *placement {
            Placement::Inserter { range, .. } if range <= 0 => {
                return Err(PlaceError::InvalidRange(range));
            }
            Placement::Inserter { speed, .. } if speed <= Fixed64::ZERO => {
                return Err(PlaceError::InvalidSpeed);
            }
            Placement::Assembler { recipe, .. } if self.catalog.recipe(recipe).is_none() => {
                return Err(PlaceError::UnknownRecipe(recipe));
            }
            _ => {}
        }
        let position = placement.position();
        if let Some(with) = self.intersects(position, placement.footprint()) {
            return Err(PlaceError::Overlaps { position, with });
        }
        Ok(())
    }

    /// Place an object and recalculate.
    pub fn place(&mut self, placement: Placement) -> Result<ObjectRef, PlaceError> {
        let object = self.place_unlinked(placement)?;
        self.recalculate()?;
        Ok(object)
    }

    /// Validate and insert without recalculating. Loading places a whole
    /// file this way and recalculates once at the end.
    pub(crate) fn place_unlinked(&mut self, placement: Placement) -> Result<ObjectRef, PlaceError> {
        if let Err(e) = self.validate(&placement) {
            log::trace!("rejected {placement:?}: {e}");
            return Err(e);
        }
        let object = match placement {
            Placement::Belt {
                position,
                facing,
                speed,
            } => ObjectRef::Belt(self.belts.spawn(position, facing, speed)),
            Placement::Inserter {
                position,
                facing,
                range,
                speed,
            } => ObjectRef::Inserter(self.inserters.insert(Inserter::new(position, facing, range, speed))),
            Placement::Container { position } => ObjectRef::Container(
                self.containers
                    .insert(Container::new(position, self.tuning.container_stacks)),
            ),
            Placement::Assembler { position, recipe } => {
                let def = self
                    .catalog
                    .recipe(recipe)
                    .ok_or(PlaceError::UnknownRecipe(recipe))?;
                ObjectRef::Assembler(self.assemblers.insert(Assembler::new(position, recipe, def)))
            }
        };
        self.objects.push(object);
        log::debug!("placed {object:?} at {:?}", placement.position());
        Ok(object)
    }

    /// Remove an object. Everything it held is left as loose items at its
    /// position. Returns false if the object no longer exists.
    pub fn remove(&mut self, object: ObjectRef) -> Result<bool, TopologyError> {
        let Some(index) = self.objects.iter().position(|&o| o == object) else {
            return Ok(false);
        };
        self.objects.remove(index);

        match object {
            ObjectRef::Belt(id) => {
                // Items keep their last render position.
                self.belts.despawn(id);
            }
            ObjectRef::Inserter(id) => {
                self.inserters.remove(id);
            }
            ObjectRef::Container(id) => {
                if let Some(chest) = self.containers.remove(id) {
                    let at = chest.center();
                    for stack in chest.inventory.stacks() {
                        self.spill(stack.item_type, stack.quantity, at);
                    }
                }
            }
            ObjectRef::Assembler(id) => {
                if let Some(asm) = self.assemblers.remove(id) {
                    let at = asm.center();
                    for stack in asm.input.stacks().chain(asm.output.stacks()) {
                        self.spill(stack.item_type, stack.quantity, at);
                    }
                }
            }
        }
        log::debug!("removed {object:?}");
        self.recalculate()?;
        Ok(true)
    }

    fn spill(&mut self, item_type: ItemTypeId, quantity: u32, at: (f32, f32)) {
        for _ in 0..quantity {
            self.items.spawn(item_type, at);
        }
    }

    /// Turn a belt or inserter 90° clockwise. Returns false for objects
    /// without a facing.
    pub fn rotate_object(&mut self, object: ObjectRef) -> Result<bool, TopologyError> {
        let current = match object {
            ObjectRef::Belt(id) => self.belts.node(id).map(|n| n.facing),
            ObjectRef::Inserter(id) => self.inserters.get(id).map(|i| i.facing),
            ObjectRef::Container(_) | ObjectRef::Assembler(_) => None,
        };
        match current {
            Some(facing) => self.set_facing(object, facing.rotate_cw()),
            None => Ok(false),
        }
    }

    /// Point a belt or inserter in a new direction and recalculate.
    pub fn set_facing(&mut self, object: ObjectRef, facing: Facing) -> Result<bool, TopologyError> {
        match object {
            ObjectRef::Belt(id) if self.belts.node(id).is_some() => {
                self.belts.set_facing(id, facing);
            }
            ObjectRef::Inserter(id) => {
                let Some(inserter) = self.inserters.get_mut(id) else {
                    return Ok(false);
                };
                inserter.facing = facing;
            }
            _ => return Ok(false),
        }
        self.recalculate()?;
        Ok(true)
    }

    /// Create an item at `cell`. If a live, free belt slot is there the item
    /// goes onto it; otherwise it is left loose.
    pub fn spawn_item(&mut self, cell: GridPosition, item_type: ItemTypeId) -> ItemObjectId {
        let centre = (cell.x as f32 + 0.5, cell.y as f32 + 0.5);
        let item = self.items.spawn(item_type, centre);
        if let Some(Occupant::Slot(sid)) = self.grid.get(cell) {
            if let Some(slot) = self.belts.slot_mut(sid) {
                if !slot.dead && slot.transport.can_receive(Carrier::Slot(sid)) {
                    slot.transport.receive(item, 0);
                }
            }
        }
        item
    }

    /// Add items straight into a container's inventory. Returns how many
    /// didn't fit.
    pub fn stock_container(&mut self, id: ContainerId, item_type: ItemTypeId, quantity: u32) -> u32 {
        let limit = self.catalog.stack_size(item_type);
        match self.containers.get_mut(id) {
            Some(chest) => chest.inventory.add(item_type, quantity, limit),
            None => quantity,
        }
    }

    /// Items not held by any slot, inserter or inventory.
    pub fn loose_items(&self) -> Vec<ItemObjectId> {
        let mut held: HashSet<ItemObjectId> = self.belts.held_items().map(|(_, i)| i).collect();
        held.extend(self.inserters.values().filter_map(|i| i.held));
        self.items
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !held.contains(id))
            .collect()
    }

    // -- persistence hooks --------------------------------------------------

    /// Put a fresh item on slot `index` of `node`. False if the slot is
    /// missing or already holds something.
    pub(crate) fn restore_slot(
        &mut self,
        node: BeltNodeId,
        index: u8,
        item_type: ItemTypeId,
        cooldown: u32,
    ) -> bool {
        let Some(slot) = self.belts.slot_of(node, index).and_then(|s| self.belts.slot_mut(s)) else {
            return false;
        };
        if !slot.transport.is_empty() {
            return false;
        }
        let item = self.items.spawn(item_type, slot.center());
        slot.transport.receive(item, cooldown);
        true
    }

    /// Put a fresh item in an inserter's hand, `progress` of the way
    /// through its swing.
    pub(crate) fn restore_held(&mut self, id: InserterId, item_type: ItemTypeId, progress: Fixed64) -> bool {
        let Some(inserter) = self.inserters.get_mut(id) else {
            return false;
        };
        if inserter.held.is_some() {
            return false;
        }
        inserter.progress = progress.clamp(Fixed64::ZERO, Fixed64::ONE);
        let at = inserter.held_position(self.tuning.arc_height);
        inserter.held = Some(self.items.spawn(item_type, at));
        true
    }

    /// Replace a container's inventory, or an assembler's buffers and craft
    /// progress.
    pub(crate) fn restore_inventory(
        &mut self,
        object: ObjectRef,
        input: Inventory,
        output: Option<Inventory>,
        crafting: Option<Fixed64>,
    ) -> bool {
        match object {
            ObjectRef::Container(id) => match self.containers.get_mut(id) {
                Some(chest) => {
                    chest.inventory = input;
                    true
                }
                None => false,
            },
            ObjectRef::Assembler(id) => match self.assemblers.get_mut(id) {
                Some(asm) => {
                    asm.input = input;
                    if let Some(output) = output {
                        asm.output = output;
                    }
                    asm.state = match crafting {
                        Some(progress) => CraftState::Working { progress },
                        None => CraftState::Idle,
                    };
                    true
                }
                None => false,
            },
            ObjectRef::Belt(_) | ObjectRef::Inserter(_) => false,
        }
    }

    pub(crate) fn spawn_loose(&mut self, item_type: ItemTypeId, at: (f32, f32)) -> ItemObjectId {
        self.items.spawn(item_type, at)
    }

    // -- recalculation ------------------------------------------------------

    /// Rebuild every link from positions and facings.
    ///
    /// Reset, grid rebuild, node and slot linking, corner correction, slot
    /// relinking, then inserter endpoints. Items on slots that turn into
    /// dead corners become loose.
    pub fn recalculate(&mut self) -> Result<RecalcSummary, TopologyError> {
        let order = self.node_order();

        self.belts.reset_links();
        for inserter in self.inserters.values_mut() {
            inserter.reset_endpoints();
        }
        self.rebuild_grid(&order);

        link_nodes(&mut self.belts, &self.grid, &order)?;
        link_slots(&mut self.belts, &self.grid, &order)?;

        let mut ejected = Vec::new();
        let mut corners = 0;
        for &node in &order {
            if corner::correct(&mut self.belts, node, &mut ejected)?.is_some() {
                corners += 1;
            }
        }
        link_slots(&mut self.belts, &self.grid, &order)?;

        let resolved: Vec<_> = self
            .inserters
            .iter()
            .map(|(id, ins)| {
                (
                    id,
                    self.resolve_endpoint(ins.input_cell()),
                    self.resolve_endpoint(ins.output_cell()),
                )
            })
            .collect();
        for (id, input, output) in resolved {
            if let Some(inserter) = self.inserters.get_mut(id) {
                inserter.input = input;
                inserter.output = output;
            }
        }

        for (assembler, asm) in &self.assemblers {
            if self.catalog.recipe(asm.recipe).is_none() {
                return Err(TopologyError::UnknownRecipe {
                    assembler,
                    recipe: asm.recipe,
                });
            }
        }

        let summary = RecalcSummary {
            nodes: self.belts.node_count(),
            slots: self.belts.slot_count(),
            inserters: self.inserters.len(),
            corners,
            ejected: ejected.len(),
        };
        log::debug!(
            "recalculated: {} nodes, {} slots, {} inserters, {} corners",
            summary.nodes,
            summary.slots,
            summary.inserters,
            summary.corners
        );
        Ok(summary)
    }

    fn rebuild_grid(&mut self, order: &[BeltNodeId]) {
        self.grid.clear();
        for &node in order {
            let Some(node) = self.belts.node(node) else {
                continue;
            };
            for &sid in &node.slots {
                if let Some(slot) = self.belts.slot(sid) {
                    self.grid.put(slot.position, Occupant::Slot(sid));
                }
            }
        }
        for object in &self.objects {
            match *object {
                ObjectRef::Belt(_) => {}
                ObjectRef::Inserter(id) => {
                    if let Some(ins) = self.inserters.get(id) {
                        self.grid.put(ins.position, Occupant::Inserter(id));
                    }
                }
                ObjectRef::Container(id) => {
                    if let Some(chest) = self.containers.get(id) {
                        self.grid.put(chest.position, Occupant::Container(id));
                    }
                }
                ObjectRef::Assembler(id) => {
                    if let Some(asm) = self.assemblers.get(id) {
                        self.grid.put(asm.position, Occupant::Assembler(id));
                    }
                }
            }
        }
    }

    /// What an inserter arm reaching into `cell` would touch.
    fn resolve_endpoint(&self, cell: GridPosition) -> Option<Endpoint> {
        match self.grid.get(cell) {
            Some(Occupant::Slot(sid)) => {
                return self
                    .belts
                    .slot(sid)
                    .filter(|s| !s.dead)
                    .map(|_| Endpoint::Slot(sid));
            }
            Some(Occupant::Container(id)) => return Some(Endpoint::Container(id)),
            Some(Occupant::Assembler(id)) => return Some(Endpoint::Assembler(id)),
            Some(Occupant::Inserter(_)) | None => {}
        }
        // Only origins are on the grid; fall back to hit-testing footprints.
        self.objects.iter().find_map(|&o| match o {
            ObjectRef::Container(id) => self
                .containers
                .get(id)
                .filter(|c| c.occupies(cell))
                .map(|_| Endpoint::Container(id)),
            ObjectRef::Assembler(id) => self
                .assemblers
                .get(id)
                .filter(|a| a.occupies(cell))
                .map(|_| Endpoint::Assembler(id)),
            _ => None,
        })
    }

    // -- frame loop ---------------------------------------------------------

    /// Advance one frame by `dt` (in frames; 1 is a nominal frame).
    pub fn update(&mut self, dt: Fixed64) -> FrameReport {
        let mut report = FrameReport {
            belt_transfers: self.belts.advance(dt, &self.tuning),
            ..FrameReport::default()
        };

        for asm in self.assemblers.values_mut() {
            if asm.tick(dt, &self.catalog) {
                report.crafts_completed += 1;
            }
        }

        let inserter_order: Vec<InserterId> = self
            .objects
            .iter()
            .filter_map(|o| match *o {
                ObjectRef::Inserter(id) => Some(id),
                _ => None,
            })
            .collect();
        let mut ports = FactoryPorts {
            belts: &mut self.belts,
            containers: &mut self.containers,
            assemblers: &mut self.assemblers,
        };
        let mut ctx = TransferContext {
            items: &mut self.items,
            catalog: &self.catalog,
            tuning: &self.tuning,
        };
        for id in inserter_order {
            let Some(inserter) = self.inserters.get_mut(id) else {
                continue;
            };
            match inserter.update(id, dt, &self.tuning, &mut ports, &mut ctx) {
                ArmEvent::PickedUp => report.inserter_pickups += 1,
                ArmEvent::Dropped => report.inserter_drops += 1,
                ArmEvent::Idle | ArmEvent::Moving | ArmEvent::Blocked => {}
            }
        }

        self.belts.sync_item_positions(&mut self.items);
        for inserter in self.inserters.values() {
            if let Some(item) = inserter.held {
                self.items
                    .set_position(item, inserter.held_position(self.tuning.arc_height));
            }
        }

        self.frame += 1;
        report.frame = self.frame;
        report
    }

    // -- output -------------------------------------------------------------

    /// Z-ordered draw list: belts, then buildings, items, inserters.
    pub fn render_tasks(&self, assets: &AssetTable) -> Vec<RenderTask> {
        let mut tasks = Vec::with_capacity(self.belts.slot_count() + self.items.len());

        for &object in &self.objects {
            match object {
                ObjectRef::Belt(id) => {
                    let Some(node) = self.belts.node(id) else {
                        continue;
                    };
                    let frame = fixed64_to_f32(node.animation_phase);
                    for slot in node.slots.iter().filter_map(|&s| self.belts.slot(s)) {
                        if slot.dead {
                            continue;
                        }
                        tasks.push(
                            RenderTask::new(Layer::Belts, AssetKey::Belt(node.speed), assets, slot.center())
                                .with_angle(slot.render_angle)
                                .with_frame(frame),
                        );
                    }
                }
                ObjectRef::Inserter(id) => {
                    if let Some(ins) = self.inserters.get(id) {
                        tasks.push(
                            RenderTask::new(
                                Layer::Inserters,
                                AssetKey::Inserter,
                                assets,
                                INSERTER_FOOTPRINT.center(ins.position),
                            )
                            .with_angle(ins.facing.angle())
                            .with_frame(fixed64_to_f32(ins.progress)),
                        );
                    }
                }
                ObjectRef::Container(id) => {
                    if let Some(chest) = self.containers.get(id) {
                        tasks.push(RenderTask::new(
                            Layer::Buildings,
                            AssetKey::Container,
                            assets,
                            chest.center(),
                        ));
                    }
                }
                ObjectRef::Assembler(id) => {
                    if let Some(asm) = self.assemblers.get(id) {
                        let frame = match asm.state {
                            CraftState::Working { progress } => {
                                let duration = self
                                    .catalog
                                    .recipe(asm.recipe)
                                    .map_or(1, |r| r.duration.max(1));
                                fixed64_to_f32(progress) / duration as f32
                            }
                            CraftState::Idle | CraftState::Stalled { .. } => 0.0,
                        };
                        tasks.push(
                            RenderTask::new(Layer::Buildings, AssetKey::Assembler, assets, asm.center())
                                .with_frame(frame),
                        );
                    }
                }
            }
        }

        for (_, item) in self.items.iter() {
            tasks.push(RenderTask::new(
                Layer::Items,
                AssetKey::Item(item.item_type),
                assets,
                item.position,
            ));
        }

        sort_tasks(&mut tasks);
        tasks
    }

    /// Deterministic hash of topology and occupancy, keyed by position so
    /// that a reloaded factory hashes the same as the original.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.frame);
        for &object in &self.objects {
            match object {
                ObjectRef::Belt(id) => {
                    let Some(node) = self.belts.node(id) else {
                        continue;
                    };
                    h.write_u8(0);
                    h.write_position(node.position);
                    h.write_u8(node.facing as u8);
                    h.write_u8(node.speed as u8);
                    for slot in node.slots.iter().filter_map(|&s| self.belts.slot(s)) {
                        h.write_flag(slot.dead);
                        match slot.next.and_then(|n| self.belts.slot(n)) {
                            Some(next) => {
                                h.write_flag(true);
                                h.write_position(next.position);
                            }
                            None => h.write_flag(false),
                        }
                        let item_type = slot.transport.item.and_then(|i| self.items.item_type(i));
                        h.write_optional(item_type.map(|t| t.0));
                        h.write_u32(match slot.transport.state {
                            SlotState::Idle => 0,
                            SlotState::Sending => 1,
                            SlotState::Receiving { cooldown } => 2 + cooldown,
                        });
                        h.write_fixed64(slot.transport.progress);
                    }
                }
                ObjectRef::Inserter(id) => {
                    let Some(ins) = self.inserters.get(id) else {
                        continue;
                    };
                    h.write_u8(1);
                    h.write_position(ins.position);
                    h.write_u8(ins.facing as u8);
                    h.write_i32(ins.range);
                    h.write_fixed64(ins.progress);
                    let held = ins.held.and_then(|i| self.items.item_type(i));
                    h.write_optional(held.map(|t| t.0));
                    h.write_flag(ins.input.is_some());
                    h.write_flag(ins.output.is_some());
                }
                ObjectRef::Container(id) => {
                    let Some(chest) = self.containers.get(id) else {
                        continue;
                    };
                    h.write_u8(2);
                    h.write_position(chest.position);
                    for stack in chest.inventory.stacks() {
                        h.write_u32(stack.item_type.0);
                        h.write_u32(stack.quantity);
                    }
                }
                ObjectRef::Assembler(id) => {
                    let Some(asm) = self.assemblers.get(id) else {
                        continue;
                    };
                    h.write_u8(3);
                    h.write_position(asm.position);
                    h.write_u32(asm.recipe.0);
                    for stack in asm.input.stacks().chain(asm.output.stacks()) {
                        h.write_u32(stack.item_type.0);
                        h.write_u32(stack.quantity);
                    }
                }
            }
        }
        h.write_u64(self.items.len() as u64);
        h.finish()
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("frame", &self.frame)
            .field("objects", &self.objects.len())
            .field("nodes", &self.belts.node_count())
            .field("items", &self.items.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Endpoint dispatch
// ---------------------------------------------------------------------------

/// Disjoint borrows of the arenas an inserter can reach.
struct FactoryPorts<'a> {
    belts: &'a mut BeltNetwork,
    containers: &'a mut SlotMap<ContainerId, Container>,
    assemblers: &'a mut SlotMap<AssemblerId, Assembler>,
}

impl FactoryPorts<'_> {
    fn source(&mut self, at: Endpoint) -> Option<&mut dyn ItemSource> {
        match at {
            Endpoint::Slot(id) => self.belts.slot_mut(id).map(|s| s as &mut dyn ItemSource),
            Endpoint::Container(id) => self.containers.get_mut(id).map(|c| c as &mut dyn ItemSource),
            Endpoint::Assembler(id) => self.assemblers.get_mut(id).map(|a| a as &mut dyn ItemSource),
        }
    }

    fn sink(&mut self, at: Endpoint) -> Option<&mut dyn ItemSink> {
        match at {
            Endpoint::Slot(id) => self.belts.slot_mut(id).map(|s| s as &mut dyn ItemSink),
            Endpoint::Container(id) => self.containers.get_mut(id).map(|c| c as &mut dyn ItemSink),
            Endpoint::Assembler(id) => self.assemblers.get_mut(id).map(|a| a as &mut dyn ItemSink),
        }
    }
}

impl Ports for FactoryPorts<'_> {
    fn retrieve(&mut self, at: Endpoint, ctx: &mut TransferContext<'_>) -> Option<ItemObjectId> {
        self.source(at)?.retrieve(ctx)
    }

    fn reserve(&mut self, at: Endpoint, by: Carrier) -> bool {
        self.sink(at).is_some_and(|s| s.reserve(by))
    }

    fn insert(
        &mut self,
        at: Endpoint,
        item: ItemObjectId,
        by: Carrier,
        ctx: &mut TransferContext<'_>,
    ) -> bool {
        self.sink(at).is_some_and(|s| s.insert(item, by, ctx))
    }
}
