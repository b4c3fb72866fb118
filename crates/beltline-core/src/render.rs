//! Render task generation.
//!
//! The core never draws. Each frame the host asks the factory for a flat,
//! z-ordered list of [`RenderTask`]s and draws them in order with whatever
//! sprites it registered in the [`AssetTable`].

use crate::belt::SpeedClass;
use crate::id::ItemTypeId;
use std::collections::HashMap;

/// What a sprite depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKey {
    Belt(SpeedClass),
    Inserter,
    Container,
    Assembler,
    Item(ItemTypeId),
}

/// Opaque host-side handle for a loaded sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetHandle(pub u32);

/// Key → handle table filled in by the host's resource loader.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    handles: HashMap<AssetKey, AssetHandle>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, returning the one it replaced.
    pub fn register(&mut self, key: AssetKey, handle: AssetHandle) -> Option<AssetHandle> {
        self.handles.insert(key, handle)
    }

    pub fn get(&self, key: AssetKey) -> Option<AssetHandle> {
        self.handles.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Draw layer. Lower layers are drawn first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Belts,
    Buildings,
    Items,
    Inserters,
    Overlay,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RenderStyle {
    #[default]
    Normal,
    /// Placement preview that would succeed.
    Ghost,
    /// Placement preview that collides with something.
    Blocked,
}

/// One sprite to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTask {
    pub layer: Layer,
    pub key: AssetKey,
    /// `None` if the host never registered `key`.
    pub handle: Option<AssetHandle>,
    /// Centre of the sprite in slot units.
    pub position: (f32, f32),
    /// Rotation in radians.
    pub angle: f64,
    /// Animation frame in `[0, 1)`; belts scroll, everything else is 0.
    pub frame: f32,
    pub style: RenderStyle,
}

impl RenderTask {
    pub fn new(layer: Layer, key: AssetKey, assets: &AssetTable, position: (f32, f32)) -> Self {
        Self {
            layer,
            key,
            handle: assets.get(key),
            position,
            angle: 0.0,
            frame: 0.0,
            style: RenderStyle::Normal,
        }
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_frame(mut self, frame: f32) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }
}

/// Stable sort by layer, keeping submission order within a layer.
pub fn sort_tasks(tasks: &mut [RenderTask]) {
    tasks.sort_by_key(|t| t.layer);
}
