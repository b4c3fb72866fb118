//! Tuning knobs for transport and crafting.
//!
//! [`TransportConfig`] is the human-editable form (plain floats, loaded from
//! data files by `beltline-data`). The factory resolves it once into
//! [`Tuning`], whose fixed-point values are what the frame loop reads.

use crate::belt::SpeedClass;
use crate::fixed::{f64_to_fixed64, Fixed64};
use serde::{Deserialize, Serialize};

/// Transport and crafting parameters, as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Fraction of a slot a ×1 belt moves an item per frame.
    pub transport_constant: f64,
    /// Frames a slot refuses new items after receiving one.
    pub receive_cooldown_frames: u32,
    /// Throughput multiplier for [`SpeedClass::Normal`].
    pub normal_speed: f64,
    /// Throughput multiplier for [`SpeedClass::Fast`].
    pub fast_speed: f64,
    /// Throughput multiplier for [`SpeedClass::Super`].
    pub super_speed: f64,
    /// Fraction of a full swing an inserter of speed 1 covers per frame.
    pub inserter_constant: f64,
    /// Arc lift per slot of inserter range, in slot units.
    pub arc_height: f64,
    /// Number of stacks in a container.
    pub container_stacks: u32,
    /// How many crafts' worth of each input an assembler will buffer.
    pub assembler_buffer_crafts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_constant: 0.125,
            receive_cooldown_frames: 2,
            normal_speed: 1.0,
            fast_speed: 2.0,
            super_speed: 3.0,
            inserter_constant: 0.0625,
            arc_height: 0.5,
            container_stacks: 16,
            assembler_buffer_crafts: 2,
        }
    }
}

impl TransportConfig {
    /// Resolve into the fixed-point form used by the frame loop.
    pub fn tuning(&self) -> Tuning {
        Tuning {
            transport_constant: f64_to_fixed64(self.transport_constant),
            receive_cooldown: self.receive_cooldown_frames,
            speeds: [
                f64_to_fixed64(self.normal_speed),
                f64_to_fixed64(self.fast_speed),
                f64_to_fixed64(self.super_speed),
            ],
            inserter_constant: f64_to_fixed64(self.inserter_constant),
            arc_height: self.arc_height as f32,
            container_stacks: self.container_stacks as usize,
            assembler_buffer_crafts: self.assembler_buffer_crafts.max(1),
        }
    }
}

/// Resolved transport parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub transport_constant: Fixed64,
    pub receive_cooldown: u32,
    speeds: [Fixed64; 3],
    pub inserter_constant: Fixed64,
    pub arc_height: f32,
    pub container_stacks: usize,
    pub assembler_buffer_crafts: u32,
}

impl Tuning {
    /// Throughput multiplier for a belt speed class.
    pub fn speed(&self, class: SpeedClass) -> Fixed64 {
        match class {
            SpeedClass::Normal => self.speeds[0],
            SpeedClass::Fast => self.speeds[1],
            SpeedClass::Super => self.speeds[2],
        }
    }

    /// Progress a belt slot of `class` loses over a frame delta.
    pub fn belt_step(&self, class: SpeedClass, dt: Fixed64) -> Fixed64 {
        dt * self.speed(class) * self.transport_constant
    }
}

impl Default for Tuning {
    fn default() -> Self {
        TransportConfig::default().tuning()
    }
}
