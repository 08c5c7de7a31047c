use std::fmt;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Which clock a task measures elapsed time against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeDomain {
    /// Game time: follows the time scale and stops while paused.
    #[default]
    Scaled,
    /// Real time: keeps advancing while the game is paused.
    Unscaled,
}

impl TimeDomain {
    pub fn from_unscaled(unscaled: bool) -> Self {
        if unscaled { TimeDomain::Unscaled } else { TimeDomain::Scaled }
    }
}

/// Handle to a non-batched task (interpolation, deferred call, tick waits,
/// condition wait). Stale once the task finishes or is stopped.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Handle to a position batch entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Non-owning reference to an object in a [`TransformStore`](crate::core::arena::TransformStore).
///
/// Bits 0-31 of the packed form are the slot index, bits 32-63 the generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    id: u64,
}

impl ObjectHandle {
    const INDEX_MASK: u64 = 0xFFFF_FFFF;
    const GENERATION_SHIFT: u64 = 32;

    pub fn new(index: u32, generation: u32) -> Self {
        let id = (index as u64) | ((generation as u64) << Self::GENERATION_SHIFT);
        Self { id }
    }

    pub fn index(&self) -> usize {
        (self.id & Self::INDEX_MASK) as usize
    }

    pub fn generation(&self) -> u32 {
        (self.id >> Self::GENERATION_SHIFT) as u32
    }

    /// Packed form, e.g. for logging or FFI.
    pub fn to_bits(self) -> u64 {
        self.id
    }

    pub fn from_bits(id: u64) -> Self {
        Self { id }
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}:{})", self.index(), self.generation())
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({}:{})", self.index, self.generation)
    }
}

impl fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Batch({}:{})", self.index, self.generation)
    }
}

/// Linear RGBA color, tweenable like any vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Channels in r, g, b, a order.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::from_array(bytemuck::cast(self))
    }

    pub fn from_vec4(v: Vec4) -> Self {
        bytemuck::cast(v.to_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_handle_packs_index_and_generation() {
        let h = ObjectHandle::new(7, 3);
        assert_eq!(h.index(), 7);
        assert_eq!(h.generation(), 3);
        assert_eq!(ObjectHandle::from_bits(h.to_bits()), h);
        assert_eq!(format!("{:?}", h), "Object(7:3)");
    }

    #[test]
    fn color_channels_map_to_vec4_in_order() {
        let c = Color::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(c.to_vec4(), Vec4::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(Color::from_vec4(c.to_vec4()), c);
    }

    #[test]
    fn time_domain_from_flag() {
        assert_eq!(TimeDomain::from_unscaled(true), TimeDomain::Unscaled);
        assert_eq!(TimeDomain::from_unscaled(false), TimeDomain::Scaled);
    }
}
