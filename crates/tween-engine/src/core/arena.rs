use glam::Vec3;

use crate::api::types::ObjectHandle;

/// Where the position batch reads live targets and writes results.
///
/// The engine never holds references into the store, only [`ObjectHandle`]s,
/// and asks again every tick. A handle the store no longer recognises makes
/// the batch entry invalid.
pub trait TransformStore {
    /// Current position of the object, or `None` if the handle is stale.
    fn position(&self, handle: ObjectHandle) -> Option<Vec3>;

    /// Write a position. Returns `false` if the handle is stale.
    fn set_position(&mut self, handle: ObjectHandle, position: Vec3) -> bool;

    fn contains(&self, handle: ObjectHandle) -> bool {
        self.position(handle).is_some()
    }
}

#[derive(Debug, Clone)]
struct ArenaSlot {
    generation: u32,
    position: Option<Vec3>,
}

/// Generational arena of positions.
/// Despawning bumps the slot generation, so old handles fail one comparison.
#[derive(Debug, Default)]
pub struct TransformArena {
    slots: Vec<ArenaSlot>,
    free_indices: Vec<u32>,
    len: usize,
}

impl TransformArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object at the given position.
    pub fn spawn(&mut self, position: Vec3) -> ObjectHandle {
        let index = match self.free_indices.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(ArenaSlot { generation: 0, position: None });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.position = Some(position);
        self.len += 1;
        ObjectHandle::new(index, slot.generation)
    }

    /// Remove an object. Returns its last position if the handle was live.
    pub fn despawn(&mut self, handle: ObjectHandle) -> Option<Vec3> {
        let slot = self.slot_mut(handle)?;
        let position = slot.position.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(handle.index() as u32);
        self.len -= 1;
        Some(position)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&ArenaSlot> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut ArenaSlot> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
    }
}

impl TransformStore for TransformArena {
    fn position(&self, handle: ObjectHandle) -> Option<Vec3> {
        self.slot(handle)?.position
    }

    fn set_position(&mut self, handle: ObjectHandle, position: Vec3) -> bool {
        match self.slot_mut(handle).and_then(|slot| slot.position.as_mut()) {
            Some(pos) => {
                *pos = position;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_read() {
        let mut arena = TransformArena::new();
        let h = arena.spawn(Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(arena.position(h), Some(Vec3::new(10.0, 20.0, 0.0)));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn despawn_invalidates_handle() {
        let mut arena = TransformArena::new();
        let h = arena.spawn(Vec3::ONE);
        assert_eq!(arena.despawn(h), Some(Vec3::ONE));
        assert!(!arena.contains(h));
        assert!(!arena.set_position(h, Vec3::ZERO));
        assert_eq!(arena.despawn(h), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn reused_slot_rejects_old_generation() {
        let mut arena = TransformArena::new();
        let old = arena.spawn(Vec3::ZERO);
        arena.despawn(old);
        let new = arena.spawn(Vec3::X);
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert_eq!(arena.position(old), None);
        assert_eq!(arena.position(new), Some(Vec3::X));
    }
}
