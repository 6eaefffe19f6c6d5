use std::collections::HashMap;

use bevy_ecs::entity::EntityHash;
use bevy_ecs::prelude::*;
use indexmap::IndexMap;

use super::elements::GroupKind;
use crate::toolkit::id::{BusNumber, DeviceClass, DeviceId, DeviceKey};

/// Resource that maps bus numbers to ECS entities, in insertion order.
#[derive(Default, Debug, Resource)]
pub struct NodeLookup {
    /// bus number → entity
    pub forward: IndexMap<BusNumber, Entity>,
    /// entity → bus number
    pub reverse: HashMap<Entity, BusNumber, EntityHash>,
}

impl NodeLookup {
    pub fn len(&self) -> usize {
        self.forward.len()
    }
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
    pub fn get(&self, bus: BusNumber) -> Option<Entity> {
        self.forward.get(&bus).copied()
    }
    pub fn iter(&self) -> impl Iterator<Item = (BusNumber, Entity)> + '_ {
        self.forward.iter().map(|(&b, &e)| (b, e))
    }
    pub fn insert(&mut self, bus: BusNumber, entity: Entity) {
        if let Some(old) = self.reverse.insert(entity, bus) {
            self.forward.shift_remove(&old);
        }
        self.forward.insert(bus, entity);
    }
    pub fn remove_id(&mut self, bus: BusNumber) -> Option<Entity> {
        let entity = self.forward.shift_remove(&bus)?;
        self.reverse.remove(&entity);
        Some(entity)
    }
    /// Renames `old` to `new` keeping its position.
    pub fn renumber(&mut self, old: BusNumber, new: BusNumber) {
        let Some(index) = self.forward.get_index_of(&old) else {
            return;
        };
        let entity = self.forward[index];
        self.forward.shift_remove_index(index);
        self.forward.shift_insert(index, new, entity);
        self.reverse.insert(entity, new);
    }
}

/// Per-class device index keyed by the unordered identifier key.
#[derive(Default, Debug, Resource)]
pub struct DeviceLookup {
    pub by_class: HashMap<DeviceClass, IndexMap<DeviceKey, (DeviceId, Entity)>>,
}

impl DeviceLookup {
    pub fn get(&self, id: &DeviceId) -> Option<Entity> {
        self.by_class
            .get(&id.class)?
            .get(&id.key())
            .map(|(_, e)| *e)
    }
    pub fn count(&self, class: DeviceClass) -> usize {
        self.by_class.get(&class).map_or(0, IndexMap::len)
    }
    pub fn insert(&mut self, id: DeviceId, entity: Entity) {
        self.by_class
            .entry(id.class)
            .or_default()
            .insert(id.key(), (id, entity));
    }
    pub fn remove(&mut self, id: &DeviceId) -> Option<Entity> {
        self.by_class
            .get_mut(&id.class)?
            .shift_remove(&id.key())
            .map(|(_, e)| e)
    }
    /// Identifiers of `class` in insertion order.
    pub fn iter(&self, class: DeviceClass) -> impl Iterator<Item = (&DeviceId, Entity)> + '_ {
        self.by_class
            .get(&class)
            .into_iter()
            .flat_map(|m| m.values().map(|(id, e)| (id, *e)))
    }
    /// Every device of every class attached to `bus`.
    pub fn at_bus(&self, bus: BusNumber) -> Vec<(DeviceId, Entity)> {
        DeviceClass::ALL
            .iter()
            .flat_map(|c| self.iter(*c))
            .filter(|(id, _)| id.touches(bus))
            .map(|(id, e)| (id.clone(), e))
            .collect()
    }
    /// Replaces an identifier in place, keeping its enumeration position.
    pub fn rekey(&mut self, old: &DeviceId, new: DeviceId) {
        let Some(map) = self.by_class.get_mut(&old.class) else {
            return;
        };
        let Some((index, _, (_, entity))) = map.shift_remove_full(&old.key()) else {
            return;
        };
        map.shift_insert(index, new.key(), (new, entity));
    }
}

#[derive(Default, Debug, Resource)]
pub struct GroupLookup {
    pub by_kind: HashMap<GroupKind, IndexMap<u32, Entity>>,
}

impl GroupLookup {
    pub fn get(&self, kind: GroupKind, number: u32) -> Option<Entity> {
        self.by_kind.get(&kind)?.get(&number).copied()
    }
    pub fn count(&self, kind: GroupKind) -> usize {
        self.by_kind.get(&kind).map_or(0, IndexMap::len)
    }
    pub fn insert(&mut self, kind: GroupKind, number: u32, entity: Entity) {
        self.by_kind.entry(kind).or_default().insert(number, entity);
    }
    pub fn remove(&mut self, kind: GroupKind, number: u32) -> Option<Entity> {
        self.by_kind.get_mut(&kind)?.shift_remove(&number)
    }
    pub fn numbers(&self, kind: GroupKind) -> Vec<u32> {
        self.by_kind
            .get(&kind)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renumber_keeps_order() {
        let mut world = World::new();
        let mut lookup = NodeLookup::default();
        for b in [5, 1, 9] {
            lookup.insert(b, world.spawn_empty().id());
        }
        lookup.renumber(1, 100);
        let order: Vec<_> = lookup.iter().map(|(b, _)| b).collect();
        assert_eq!(order, vec![5, 100, 9]);
        assert!(lookup.get(1).is_none());
        let e = lookup.get(100).unwrap();
        assert_eq!(lookup.reverse[&e], 100);
    }
}
