//! The set of objects in the scene and which one is active.

use std::sync::Arc;

use probescope_core::error::{ProbescopeError, Result};
use probescope_core::events::ObjectId;

use crate::geometry::{GeometryKind, ProbeGeometry};
use crate::instance::ProbeInstance;

/// Scene objects in the order they were added.
///
/// At most one object is active. Ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct SceneRegistry {
    objects: Vec<ProbeInstance>,
    active: Option<ObjectId>,
    next_id: u64,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object at the home pose and makes it active.
    pub fn add(&mut self, kind: GeometryKind, geometry: Arc<ProbeGeometry>) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let mut instance = ProbeInstance::new(id, kind, geometry);
        instance.set_info(format!("probe{}", self.objects.len()));
        log::info!("added {} as {id}", instance.name());
        self.objects.push(instance);
        self.set_active(Some(id));
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeInstance> {
        self.objects.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().map(ProbeInstance::id)
    }

    fn position(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&ProbeInstance> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ProbeInstance> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    #[must_use]
    pub fn active_id(&self) -> Option<ObjectId> {
        self.active
    }

    #[must_use]
    pub fn active(&self) -> Option<&ProbeInstance> {
        self.get(self.active?)
    }

    pub fn active_mut(&mut self) -> Option<&mut ProbeInstance> {
        let id = self.active?;
        self.get_mut(id)
    }

    fn set_active(&mut self, id: Option<ObjectId>) {
        self.active = id;
        for object in &mut self.objects {
            let active = Some(object.id()) == id;
            object.set_active(active);
        }
    }

    /// Makes `id` active, as when the renderer reports a pick.
    pub fn select(&mut self, id: ObjectId) -> Result<()> {
        if self.position(id).is_none() {
            return Err(ProbescopeError::ObjectNotFound(id.0));
        }
        self.set_active(Some(id));
        Ok(())
    }

    /// Clears the active object.
    pub fn deselect(&mut self) {
        self.set_active(None);
    }

    /// Advances the active object cyclically. With nothing active the first object
    /// becomes active. Returns the new active id.
    pub fn select_next(&mut self) -> Option<ObjectId> {
        self.step(true)
    }

    /// Moves the active object back cyclically. With nothing active the last
    /// object becomes active.
    pub fn select_previous(&mut self) -> Option<ObjectId> {
        self.step(false)
    }

    fn step(&mut self, forward: bool) -> Option<ObjectId> {
        let n = self.objects.len();
        if n == 0 {
            return None;
        }
        let index = match (self.active.and_then(|id| self.position(id)), forward) {
            (Some(current), true) => (current + 1) % n,
            (Some(current), false) => (current + n - 1) % n,
            (None, true) => 0,
            (None, false) => n - 1,
        };
        let id = self.objects[index].id();
        self.set_active(Some(id));
        Some(id)
    }

    /// Removes an object. Removing the active object leaves nothing active.
    pub fn remove(&mut self, id: ObjectId) -> Option<ProbeInstance> {
        let index = self.position(id)?;
        let mut removed = self.objects.remove(index);
        if self.active == Some(id) {
            self.active = None;
        }
        removed.set_active(false);
        log::info!("removed {} ({id})", removed.name());
        Some(removed)
    }

    /// Removes the active object, if any.
    pub fn remove_active(&mut self) -> Option<ProbeInstance> {
        let id = self.active?;
        self.remove(id)
    }

    /// Removes every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.active = None;
    }
}

impl<'a> IntoIterator for &'a SceneRegistry {
    type Item = &'a ProbeInstance;
    type IntoIter = std::slice::Iter<'a, ProbeInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

#[cfg(test)]
mod tests {
    use probescope_core::options::ProbeGeometryTable;

    use super::*;
    use crate::geometry::ShankArray;

    fn geometry() -> Arc<ProbeGeometry> {
        let table = ProbeGeometryTable::default();
        Arc::new(ProbeGeometry::ShankArray(ShankArray::from_spec(
            "NP24",
            table.get("NP24").unwrap(),
        )))
    }

    fn registry_with(n: usize) -> (SceneRegistry, Vec<ObjectId>) {
        let mut registry = SceneRegistry::new();
        let ids = (0..n)
            .map(|_| registry.add(GeometryKind::builtin("NP24"), geometry()))
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_add_activates_newest() {
        let (registry, ids) = registry_with(2);
        assert_eq!(registry.active_id(), Some(ids[1]));
        assert!(registry.get(ids[1]).unwrap().is_active());
        assert!(!registry.get(ids[0]).unwrap().is_active());
        assert_eq!(registry.get(ids[0]).unwrap().info(), "probe0");
    }

    #[test]
    fn test_next_cycles_and_wraps() {
        let (mut registry, ids) = registry_with(3);
        registry.select(ids[0]).unwrap();
        let seen: Vec<ObjectId> = (0..4).filter_map(|_| registry.select_next()).collect();
        assert_eq!(seen, vec![ids[1], ids[2], ids[0], ids[1]]);
        assert_eq!(registry.select_previous(), Some(ids[0]));
        assert_eq!(registry.select_previous(), Some(ids[2]));
        assert_eq!(registry.iter().filter(|o| o.is_active()).count(), 1);
    }

    #[test]
    fn test_single_object_stays_active() {
        let (mut registry, ids) = registry_with(1);
        assert_eq!(registry.select_next(), Some(ids[0]));
        assert_eq!(registry.select_previous(), Some(ids[0]));
    }

    #[test]
    fn test_nothing_active_selects_ends() {
        let (mut registry, ids) = registry_with(3);
        registry.deselect();
        assert_eq!(registry.select_next(), Some(ids[0]));
        registry.deselect();
        assert_eq!(registry.select_previous(), Some(ids[2]));
        assert_eq!(SceneRegistry::new().select_next(), None);
    }

    #[test]
    fn test_delete_active_clears_pointer() {
        let (mut registry, ids) = registry_with(3);
        let removed = registry.remove_active().unwrap();
        assert_eq!(removed.id(), ids[2]);
        assert_eq!(registry.active_id(), None);
        assert!(registry.active_mut().is_none());
        assert_eq!(registry.len(), 2);
        assert!(registry.iter().all(|o| !o.is_active()));
        assert!(registry.remove_active().is_none());
    }

    #[test]
    fn test_ids_not_reused() {
        let (mut registry, ids) = registry_with(2);
        registry.remove(ids[1]);
        let id = registry.add(GeometryKind::builtin("NP24"), geometry());
        assert_ne!(id, ids[1]);
        assert!(matches!(
            registry.select(ids[1]),
            Err(ProbescopeError::ObjectNotFound(_))
        ));
    }
}
