//! Concurrent entity storage.
//!
//! The in-process stand-in for the world-object store: combat reads and
//! mutates entities through closures so no entity guard leaks out, and
//! attacks on different entities can resolve concurrently.

use dashmap::DashMap;
use thiserror::Error;

use duskfall_common::EntityId;

use crate::combatant::Entity;

/// Error types for registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Entity not found
    #[error("entity not found: {0}")]
    NotFound(EntityId),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Concurrent store of live entities, keyed by id.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: DashMap<EntityId, Entity>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity, returning its id.
    pub fn insert(&self, entity: Entity) -> EntityId {
        let id = entity.id();
        self.entities.insert(id, entity);
        id
    }

    /// Runs a closure over an entity by reference.
    ///
    /// The guard is held only for the closure; never call back into the
    /// registry from inside it.
    pub fn read<R>(&self, id: EntityId, f: impl FnOnce(&Entity) -> R) -> RegistryResult<R> {
        self.entities
            .get(&id)
            .map(|entry| f(entry.value()))
            .ok_or(RegistryError::NotFound(id))
    }

    /// Runs a closure over an entity by mutable reference.
    ///
    /// Same guard rule as [`read`](Self::read).
    pub fn write<R>(&self, id: EntityId, f: impl FnOnce(&mut Entity) -> R) -> RegistryResult<R> {
        self.entities
            .get_mut(&id)
            .map(|mut entry| f(entry.value_mut()))
            .ok_or(RegistryError::NotFound(id))
    }

    /// Removes an entity, returning it.
    pub fn remove(&self, id: EntityId) -> RegistryResult<Entity> {
        self.entities
            .remove(&id)
            .map(|(_, entity)| entity)
            .ok_or(RegistryError::NotFound(id))
    }

    /// Checks if an entity with the given id exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns all live entity ids.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Combatant, Npc, Player};

    #[test]
    fn test_insert_and_read() {
        let registry = EntityRegistry::new();
        let id = registry.insert(Entity::Player(Player::new("Wren")));

        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
        let name = registry
            .read(id, |entity| entity.name().to_owned())
            .expect("entity should exist");
        assert_eq!(name, "Wren");
    }

    #[test]
    fn test_write_mutates_in_place() {
        let registry = EntityRegistry::new();
        let id = registry.insert(Entity::Npc(Npc::new("a cave rat")));

        let dealt = registry
            .write(id, |entity| entity.take_damage(3))
            .expect("entity should exist");
        assert_eq!(dealt, 3);

        let health = registry
            .read(id, |entity| entity.current_health())
            .expect("entity should exist");
        assert_eq!(health, 7);
    }

    #[test]
    fn test_remove() {
        let registry = EntityRegistry::new();
        let id = registry.insert(Entity::Npc(Npc::new("a cave rat")));

        let removed = registry.remove(id).expect("remove should succeed");
        assert_eq!(removed.name(), "a cave rat");
        assert!(!registry.contains(id));
        assert!(registry.remove(id).is_err());
    }

    #[test]
    fn test_missing_entity_errors() {
        let registry = EntityRegistry::new();
        let missing = EntityId::new();

        assert!(registry.read(missing, |_| ()).is_err());
        assert!(registry.write(missing, |_| ()).is_err());
    }
}
