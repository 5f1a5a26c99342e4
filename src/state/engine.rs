use crate::state::entity::{Record, World};
use crate::state::notifier::ChangeNotifier;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Shared state holds the authoritative in-memory world
///
/// Mutations are sequenced: `update` and `set` hold the sequence lock across
/// both the write and the listener notification, so every listener observes
/// mutations in one global order. The world map itself sits behind its own
/// lock, released before listeners run, so reads from inside a listener see
/// the post-mutation value.
pub struct SharedState {
    /// Entity id to record
    world: RwLock<World>,

    /// Serializes mutate + notify
    sequence: Mutex<()>,

    /// Listeners fired after every `update`/`set`
    notifier: ChangeNotifier,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            world: RwLock::new(World::new()),
            sequence: Mutex::new(()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Listener registry for this state
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Merge one attribute into an entity record (creating it if absent)
    ///
    /// Returns the full post-update record, which is also what listeners see.
    pub fn update(&self, entity: &str, key: &str, value: Value) -> Record {
        let _sequence = self.lock_sequence();

        let record = {
            let mut world = self.write_world();
            let record = world.entry(entity.to_string()).or_default();
            record.insert(key.to_string(), value);
            record.clone()
        };

        debug!(entity = %entity, key = %key, "Entity updated");
        self.notifier.notify(entity, &record);

        record
    }

    /// Replace an entity's entire record
    pub fn set(&self, entity: &str, record: Record) {
        let _sequence = self.lock_sequence();

        self.write_world().insert(entity.to_string(), record.clone());

        debug!(entity = %entity, attributes = record.len(), "Entity set");
        self.notifier.notify(entity, &record);
    }

    /// Current record of an entity; empty if it was never written.
    /// Does not materialize the entity.
    pub fn get(&self, entity: &str) -> Record {
        self.read_world().get(entity).cloned().unwrap_or_default()
    }

    /// Copy of the whole world as of call time
    pub fn snapshot(&self) -> World {
        self.read_world().clone()
    }

    /// Run `f` against the world with mutations held off.
    ///
    /// Nothing can be written (and no listener can fire) until `f` returns, so
    /// anything `f` registers observes exactly the mutations after this view.
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&World) -> T) -> T {
        let _sequence = self.lock_sequence();
        let world = self.read_world();
        f(&world)
    }

    /// Drop every entity. Listeners are not notified.
    pub fn clear(&self) {
        let _sequence = self.lock_sequence();
        let removed = std::mem::take(&mut *self.write_world()).len();
        info!(entities = removed, "World cleared");
    }

    /// Number of entities in the world
    pub fn len(&self) -> usize {
        self.read_world().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_sequence(&self) -> MutexGuard<'_, ()> {
        self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_world(&self) -> RwLockReadGuard<'_, World> {
        self.world.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_world(&self) -> RwLockWriteGuard<'_, World> {
        self.world.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
