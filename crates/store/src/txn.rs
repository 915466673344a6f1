//! Journaled writes to the store.
//!
//! Every write to the entity maps or the caches goes through a [`Txn`], which
//! remembers what each write replaced. Reverting the resulting [`Journal`]
//! restores the touched slice of the store exactly. A cached scope that
//! another operation wrote to in the meantime is dropped instead of restored,
//! so the next read refetches it rather than losing the other write.

use crate::cache::{Caches, Generation};
use crate::entities::{Entities, Record, Stored};
use crate::events::StoreEvent;
use crate::scope::Scope;
use quire_model::EntityRef;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
enum Change {
    Entity(EntityRef, Option<Record>),
    /// The entry before the write, and the scope's generation after it.
    Cache(Scope, Option<Vec<i64>>, Generation),
}

/// The writes of one transaction, with the values they replaced.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    changes: Vec<Change>,
}
impl Journal {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Scopes whose cache entry was written.
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self
            .changes
            .iter()
            .filter_map(|c| match c {
                Change::Cache(scope, ..) => Some(*scope),
                Change::Entity(..) => None,
            })
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }

    /// Undo every recorded write, newest first.
    ///
    /// A scope goes back to its entry from before this journal's first write
    /// to it, but only if nothing else wrote to it after this journal's last
    /// write. Otherwise it is invalidated.
    pub fn revert(self, txn: &mut Txn<'_>) {
        // Per scope: the oldest previous entry and the newest generation.
        let mut scopes: BTreeMap<Scope, (Option<Vec<i64>>, Generation)> = BTreeMap::new();
        for change in self.changes.into_iter().rev() {
            match change {
                Change::Entity(_, Some(record)) => txn.restore(record),
                Change::Entity(entity, None) => txn.remove(entity),
                Change::Cache(scope, previous, generation) => match scopes.entry(scope) {
                    Entry::Occupied(mut entry) => entry.get_mut().0 = previous,
                    Entry::Vacant(entry) => {
                        entry.insert((previous, generation));
                    },
                },
            }
        }
        for (scope, (previous, generation)) in scopes {
            match previous {
                Some(ids) if txn.caches.generation(scope) == generation => txn.set(scope, ids),
                Some(_) => {
                    tracing::debug!(%scope, "Scope changed since the write being undone, invalidating");
                    txn.invalidate(scope);
                },
                None => txn.invalidate(scope),
            }
        }
    }
}

pub(crate) struct Txn<'a> {
    entities: &'a mut Entities,
    caches: &'a mut Caches,
    events: &'a broadcast::Sender<StoreEvent>,
    journal: Journal,
}
impl<'a> Txn<'a> {
    pub fn new(entities: &'a mut Entities, caches: &'a mut Caches, events: &'a broadcast::Sender<StoreEvent>) -> Self {
        Self { entities, caches, events, journal: Journal::default() }
    }

    pub fn finish(self) -> Journal {
        self.journal
    }

    pub fn entities(&self) -> &Entities {
        self.entities
    }

    pub fn caches(&self) -> &Caches {
        self.caches
    }

    fn emit(&self, event: StoreEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Entities
    // =========================================================================

    pub fn upsert<E: Stored>(&mut self, entity: E) {
        let entity = entity.into_record();
        self.restore(entity);
    }

    fn restore(&mut self, record: Record) {
        let entity = record.entity_ref();
        let previous = self.entities.upsert_record(record);
        self.journal.changes.push(Change::Entity(entity, previous));
        self.emit(StoreEvent::Upserted(entity));
    }

    pub fn remove(&mut self, entity: EntityRef) {
        if let Some(previous) = self.entities.remove_record(entity) {
            self.journal.changes.push(Change::Entity(entity, Some(previous)));
            self.emit(StoreEvent::Removed(entity));
        }
    }

    // =========================================================================
    // Caches
    // =========================================================================

    pub fn set(&mut self, scope: Scope, ids: Vec<i64>) {
        let previous = self.caches.replace(scope, Some(ids));
        let generation = self.caches.generation(scope);
        self.journal.changes.push(Change::Cache(scope, previous, generation));
        self.emit(StoreEvent::Cached(scope));
    }

    /// Drop a scope's entry so the next read refetches it.
    pub fn invalidate(&mut self, scope: Scope) {
        if self.caches.contains(scope) {
            let previous = self.caches.replace(scope, None);
            let generation = self.caches.generation(scope);
            self.journal.changes.push(Change::Cache(scope, previous, generation));
            self.emit(StoreEvent::Invalidated(scope));
        }
    }

    pub fn invalidate_where(&mut self, predicate: impl Fn(&Scope) -> bool) {
        let scopes: Vec<Scope> = self.caches.scopes().filter(|s| predicate(s)).collect();
        for scope in scopes {
            self.invalidate(scope);
        }
    }

    /// Add a new member to the end of a scope that has already been fetched.
    /// Unfetched scopes are left alone: the next fetch will include it.
    pub fn append(&mut self, scope: Scope, id: impl Into<i64>) {
        let id = id.into();
        if let Some(current) = self.caches.get(scope)
            && !current.contains(&id)
        {
            let mut ids = current.to_vec();
            ids.push(id);
            self.set(scope, ids);
        }
    }

    /// Remove an entity's identifier from every cached scope listing it.
    pub fn prune(&mut self, entity: EntityRef) {
        let stale: Vec<(Scope, Vec<i64>)> = self
            .caches
            .entries()
            .iter()
            .filter(|(scope, ids)| scope.kind() == entity.kind && ids.contains(&entity.id))
            .map(|(scope, ids)| (*scope, ids.iter().copied().filter(|id| *id != entity.id).collect()))
            .collect();
        for (scope, ids) in stale {
            self.set(scope, ids);
        }
    }

    /// Store a fetched collection, unless the scope changed since the fetch
    /// started. Returns whether the collection was stored.
    pub fn fill<E: Stored>(&mut self, scope: Scope, started: Generation, items: &[E]) -> bool {
        if self.caches.generation(scope) != started {
            return false;
        }
        for item in items {
            self.upsert(item.clone());
        }
        self.set(scope, items.iter().map(|e| e.id().into()).collect());
        true
    }
}
