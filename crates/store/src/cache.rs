//! Per-scope caches of ordered identifier lists.
//!
//! A cache entry only ever holds identifiers; the entities themselves live in
//! [`Entities`], so an update to an entity is visible through every entry
//! that lists it. An absent entry means "not fetched yet".

use crate::entities::{Entities, Stored};
use crate::scope::Scope;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct Caches {
    entries: BTreeMap<Scope, Vec<i64>>,
    /// Bumped on every change to a scope's entry, including its removal.
    generations: HashMap<Scope, u64>,
}

/// The state of a scope when a fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

impl Caches {
    pub fn get(&self, scope: Scope) -> Option<&[i64]> {
        self.entries.get(&scope).map(Vec::as_slice)
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.entries.contains_key(&scope)
    }

    pub fn generation(&self, scope: Scope) -> Generation {
        Generation(self.generations.get(&scope).copied().unwrap_or(0))
    }

    /// Every scope that currently has an entry.
    pub fn scopes(&self) -> impl Iterator<Item = Scope> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> &BTreeMap<Scope, Vec<i64>> {
        &self.entries
    }

    /// Set (`Some`) or drop (`None`) a scope's entry, returning the previous one.
    pub fn replace(&mut self, scope: Scope, ids: Option<Vec<i64>>) -> Option<Vec<i64>> {
        *self.generations.entry(scope).or_default() += 1;
        match ids {
            Some(ids) => self.entries.insert(scope, ids),
            None => self.entries.remove(&scope),
        }
    }

    /// Resolve a scope's entry through the entity maps. An entry listing an
    /// entity the maps no longer hold counts as a miss.
    pub fn resolve<E: Stored>(&self, scope: Scope, entities: &Entities) -> Option<Vec<E>> {
        self.get(scope)?.iter().map(|id| entities.get::<E>(E::Id::from(*id)).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_model::{Book, BookId, NewBook};
    use time::OffsetDateTime;

    #[test]
    fn test_generation_moves_on_every_change() {
        let mut caches = Caches::default();
        let before = caches.generation(Scope::Books);
        caches.replace(Scope::Books, Some(vec![1, 2]));
        let filled = caches.generation(Scope::Books);
        assert_ne!(before, filled);
        assert_eq!(caches.replace(Scope::Books, None), Some(vec![1, 2]));
        assert_ne!(filled, caches.generation(Scope::Books));
        assert!(!caches.contains(Scope::Books));
    }

    #[test]
    fn test_resolve_requires_every_member() {
        let mut entities = Entities::default();
        entities.upsert(NewBook::new("Dune").into_book(BookId(1), OffsetDateTime::UNIX_EPOCH));
        let mut caches = Caches::default();
        assert!(caches.resolve::<Book>(Scope::Books, &entities).is_none());

        caches.replace(Scope::Books, Some(vec![1]));
        let books = caches.resolve::<Book>(Scope::Books, &entities).unwrap();
        assert_eq!(books.len(), 1);

        caches.replace(Scope::Books, Some(vec![1, 2]));
        assert!(caches.resolve::<Book>(Scope::Books, &entities).is_none());
    }
}
