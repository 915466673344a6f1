use crate::cache::Caches;
use crate::entities::{Entities, Stored};
use crate::error::{ErrorKind, Result};
use crate::events::{self, StoreEvent};
use crate::scope::Scope;
use crate::sequence::Sequencer;
use crate::txn::Txn;
use futures::Stream;
use quire_config::StoreConfig;
use quire_model::{EntityKind, EntityRef};
use quire_remote::RemoteHandle;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, broadcast};

/// The client-side library: normalized entity maps, per-scope caches, and
/// the mutations that keep both in line with the remote service.
///
/// A `Library` is an explicit object built around an injected
/// [`RemoteHandle`]; share it by reference (or in an `Arc`) with whatever
/// needs it. All writes go through its mutation methods; reads never touch
/// the remote service unless a scope has not been fetched yet.
///
/// # Examples
///
/// ```no_run
/// use quire_config::StoreConfig;
/// use quire_model::NewBook;
/// use quire_store::Library;
/// # use quire_remote::RemoteHandle;
/// # async fn example(remote: RemoteHandle) -> quire_store::error::Result<()> {
/// let library = Library::new(remote, StoreConfig::default())?;
/// let dune = library.create_book(NewBook::new("Dune").with_author("Herbert")).await?;
/// assert!(library.books().await?.iter().any(|b| b.id == dune.id));
/// # Ok(())
/// # }
/// ```
pub struct Library {
    pub(crate) remote: RemoteHandle,
    pub(crate) config: StoreConfig,
    pub(crate) state: RwLock<State>,
    pub(crate) events: broadcast::Sender<StoreEvent>,
    pub(crate) loading: AtomicUsize,
}

pub(crate) struct State {
    pub entities: Entities,
    pub caches: Caches,
    pub sequencer: Sequencer,
    pub last_error: Option<String>,
}
impl State {
    pub fn txn<'a>(&'a mut self, events: &'a broadcast::Sender<StoreEvent>) -> Txn<'a> {
        Txn::new(&mut self.entities, &mut self.caches, events)
    }
}

/// A deep copy of every entity and cached collection, for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    entities: Entities,
    caches: BTreeMap<Scope, Vec<i64>>,
}

/// Counts an in-flight remote call for as long as it lives.
pub(crate) struct Loading<'a>(&'a AtomicUsize);
impl<'a> Loading<'a> {
    pub fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}
impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Library {
    /// Open a library over `remote`. Fails if `config` does not validate.
    pub fn new(remote: RemoteHandle, config: StoreConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            let message = (*err).to_string();
            return Err(err.raise(ErrorKind::InvalidConfig(message)));
        }
        let (events, _) = broadcast::channel(config.event_capacity);
        tracing::debug!(service = remote.name(), sequencing = config.sequencing, "Opening library");
        let state = State {
            entities: Entities::default(),
            caches: Caches::default(),
            sequencer: Sequencer::new(config.sequencing),
            last_error: None,
        };
        Ok(Self { remote, config, state: RwLock::new(state), events, loading: AtomicUsize::new(0) })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // =========================================================================
    // Entity maps
    // =========================================================================

    pub async fn get<E: Stored>(&self, id: E::Id) -> Option<E> {
        self.state.read().await.entities.get::<E>(id).cloned()
    }

    /// Every loaded entity of a kind, in no meaningful order.
    pub async fn get_all<E: Stored>(&self) -> Vec<E> {
        self.state.read().await.entities.get_all::<E>().cloned().collect()
    }

    /// Whether the entity an event points at is loaded.
    pub async fn contains(&self, entity: EntityRef) -> bool {
        self.state.read().await.entities.contains(entity)
    }

    /// Insert or replace an entity directly, bypassing the remote service.
    pub async fn upsert<E: Stored>(&self, entity: E) {
        self.state.write().await.txn(&self.events).upsert(entity);
    }

    /// Remove an entity from its map. Cached collections still listing it
    /// read as misses until the caller cleans them up.
    pub async fn remove<E: Stored>(&self, id: E::Id) -> Option<E> {
        let mut state = self.state.write().await;
        let removed = state.entities.get::<E>(id).cloned();
        state.txn(&self.events).remove(EntityRef::new(E::KIND, id));
        removed
    }

    // =========================================================================
    // Caches
    // =========================================================================

    /// A scope's cached collection, without fetching it.
    pub async fn cached<E: Stored>(&self, scope: Scope) -> Option<Vec<E>> {
        let state = self.state.read().await;
        if scope.kind() != E::KIND {
            return None;
        }
        state.caches.resolve::<E>(scope, &state.entities)
    }

    pub async fn is_cached(&self, scope: Scope) -> bool {
        self.state.read().await.caches.contains(scope)
    }

    /// Drop one scope's collection; the next read refetches it.
    pub async fn invalidate(&self, scope: Scope) {
        let mut state = self.state.write().await;
        state.txn(&self.events).invalidate(scope);
    }

    /// Drop every cached collection of a kind.
    pub async fn invalidate_all(&self, kind: EntityKind) {
        let mut state = self.state.write().await;
        state.txn(&self.events).invalidate_where(|scope| scope.kind() == kind);
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Every change applied to the store from now on.
    pub fn events(&self) -> impl Stream<Item = StoreEvent> + use<> {
        events::subscribe(self.events.subscribe())
    }

    /// Whether any remote call is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Message of the most recent failure, kept until [`clear_error`](Self::clear_error).
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot { entities: state.entities.clone(), caches: state.caches.entries().clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::library;
    use quire_model::{Book, BookId, NewBook};
    use quire_remote::RemoteService;
    use quire_remote::service::MockRemote;
    use std::sync::Arc;
    use time::OffsetDateTime;

    #[test]
    fn test_invalid_config_is_refused() {
        let config = StoreConfig { event_capacity: 0, ..StoreConfig::default() };
        let err = Library::new(Arc::new(MockRemote::default()), config).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidConfig(_)));
        assert!(err.message().contains("event_capacity"));
    }

    #[tokio::test]
    async fn test_direct_upsert_and_remove() {
        let (_, library) = library();
        let dune = NewBook::new("Dune").into_book(BookId(7), OffsetDateTime::UNIX_EPOCH);
        library.upsert(dune.clone()).await;
        assert_eq!(library.get::<Book>(BookId(7)).await, Some(dune.clone()));
        assert_eq!(library.remove::<Book>(BookId(7)).await, Some(dune));
        assert!(library.remove::<Book>(BookId(7)).await.is_none());
        assert!(library.get_all::<Book>().await.is_empty());
        assert!(!library.contains(EntityRef::new(EntityKind::Book, 7i64)).await);
    }

    #[tokio::test]
    async fn test_removed_member_makes_scope_a_miss() {
        let (remote, library) = library();
        let dune = remote.create_book(NewBook::new("Dune")).await.unwrap();
        library.books().await.unwrap();
        library.remove::<Book>(dune.id).await;
        assert!(library.cached::<Book>(Scope::Books).await.is_none());
        assert_eq!(library.books().await.unwrap(), vec![dune]);
        assert_eq!(remote.calls("list_books").await, 2);
    }

    #[tokio::test]
    async fn test_invalidate_all_of_kind() {
        let (remote, library) = library();
        let dune = remote.create_book(NewBook::new("Dune")).await.unwrap();
        let emma = remote.create_book(NewBook::new("Emma")).await.unwrap();
        library.books().await.unwrap();
        library.characters(dune.id).await.unwrap();
        library.characters(emma.id).await.unwrap();

        library.invalidate_all(EntityKind::Character).await;
        assert!(!library.is_cached(Scope::Characters(dune.id)).await);
        assert!(!library.is_cached(Scope::Characters(emma.id)).await);
        assert!(library.is_cached(Scope::Books).await);
        assert!(library.cached::<quire_model::Character>(Scope::Books).await.is_none());
    }
}
