//! The fetch and mutate primitives every library operation is built from.
//!
//! A mutation either waits for the service before touching local state
//! ([`Strategy::ConfirmFirst`]) or applies its change straight away and undoes
//! it if the service refuses ([`Strategy::Optimistic`]). Either way a failure
//! leaves the store fully old or fully new, lands in
//! [`last_error`](Library::last_error), and is returned to the caller.

use crate::entities::Stored;
use crate::error::{ErrorKind, Operation, Result, from_remote};
use crate::library::{Library, Loading};
use crate::scope::Scope;
use crate::sequence::Key;
use crate::txn::Txn;
use quire_remote::error::{ErrorKind as RemoteErrorKind, Result as RemoteResult};
use std::collections::HashSet;
use std::fmt::Display;

/// A local change applied before the remote call.
pub(crate) type Apply<'a> = Box<dyn FnOnce(&mut Txn<'_>) + Send + 'a>;

pub(crate) enum Strategy<'a> {
    /// Apply now; the transaction's journal is the undo.
    Optimistic(Apply<'a>),
    /// Leave local state alone until the service confirms.
    ConfirmFirst,
}
impl<'a> Strategy<'a> {
    pub fn optimistic(apply: impl FnOnce(&mut Txn<'_>) + Send + 'a) -> Self {
        Self::Optimistic(Box::new(apply))
    }
}

impl Library {
    /// Run a remote call, bounded by the configured timeout.
    pub(crate) async fn call<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let Some(limit) = self.config.remote_timeout() else {
            return call.await;
        };
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                let service = self.remote.name();
                tracing::warn!(service, timeout_ms = self.config.remote_timeout, "Remote call timed out");
                exn::bail!(RemoteErrorKind::Timeout(limit))
            },
        }
    }

    /// Record a failure as the last error and hand it back.
    pub(crate) async fn fail(&self, err: crate::error::Error) -> crate::error::Error {
        self.state.write().await.last_error = Some(err.message().to_string());
        err
    }

    /// Return a scope's collection from cache, or load it once and cache it.
    ///
    /// Duplicate fetches of the same scope in flight at once are not merged;
    /// the first to resolve fills the cache and later ones see the scope has
    /// moved on and only return their data.
    pub(crate) async fn fetch<E, F, Fut>(&self, scope: Scope, load: F) -> Result<Vec<E>>
    where
        E: Stored,
        F: FnOnce() -> Fut,
        Fut: Future<Output = RemoteResult<Vec<E>>>,
    {
        let started = {
            let state = self.state.read().await;
            if let Some(items) = state.caches.resolve::<E>(scope, &state.entities) {
                tracing::trace!(%scope, "Cache hit");
                return Ok(items);
            }
            state.caches.generation(scope)
        };
        let _loading = Loading::start(&self.loading);
        match self.call(load()).await {
            Ok(items) => {
                let mut state = self.state.write().await;
                if !state.txn(&self.events).fill(scope, started, &items) {
                    tracing::debug!(%scope, "Scope changed while fetching, result not cached");
                }
                Ok(items)
            },
            Err(err) => Err(self.fail(from_remote(Operation::Fetch, err)).await),
        }
    }

    /// Load a single entity into the maps.
    pub(crate) async fn load<E: Stored>(&self, call: impl Future<Output = RemoteResult<E>>) -> Result<E> {
        let _loading = Loading::start(&self.loading);
        match self.call(call).await {
            Ok(entity) => {
                self.state.write().await.txn(&self.events).upsert(entity.clone());
                Ok(entity)
            },
            Err(err) => Err(self.fail(from_remote(Operation::Fetch, err)).await),
        }
    }

    /// Drop a scope and load it again.
    pub(crate) async fn refresh<E, F, Fut>(&self, scope: Scope, load: F) -> Result<Vec<E>>
    where
        E: Stored,
        F: FnOnce() -> Fut,
        Fut: Future<Output = RemoteResult<Vec<E>>>,
    {
        self.invalidate(scope).await;
        self.fetch(scope, load).await
    }

    /// Perform a remote write and reconcile local state.
    ///
    /// `key` names what the write affects; a response to a write that has
    /// since been overtaken by a newer one on the same key is returned but
    /// not committed, and an overtaken optimistic failure invalidates what it
    /// touched instead of rolling back over the newer write.
    pub(crate) async fn mutate<T, Fut>(
        &self,
        operation: Operation,
        key: Option<Key>,
        strategy: Strategy<'_>,
        call: Fut,
        commit: impl FnOnce(&mut Txn<'_>, &T),
    ) -> Result<T>
    where
        Fut: Future<Output = RemoteResult<T>>,
    {
        let _loading = Loading::start(&self.loading);
        let (token, journal) = {
            let mut state = self.state.write().await;
            let token = state.sequencer.issue(key);
            let journal = match strategy {
                Strategy::Optimistic(apply) => {
                    let mut txn = state.txn(&self.events);
                    apply(&mut txn);
                    Some(txn.finish())
                },
                Strategy::ConfirmFirst => None,
            };
            (token, journal)
        };

        let result = self.call(call).await;
        let mut state = self.state.write().await;
        let current = state.sequencer.is_current(token);
        match result {
            Ok(value) => {
                if current {
                    commit(&mut state.txn(&self.events), &value);
                } else {
                    tracing::debug!(%operation, "Response overtaken by a newer operation, not committing");
                }
                Ok(value)
            },
            Err(err) => {
                let err = from_remote(operation, err);
                if let Some(journal) = journal.filter(|j| !j.is_empty()) {
                    let mut txn = state.txn(&self.events);
                    if current {
                        tracing::warn!(%operation, error = err.message(), "Rolling back optimistic change");
                        journal.revert(&mut txn);
                    } else {
                        tracing::debug!(%operation, "Failure overtaken by a newer operation, invalidating");
                        for scope in journal.scopes() {
                            txn.invalidate(scope);
                        }
                    }
                }
                state.last_error = Some(err.message().to_string());
                Err(err)
            },
        }
    }

    /// Optimistically reorder a scope's collection.
    ///
    /// The collection is loaded first if needed. `order` must list every
    /// current member exactly once. Members' positions are rewritten along
    /// with the cached order; both are trusted on success and restored on
    /// failure.
    pub(crate) async fn reorder<E, L, LFut, Fut>(
        &self,
        scope: Scope,
        order: Vec<E::Id>,
        load: L,
        call: Fut,
    ) -> Result<()>
    where
        E: Stored,
        L: FnOnce() -> LFut,
        LFut: Future<Output = RemoteResult<Vec<E>>>,
        Fut: Future<Output = RemoteResult<()>>,
    {
        let current: Vec<E::Id> = self.fetch(scope, load).await?.iter().map(|e| e.id()).collect();
        if let Err(err) = check_order(&current, &order) {
            return Err(self.fail(err).await);
        }
        let apply = Strategy::optimistic(move |txn: &mut Txn<'_>| {
            // Positions are 0-indexed, as the service numbers them.
            for (index, id) in order.iter().enumerate() {
                let position = u32::try_from(index).unwrap_or(u32::MAX);
                if let Some(mut entity) = txn.entities().get::<E>(*id).cloned() {
                    let before = entity.clone();
                    entity.set_position(position);
                    if entity != before {
                        txn.upsert(entity);
                    }
                }
            }
            txn.set(scope, order.into_iter().map(Into::into).collect());
        });
        self.mutate(Operation::Reorder, Some(Key::Scope(scope)), apply, call, |_, _| ()).await
    }
}

/// A new order must be a permutation of the current one.
pub(crate) fn check_order<I: Copy + Eq + std::hash::Hash + Display>(current: &[I], proposed: &[I]) -> Result<()> {
    let members: HashSet<I> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());
    for id in proposed {
        if !members.contains(id) {
            exn::bail!(ErrorKind::InvalidOrder(format!("{id} is not a member")));
        }
        if !seen.insert(*id) {
            exn::bail!(ErrorKind::InvalidOrder(format!("{id} is listed more than once")));
        }
    }
    if let Some(missing) = current.iter().find(|id| !seen.contains(*id)) {
        exn::bail!(ErrorKind::InvalidOrder(format!("{missing} is missing")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[1, 2, 3], &[3, 1, 2], None)]
    #[case(&[], &[], None)]
    #[case(&[1, 2, 3], &[1, 2], Some("3 is missing"))]
    #[case(&[1, 2, 3], &[1, 2, 3, 4], Some("4 is not a member"))]
    #[case(&[1, 2, 3], &[1, 1, 2, 3], Some("1 is listed more than once"))]
    fn test_check_order(#[case] current: &[i64], #[case] proposed: &[i64], #[case] error: Option<&str>) {
        match (check_order(current, proposed), error) {
            (Ok(()), None) => {},
            (Err(err), Some(message)) => assert_eq!(err.message(), message),
            (result, _) => panic!("unexpected result: {result:?}"),
        }
    }
}
