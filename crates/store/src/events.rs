use crate::scope::Scope;
use async_stream::stream;
use futures::Stream;
use quire_model::EntityRef;
use tokio::sync::broadcast::{self, error::RecvError};

/// A change to the store, published after it has been applied.
///
/// Derived views should recompute when an event touches what they show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// An entity was inserted or replaced.
    Upserted(EntityRef),
    Removed(EntityRef),
    /// A scope's cached collection was filled or changed.
    Cached(Scope),
    /// A scope's cached collection was dropped; the next read refetches.
    Invalidated(Scope),
}

/// Streams events from `receiver` until the store is dropped.
///
/// A subscriber that falls more than the channel capacity behind skips the
/// events it missed.
pub(crate) fn subscribe(mut receiver: broadcast::Receiver<StoreEvent>) -> impl Stream<Item = StoreEvent> {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        loop {
            match receiver.recv().await {
                Ok(event) => yield event,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Store event subscriber lagged behind");
                },
                Err(RecvError::Closed) => break,
            }
        }
    })
}
