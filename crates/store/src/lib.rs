//! Normalized client-side store for the quire authoring library.
//!
//! Entities are kept once each, in per-kind maps keyed by identifier. Every
//! collection the interface has asked for (the books of a series, the cast of
//! a book, the scenes of a chapter) is cached as an ordered list of
//! identifiers under its [`Scope`], so an edit made through one view is
//! visible through all of them.
//!
//! Writes go through the [`Library`]. Some apply locally before the remote
//! service answers and roll back if it refuses; the rest wait for the
//! service's canonical answer. Deletes cascade to whatever the deleted entity
//! owned, in the maps and in every cached collection.

mod cache;
mod cascade;
mod coordinator;
mod entities;
pub mod error;
mod events;
mod library;
mod ops;
mod scope;
mod sequence;
mod txn;

pub use crate::entities::Stored;
pub use crate::events::StoreEvent;
pub use crate::library::{Library, Snapshot};
pub use crate::ops::RelationshipView;
pub use crate::scope::Scope;
