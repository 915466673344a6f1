use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::Hash;

/// The entity types managed by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Book,
    Series,
    Character,
    Relationship,
    Chapter,
    Scene,
}
impl EntityKind {
    pub const ALL: [EntityKind; 6] =
        [Self::Book, Self::Series, Self::Character, Self::Relationship, Self::Chapter, Self::Scene];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Series => "series",
            Self::Character => "character",
            Self::Relationship => "relationship",
            Self::Chapter => "chapter",
            Self::Scene => "scene",
        }
    }
}
impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A persisted domain object with a stable, server-assigned identifier.
///
/// The identifier is unique within the entity's [kind](EntityKind), and is
/// what every map, cache and layout in the store is keyed by.
pub trait Entity: Clone + Debug + PartialEq + Send + Sync + 'static {
    type Id: Copy + Eq + Ord + Hash + Debug + Display + From<i64> + Into<i64> + Send + Sync + 'static;
    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::KIND, self.id())
    }
}

/// A type-erased pointer to an entity, used in events and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}
impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<i64>) -> Self {
        Self { kind, id: id.into() }
    }
}
impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
