//! The normalized entity maps: one map per entity kind, keyed by identifier.
//!
//! Nothing here can fail and nothing here knows about relationships between
//! entities; keeping layouts and caches consistent with the maps is the
//! caller's job.

use quire_model::{
    Book, BookId, Chapter, ChapterId, Character, CharacterId, Entity, EntityKind, EntityRef, Relationship,
    RelationshipId, Scene, SceneId, Series, SeriesId,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    books: BTreeMap<BookId, Book>,
    series: BTreeMap<SeriesId, Series>,
    characters: BTreeMap<CharacterId, Character>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    chapters: BTreeMap<ChapterId, Chapter>,
    scenes: BTreeMap<SceneId, Scene>,
}

/// An entity the store keeps a map for.
pub trait Stored: Entity {
    #[doc(hidden)]
    fn map(entities: &Entities) -> &BTreeMap<Self::Id, Self>;
    #[doc(hidden)]
    fn map_mut(entities: &mut Entities) -> &mut BTreeMap<Self::Id, Self>;
    #[doc(hidden)]
    fn into_record(self) -> Record;
    /// Record the entity's place among its siblings. Entities ordered by an
    /// external layout (books in a series) keep no position of their own.
    #[doc(hidden)]
    fn set_position(&mut self, _position: u32) {}
}

/// Any stored entity, by value.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Book(Book),
    Series(Series),
    Character(Character),
    Relationship(Relationship),
    Chapter(Chapter),
    Scene(Scene),
}
impl Record {
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Self::Book(e) => e.entity_ref(),
            Self::Series(e) => e.entity_ref(),
            Self::Character(e) => e.entity_ref(),
            Self::Relationship(e) => e.entity_ref(),
            Self::Chapter(e) => e.entity_ref(),
            Self::Scene(e) => e.entity_ref(),
        }
    }
}

macro_rules! stored {
    ($($ty:ident => $field:ident $(@ $position:ident)?),+ $(,)?) => {
        $(
            impl Stored for $ty {
                fn map(entities: &Entities) -> &BTreeMap<Self::Id, Self> {
                    &entities.$field
                }
                fn map_mut(entities: &mut Entities) -> &mut BTreeMap<Self::Id, Self> {
                    &mut entities.$field
                }
                fn into_record(self) -> Record {
                    Record::$ty(self)
                }
                $(
                    fn set_position(&mut self, position: u32) {
                        self.$position = position;
                    }
                )?
            }
        )+
    };
}

stored! {
    Book => books,
    Series => series,
    Character => characters @ position,
    Relationship => relationships,
    Chapter => chapters @ position,
    Scene => scenes @ position,
}

impl Entities {
    pub fn get<E: Stored>(&self, id: E::Id) -> Option<&E> {
        E::map(self).get(&id)
    }

    /// All entities of a kind, in identifier order (which means nothing).
    pub fn get_all<E: Stored>(&self) -> impl Iterator<Item = &E> {
        E::map(self).values()
    }

    /// Insert or replace by identifier, returning the replaced entity.
    pub fn upsert<E: Stored>(&mut self, entity: E) -> Option<E> {
        E::map_mut(self).insert(entity.id(), entity)
    }

    pub fn remove<E: Stored>(&mut self, id: E::Id) -> Option<E> {
        E::map_mut(self).remove(&id)
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity.kind {
            EntityKind::Book => self.books.contains_key(&BookId(entity.id)),
            EntityKind::Series => self.series.contains_key(&SeriesId(entity.id)),
            EntityKind::Character => self.characters.contains_key(&CharacterId(entity.id)),
            EntityKind::Relationship => self.relationships.contains_key(&RelationshipId(entity.id)),
            EntityKind::Chapter => self.chapters.contains_key(&ChapterId(entity.id)),
            EntityKind::Scene => self.scenes.contains_key(&SceneId(entity.id)),
        }
    }

    pub fn upsert_record(&mut self, record: Record) -> Option<Record> {
        match record {
            Record::Book(e) => self.upsert(e).map(Stored::into_record),
            Record::Series(e) => self.upsert(e).map(Stored::into_record),
            Record::Character(e) => self.upsert(e).map(Stored::into_record),
            Record::Relationship(e) => self.upsert(e).map(Stored::into_record),
            Record::Chapter(e) => self.upsert(e).map(Stored::into_record),
            Record::Scene(e) => self.upsert(e).map(Stored::into_record),
        }
    }

    pub fn remove_record(&mut self, entity: EntityRef) -> Option<Record> {
        match entity.kind {
            EntityKind::Book => self.remove::<Book>(BookId(entity.id)).map(Stored::into_record),
            EntityKind::Series => self.remove::<Series>(SeriesId(entity.id)).map(Stored::into_record),
            EntityKind::Character => self.remove::<Character>(CharacterId(entity.id)).map(Stored::into_record),
            EntityKind::Relationship => {
                self.remove::<Relationship>(RelationshipId(entity.id)).map(Stored::into_record)
            },
            EntityKind::Chapter => self.remove::<Chapter>(ChapterId(entity.id)).map(Stored::into_record),
            EntityKind::Scene => self.remove::<Scene>(SceneId(entity.id)).map(Stored::into_record),
        }
    }
}
