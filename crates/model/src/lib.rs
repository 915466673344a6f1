//! Domain entities for the quire authoring library.
//!
//! Books live in the library and may be grouped into any number of series,
//! each with its own ordering. Characters (and the relationships between
//! them) and chapters belong to exactly one book; scenes belong to a chapter.
//!
//! Every entity implements [`Entity`], exposing the server-assigned
//! identifier that the store keys its maps, caches and layouts by. Each
//! entity has a `New*` creation payload and a `*Changes` partial update; the
//! service is always the one to turn those into the canonical entity.

mod attributes;
mod book;
mod chapter;
mod character;
mod entity;
pub mod error;
mod id;
mod relationship;
mod scene;
mod series;

pub use self::attributes::{AttributeValue, Attributes, AttributesPatch};
pub use self::book::{Book, BookChanges, NewBook, Progress};
pub use self::chapter::{Chapter, ChapterChanges, NewChapter};
pub use self::character::{Character, CharacterChanges, NewCharacter, Role};
pub use self::entity::{Entity, EntityKind, EntityRef};
pub use self::id::{BookId, ChapterId, CharacterId, RelationshipId, SceneId, SeriesId};
pub use self::relationship::{NewRelationship, Relationship, RelationshipChanges, RelationshipKind};
pub use self::scene::{NewScene, Scene, SceneChanges, SceneStatus, validate_dates};
pub use self::series::{NewSeries, Series, SeriesChanges, SeriesEntry};

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('/', "").replace('-', "").replace('_', "").replace(' ', "")
}
