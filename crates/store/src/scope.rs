use quire_model::{BookId, ChapterId, CharacterId, EntityKind, SeriesId};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A cached, ordered collection: the parent key a list of children is
/// fetched and invalidated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Every book in the library.
    Books,
    /// Every series in the library.
    Series,
    /// The books of a series, in series order.
    SeriesLayout(SeriesId),
    /// The characters of a book, in cast order.
    Characters(BookId),
    /// The relationships a character takes part in, at either end.
    Relationships(CharacterId),
    Chapters(BookId),
    Scenes(ChapterId),
}
impl Scope {
    /// The kind of entity listed by this scope.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Books | Self::SeriesLayout(_) => EntityKind::Book,
            Self::Series => EntityKind::Series,
            Self::Characters(_) => EntityKind::Character,
            Self::Relationships(_) => EntityKind::Relationship,
            Self::Chapters(_) => EntityKind::Chapter,
            Self::Scenes(_) => EntityKind::Scene,
        }
    }
}
impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Books => f.write_str("books"),
            Self::Series => f.write_str("series"),
            Self::SeriesLayout(id) => write!(f, "books of series#{id}"),
            Self::Characters(id) => write!(f, "characters of book#{id}"),
            Self::Relationships(id) => write!(f, "relationships of character#{id}"),
            Self::Chapters(id) => write!(f, "chapters of book#{id}"),
            Self::Scenes(id) => write!(f, "scenes of chapter#{id}"),
        }
    }
}
