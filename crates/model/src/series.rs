use crate::error::{ErrorKind, Result};
use crate::{Book, BookId, Entity, EntityKind, SeriesId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
impl Entity for Series {
    type Id = SeriesId;
    const KIND: EntityKind = EntityKind::Series;
    fn id(&self) -> SeriesId {
        self.id
    }
}

/// A book's membership of a series.
///
/// Books and series are many-to-many: the same book may sit in several series,
/// each time at its own position. Positions are assigned by the service and
/// are only meaningful relative to the other entries of the same series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub book: Book,
    pub position: u32,
}
impl SeriesEntry {
    pub fn book_id(&self) -> BookId {
        self.book.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewSeries {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}
impl NewSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        Ok(())
    }

    pub fn into_series(self, id: SeriesId, now: OffsetDateTime) -> Series {
        Series {
            id,
            name: self.name,
            description: self.description,
            image: self.image,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
}
impl SeriesChanges {
    pub fn validate(&self) -> Result<()> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        Ok(())
    }

    pub fn apply_to(self, series: &mut Series) {
        if let Some(name) = self.name {
            series.name = name;
        }
        if let Some(description) = self.description {
            series.description = description;
        }
        if let Some(image) = self.image {
            series.image = image;
        }
    }
}
