use crate::error::{ErrorKind, Result};
use crate::{BookId, ChapterId, Entity, EntityKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub book_id: BookId,
    pub name: String,
    pub description: Option<String>,
    /// Position among the book's chapters (0-indexed).
    pub position: u32,
}
impl Entity for Chapter {
    type Id = ChapterId;
    const KIND: EntityKind = EntityKind::Chapter;
    fn id(&self) -> ChapterId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChapter {
    pub book_id: BookId,
    pub name: String,
    pub description: Option<String>,
}
impl NewChapter {
    pub fn new(book_id: BookId, name: impl Into<String>) -> Self {
        Self { book_id, name: name.into(), description: None }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        Ok(())
    }

    pub fn into_chapter(self, id: ChapterId, position: u32) -> Chapter {
        Chapter { id, book_id: self.book_id, name: self.name, description: self.description, position }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChapterChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}
impl ChapterChanges {
    pub fn validate(&self) -> Result<()> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        Ok(())
    }

    pub fn apply_to(self, chapter: &mut Chapter) {
        if let Some(name) = self.name {
            chapter.name = name;
        }
        if let Some(description) = self.description {
            chapter.description = description;
        }
    }
}
