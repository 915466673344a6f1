use super::sanitize;
use crate::error::{Error, ErrorKind, Result};
use crate::{BookId, ChapterId, Entity, EntityKind, SceneId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::Date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    #[default]
    Draft,
    InProgress,
    Review,
    Done,
}
impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}
impl FromStr for SceneStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match sanitize(s).as_str() {
            "draft" => Self::Draft,
            "inprogress" | "writing" => Self::InProgress,
            "review" | "inreview" => Self::Review,
            "done" | "complete" | "completed" => Self::Done,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "status",
                value: format!("unknown scene status: {}", s)
            }),
        })
    }
}
impl Display for SceneStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub chapter_id: ChapterId,
    /// Denormalized from the chapter so book-wide queries need no join.
    pub book_id: BookId,
    pub name: String,
    /// Rich-text document tree. Opaque to the store.
    #[serde(default)]
    pub content: Value,
    pub status: SceneStatus,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    /// Position among the chapter's scenes (0-indexed).
    pub position: u32,
}
impl Entity for Scene {
    type Id = SceneId;
    const KIND: EntityKind = EntityKind::Scene;
    fn id(&self) -> SceneId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScene {
    pub chapter_id: ChapterId,
    pub name: String,
    pub content: Value,
    pub status: SceneStatus,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}
impl NewScene {
    pub fn new(chapter_id: ChapterId, name: impl Into<String>) -> Self {
        Self {
            chapter_id,
            name: name.into(),
            content: Value::Null,
            status: SceneStatus::default(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        validate_dates(self.start_date, self.end_date)
    }

    /// The book is resolved by the service from the chapter.
    pub fn into_scene(self, id: SceneId, book_id: BookId, position: u32) -> Scene {
        Scene {
            id,
            chapter_id: self.chapter_id,
            book_id,
            name: self.name,
            content: self.content,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            position,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SceneStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<Date>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<Date>>,
}
impl SceneChanges {
    pub fn apply_to(self, scene: &mut Scene) {
        if let Some(name) = self.name {
            scene.name = name;
        }
        if let Some(content) = self.content {
            scene.content = content;
        }
        if let Some(status) = self.status {
            scene.status = status;
        }
        if let Some(start_date) = self.start_date {
            scene.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            scene.end_date = end_date;
        }
    }
}

/// A scene may not end before it starts.
pub fn validate_dates(start: Option<Date>, end: Option<Date>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        exn::bail!(ErrorKind::ParseError { field: "end_date", value: format!("{end} is before {start}") });
    }
    Ok(())
}
