use super::sanitize;
use crate::error::{Error, ErrorKind, Result};
use crate::{BookId, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::OffsetDateTime;

/// Writing progress of a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    /// Planned, but not something to think about yet.
    Future,
    #[default]
    NotStarted,
    InProgress,
    Completed,
}
impl Progress {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Future => "future",
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}
impl FromStr for Progress {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match sanitize(s).as_str() {
            "future" | "planned" => Self::Future,
            "notstarted" | "new" => Self::NotStarted,
            "inprogress" | "writing" => Self::InProgress,
            "completed" | "complete" | "done" => Self::Completed,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "progress",
                value: format!("unknown progress: {}", s)
            }),
        })
    }
}
impl Display for Progress {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub name: String,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Reference to the cover image (path or URL, never the bytes).
    pub image: Option<String>,
    pub progress: Progress,
    /// Genres, in the order the author listed them.
    pub genres: Vec<String>,
    pub target_audience: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
impl Entity for Book {
    type Id = BookId;
    const KIND: EntityKind = EntityKind::Book;
    fn id(&self) -> BookId {
        self.id
    }
}

/// Payload for creating a book; the service assigns the ID and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewBook {
    pub name: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub progress: Progress,
    pub genres: Vec<String>,
    pub target_audience: Option<String>,
    pub language: Option<String>,
}
impl NewBook {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_genres(mut self, genres: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        Ok(())
    }

    /// Materialize the canonical entity, as the service would.
    pub fn into_book(self, id: BookId, now: OffsetDateTime) -> Book {
        Book {
            id,
            name: self.name,
            author: self.author,
            description: self.description,
            image: self.image,
            progress: self.progress,
            genres: self.genres,
            target_audience: self.target_audience,
            language: self.language,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a [`Book`]. `None` leaves a field untouched; for
/// optional fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Option<String>>,
}
impl BookChanges {
    pub fn validate(&self) -> Result<()> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            exn::bail!(ErrorKind::MissingField("name"));
        }
        Ok(())
    }

    pub fn apply_to(self, book: &mut Book) {
        if let Some(name) = self.name {
            book.name = name;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(description) = self.description {
            book.description = description;
        }
        if let Some(image) = self.image {
            book.image = image;
        }
        if let Some(progress) = self.progress {
            book.progress = progress;
        }
        if let Some(genres) = self.genres {
            book.genres = genres;
        }
        if let Some(target_audience) = self.target_audience {
            book.target_audience = target_audience;
        }
        if let Some(language) = self.language {
            book.language = language;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("future", Progress::Future)]
    #[case("Not Started", Progress::NotStarted)]
    #[case("not_started", Progress::NotStarted)]
    #[case("in-progress", Progress::InProgress)]
    #[case("COMPLETED", Progress::Completed)]
    fn test_progress_from_str(#[case] input: &str, #[case] expected: Progress) {
        assert_eq!(input.parse::<Progress>().unwrap(), expected);
    }

    #[test]
    fn test_progress_unknown() {
        let err = "abandoned".parse::<Progress>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "progress", .. }));
    }

    #[test]
    fn test_changes_apply_only_present_fields() {
        let mut book = NewBook::new("Dune").with_author("Herbert").into_book(BookId(1), OffsetDateTime::UNIX_EPOCH);
        BookChanges {
            progress: Some(Progress::InProgress),
            author: Some(None),
            genres: Some(vec!["Science Fiction".to_string()]),
            ..Default::default()
        }
        .apply_to(&mut book);
        assert_eq!(book.name, "Dune");
        assert_eq!(book.author, None);
        assert_eq!(book.progress, Progress::InProgress);
        assert_eq!(book.genres, vec!["Science Fiction"]);
    }

    #[test]
    fn test_blank_name_is_invalid() {
        assert!(NewBook::new("   ").validate().is_err());
        assert!(NewBook::new("Dune").validate().is_ok());
        let changes = BookChanges { name: Some(String::new()), ..Default::default() };
        assert!(changes.validate().is_err());
    }

    #[test]
    fn test_book_json_shape() {
        let book = NewBook::new("Dune").with_genres(["SF", "Epic"]).into_book(BookId(3), OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["progress"], "not_started");
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
        assert_eq!(serde_json::from_value::<Book>(json).unwrap(), book);
    }
}
