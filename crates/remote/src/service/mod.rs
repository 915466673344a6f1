//! Remote service trait and implementations.
//!
//! This module defines the [`RemoteService`] trait: the asynchronous
//! request/response boundary between the store and whatever persists the
//! library (an IPC bridge to a database process, an HTTP API, ...). The
//! transport is the implementor's business; the store only sees typed calls.

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use self::mock::{Failure, InsertPolicy, MockRemote};
use crate::error::Result;
use async_trait::async_trait;
use quire_model::{
    Book, BookChanges, BookId, Chapter, ChapterChanges, ChapterId, Character, CharacterChanges, CharacterId, NewBook,
    NewChapter, NewCharacter, NewRelationship, NewScene, NewSeries, Relationship, RelationshipChanges,
    RelationshipId, Scene, SceneChanges, SceneId, Series, SeriesChanges, SeriesEntry, SeriesId,
};

/// Unified interface to the remote entity service.
///
/// Every method is a single round trip. Creates and updates answer with the
/// full canonical entity, which callers should prefer over anything they
/// computed locally. Reads of a missing entity fail with
/// [`NotFound`](crate::error::ErrorKind::NotFound); a refused write fails
/// with [`Rejected`](crate::error::ErrorKind::Rejected).
///
/// # Positions
/// The service owns every position value. Ordered collections
/// (`characters_for_book`, `chapters_for_book`, `scenes_for_chapter`,
/// `series_books`) are returned already sorted by position. Reorder calls
/// take the **complete** ordered ID list of the parent's members.
///
/// # Examples
///
/// ```no_run
/// use quire_model::{BookId, NewCharacter, Role};
/// # use quire_remote::{RemoteService, error::Result};
/// # async fn example(remote: &dyn RemoteService) -> Result<()> {
/// let paul = remote
///     .create_character(NewCharacter::new(BookId(1), "Paul").with_role(Role::Protagonist))
///     .await?;
/// let cast = remote.characters_for_book(BookId(1)).await?;
/// assert!(cast.iter().any(|c| c.id == paul.id));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Name of the service (used for logging only).
    fn name(&self) -> &str;

    // =========================================================================
    // Books
    // =========================================================================

    async fn list_books(&self) -> Result<Vec<Book>>;
    async fn get_book(&self, id: BookId) -> Result<Book>;
    async fn create_book(&self, book: NewBook) -> Result<Book>;
    async fn update_book(&self, id: BookId, changes: BookChanges) -> Result<Book>;
    /// Deleting a book deletes everything it owns: characters (and their
    /// relationships), chapters, scenes and series memberships.
    async fn delete_book(&self, id: BookId) -> Result<()>;
    async fn archive_book(&self, id: BookId) -> Result<Book>;
    async fn unarchive_book(&self, id: BookId) -> Result<Book>;

    // =========================================================================
    // Series
    // =========================================================================

    async fn list_series(&self) -> Result<Vec<Series>>;
    async fn get_series(&self, id: SeriesId) -> Result<Series>;
    /// The books of a series, sorted by their position within it.
    async fn series_books(&self, id: SeriesId) -> Result<Vec<SeriesEntry>>;
    async fn create_series(&self, series: NewSeries) -> Result<Series>;
    async fn update_series(&self, id: SeriesId, changes: SeriesChanges) -> Result<Series>;
    /// Deleting a series removes its memberships; the books survive.
    async fn delete_series(&self, id: SeriesId) -> Result<()>;
    async fn archive_series(&self, id: SeriesId) -> Result<Series>;
    async fn unarchive_series(&self, id: SeriesId) -> Result<Series>;

    // =========================================================================
    // Book-Series relationship
    // =========================================================================

    /// Add a book to a series. Without an explicit `position` the service
    /// decides where the book goes.
    async fn add_book_to_series(&self, book: BookId, series: SeriesId, position: Option<u32>) -> Result<()>;
    async fn remove_book_from_series(&self, book: BookId, series: SeriesId) -> Result<()>;
    async fn update_book_position(&self, book: BookId, series: SeriesId, position: u32) -> Result<()>;
    async fn reorder_series(&self, series: SeriesId, books: Vec<BookId>) -> Result<()>;

    // =========================================================================
    // Characters
    // =========================================================================

    async fn characters_for_book(&self, book: BookId) -> Result<Vec<Character>>;
    async fn get_character(&self, id: CharacterId) -> Result<Character>;
    async fn create_character(&self, character: NewCharacter) -> Result<Character>;
    async fn update_character(&self, id: CharacterId, changes: CharacterChanges) -> Result<Character>;
    /// Deleting a character deletes every relationship it takes part in.
    async fn delete_character(&self, id: CharacterId) -> Result<()>;
    async fn reorder_characters(&self, book: BookId, characters: Vec<CharacterId>) -> Result<()>;

    /// Every relationship record the character takes part in, from either end.
    async fn relationships(&self, character: CharacterId) -> Result<Vec<Relationship>>;
    async fn add_relationship(&self, relationship: NewRelationship) -> Result<Relationship>;
    async fn update_relationship(&self, id: RelationshipId, changes: RelationshipChanges) -> Result<Relationship>;
    async fn remove_relationship(&self, id: RelationshipId) -> Result<()>;

    // =========================================================================
    // Chapters
    // =========================================================================

    async fn chapters_for_book(&self, book: BookId) -> Result<Vec<Chapter>>;
    async fn get_chapter(&self, id: ChapterId) -> Result<Chapter>;
    async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter>;
    async fn update_chapter(&self, id: ChapterId, changes: ChapterChanges) -> Result<Chapter>;
    /// Deleting a chapter deletes its scenes.
    async fn delete_chapter(&self, id: ChapterId) -> Result<()>;
    async fn reorder_chapters(&self, book: BookId, chapters: Vec<ChapterId>) -> Result<()>;

    // =========================================================================
    // Scenes
    // =========================================================================

    async fn scenes_for_chapter(&self, chapter: ChapterId) -> Result<Vec<Scene>>;
    async fn get_scene(&self, id: SceneId) -> Result<Scene>;
    async fn create_scene(&self, scene: NewScene) -> Result<Scene>;
    async fn update_scene(&self, id: SceneId, changes: SceneChanges) -> Result<Scene>;
    async fn delete_scene(&self, id: SceneId) -> Result<()>;
    async fn reorder_scenes(&self, chapter: ChapterId, scenes: Vec<SceneId>) -> Result<()>;
    /// Move a scene into another chapter (appending when `position` is `None`).
    async fn move_scene(&self, id: SceneId, chapter: ChapterId, position: Option<u32>) -> Result<Scene>;
}
