//! In-memory remote service for testing.

use super::RemoteService;
use crate::error::{ErrorKind, Result};
use crate::reply::Reply;
use async_trait::async_trait;
use quire_model::{
    Book, BookChanges, BookId, Chapter, ChapterChanges, ChapterId, Character, CharacterChanges, CharacterId, Entity,
    EntityKind, EntityRef, NewBook, NewChapter, NewCharacter, NewRelationship, NewScene, NewSeries, Relationship,
    RelationshipChanges, RelationshipId, Scene, SceneChanges, SceneId, Series, SeriesChanges, SeriesEntry, SeriesId,
    validate_dates,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// A failure to inject into the next call of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The service answers `success: false` with this message.
    Rejected(String),
    /// The call never reaches the service.
    Transport(String),
}
impl Failure {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Where [`add_book_to_series`](RemoteService::add_book_to_series) places a
/// book when no position is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InsertPolicy {
    #[default]
    Append,
    Front,
}

/// In-memory remote service for testing.
///
/// Entities are stored in ordered maps behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. IDs are
/// assigned from a single counter shared by every entity kind.
///
/// Each call is counted per operation name (the trait method name), and can
/// be made to fail ([`fail_next`](Self::fail_next)) or to answer late
/// ([`delay`](Self::delay)).
///
/// # Examples
///
/// ```
/// use quire_model::NewBook;
/// use quire_remote::RemoteService;
/// use quire_remote::service::{Failure, MockRemote};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let remote = MockRemote::default();
/// let dune = remote.create_book(NewBook::new("Dune")).await.unwrap();
/// assert_eq!(remote.calls("create_book").await, 1);
///
/// remote.fail_next("delete_book", Failure::rejected("locked")).await;
/// assert!(remote.delete_book(dune.id).await.is_err());
/// assert!(remote.get_book(dune.id).await.is_ok());
/// # }
/// ```
#[derive(Default)]
pub struct MockRemote {
    name: String,
    tables: RwLock<Tables>,
    controls: RwLock<Controls>,
}

#[derive(Default)]
struct Controls {
    failures: HashMap<&'static str, VecDeque<Failure>>,
    delays: HashMap<&'static str, Duration>,
    calls: HashMap<&'static str, usize>,
    insert_policy: InsertPolicy,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    books: BTreeMap<BookId, Book>,
    series: BTreeMap<SeriesId, Series>,
    /// Ordered book IDs per series; a book's position is its index + 1.
    memberships: BTreeMap<SeriesId, Vec<BookId>>,
    characters: BTreeMap<CharacterId, Character>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    chapters: BTreeMap<ChapterId, Chapter>,
    scenes: BTreeMap<SceneId, Scene>,
}

impl MockRemote {
    /// Change the name of the mock service.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_insert_policy(mut self, policy: InsertPolicy) -> Self {
        self.controls.get_mut().insert_policy = policy;
        self
    }

    /// Queue a failure for the next call of `op`. Multiple failures for the
    /// same operation are consumed in order.
    pub async fn fail_next(&self, op: &'static str, failure: Failure) {
        self.controls.write().await.failures.entry(op).or_default().push_back(failure);
    }

    /// Make every call of `op` wait before answering.
    pub async fn delay(&self, op: &'static str, delay: Duration) {
        self.controls.write().await.delays.insert(op, delay);
    }

    /// Number of calls made to `op`, including failed ones.
    pub async fn calls(&self, op: &'static str) -> usize {
        self.controls.read().await.calls.get(op).copied().unwrap_or(0)
    }

    pub async fn reset_calls(&self) {
        self.controls.write().await.calls.clear();
    }

    /// Book IDs of a series in position order, bypassing call accounting.
    pub async fn membership(&self, series: SeriesId) -> Vec<BookId> {
        self.tables.read().await.memberships.get(&series).cloned().unwrap_or_default()
    }

    /// Account for the call, honour any configured delay, then fail if a
    /// failure was queued.
    async fn enter(&self, op: &'static str) -> Result<()> {
        let (delay, failure) = {
            let mut controls = self.controls.write().await;
            *controls.calls.entry(op).or_default() += 1;
            let failure = controls.failures.get_mut(op).and_then(VecDeque::pop_front);
            (controls.delays.get(op).copied(), failure)
        };
        tracing::trace!(service = %self.name, op, "Mock call");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &failure {
            tracing::debug!(service = %self.name, op, ?failure, "Injecting failure");
        }
        match failure {
            None => Ok(()),
            Some(Failure::Rejected(message)) => Reply::<()>::failure(message).into_result(),
            Some(Failure::Transport(message)) => exn::bail!(ErrorKind::Transport(message)),
        }
    }

    async fn insert_policy(&self) -> InsertPolicy {
        self.controls.read().await.insert_policy
    }
}

fn not_found(kind: EntityKind, id: impl Into<i64>) -> crate::error::Error {
    exn::Exn::from(ErrorKind::NotFound(EntityRef::new(kind, id)))
}

fn rejected(message: impl Into<String>) -> crate::error::Error {
    exn::Exn::from(ErrorKind::Rejected(message.into()))
}

/// Server-side validation: a model error becomes a rejection the user can read.
fn validated(result: quire_model::error::Result<()>) -> Result<()> {
    result.map_err(|e| {
        let message = (*e).to_string();
        e.raise(ErrorKind::Rejected(message))
    })
}

fn lookup<E: Entity>(map: &BTreeMap<E::Id, E>, id: E::Id) -> Result<&E> {
    map.get(&id).ok_or_else(|| not_found(E::KIND, id))
}

fn lookup_mut<E: Entity>(map: &mut BTreeMap<E::Id, E>, id: E::Id) -> Result<&mut E> {
    map.get_mut(&id).ok_or_else(|| not_found(E::KIND, id))
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Entities ordered among their siblings.
trait Ordered: Entity {
    fn position(&self) -> u32;
    fn set_position(&mut self, position: u32);
}
impl Ordered for Character {
    fn position(&self) -> u32 {
        self.position
    }
    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}
impl Ordered for Chapter {
    fn position(&self) -> u32 {
        self.position
    }
    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}
impl Ordered for Scene {
    fn position(&self) -> u32 {
        self.position
    }
    fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}

/// IDs of the siblings matching `member`, in position order.
fn sibling_ids<E: Ordered>(map: &BTreeMap<E::Id, E>, member: impl Fn(&E) -> bool) -> Vec<E::Id> {
    let mut keyed: Vec<(u32, E::Id)> = map.values().filter(|e| member(*e)).map(|e| (e.position(), e.id())).collect();
    keyed.sort();
    keyed.into_iter().map(|(_, id)| id).collect()
}

fn siblings<E: Ordered>(map: &BTreeMap<E::Id, E>, member: impl Fn(&E) -> bool) -> Vec<E> {
    sibling_ids(map, member).into_iter().filter_map(|id| map.get(&id).cloned()).collect()
}

/// Assign compact positions (0..n) following `order`.
fn apply_order<E: Ordered>(map: &mut BTreeMap<E::Id, E>, order: &[E::Id]) {
    for (index, id) in order.iter().enumerate() {
        if let Some(entity) = map.get_mut(id) {
            entity.set_position(to_u32(index));
        }
    }
}

/// Close the gaps left by removals and appends.
fn renumber<E: Ordered>(map: &mut BTreeMap<E::Id, E>, member: impl Fn(&E) -> bool) {
    let order = sibling_ids(map, member);
    apply_order(map, &order);
}

/// A reorder must name every current member exactly once.
fn check_permutation<I: Ord + Copy>(current: &[I], proposed: &[I]) -> Result<()> {
    let mut current = current.to_vec();
    let mut proposed = proposed.to_vec();
    current.sort();
    proposed.sort();
    if current != proposed {
        exn::bail!(ErrorKind::Rejected("order must list every member exactly once".to_string()));
    }
    Ok(())
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn series_entries(&self, id: SeriesId) -> Vec<SeriesEntry> {
        self.memberships
            .get(&id)
            .map(|books| {
                books
                    .iter()
                    .enumerate()
                    .filter_map(|(index, book)| {
                        self.books.get(book).map(|book| SeriesEntry { book: book.clone(), position: to_u32(index + 1) })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_character(&mut self, id: CharacterId) {
        self.characters.remove(&id);
        self.relationships.retain(|_, r| !r.involves(id));
    }

    fn remove_chapter(&mut self, id: ChapterId) {
        self.chapters.remove(&id);
        self.scenes.retain(|_, s| s.chapter_id != id);
    }

    fn set_archived_book(&mut self, id: BookId, archived: bool) -> Result<Book> {
        let book = lookup_mut(&mut self.books, id)?;
        book.archived = archived;
        book.updated_at = OffsetDateTime::now_utc();
        Ok(book.clone())
    }

    fn set_archived_series(&mut self, id: SeriesId, archived: bool) -> Result<Series> {
        let series = lookup_mut(&mut self.series, id)?;
        series.archived = archived;
        series.updated_at = OffsetDateTime::now_utc();
        Ok(series.clone())
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    fn name(&self) -> &str {
        if self.name.is_empty() { "mock" } else { &self.name }
    }

    // Books

    async fn list_books(&self) -> Result<Vec<Book>> {
        self.enter("list_books").await?;
        Ok(self.tables.read().await.books.values().cloned().collect())
    }

    async fn get_book(&self, id: BookId) -> Result<Book> {
        self.enter("get_book").await?;
        lookup(&self.tables.read().await.books, id).cloned()
    }

    async fn create_book(&self, book: NewBook) -> Result<Book> {
        self.enter("create_book").await?;
        validated(book.validate())?;
        let mut tables = self.tables.write().await;
        let id = BookId(tables.next_id());
        let book = book.into_book(id, OffsetDateTime::now_utc());
        tables.books.insert(id, book.clone());
        Ok(book)
    }

    async fn update_book(&self, id: BookId, changes: BookChanges) -> Result<Book> {
        self.enter("update_book").await?;
        validated(changes.validate())?;
        let mut tables = self.tables.write().await;
        let book = lookup_mut(&mut tables.books, id)?;
        changes.apply_to(book);
        book.updated_at = OffsetDateTime::now_utc();
        Ok(book.clone())
    }

    async fn delete_book(&self, id: BookId) -> Result<()> {
        self.enter("delete_book").await?;
        let mut tables = self.tables.write().await;
        tables.books.remove(&id).ok_or_else(|| not_found(EntityKind::Book, id))?;
        let cast: Vec<CharacterId> = tables.characters.values().filter(|c| c.book_id == id).map(|c| c.id).collect();
        for character in cast {
            tables.remove_character(character);
        }
        tables.chapters.retain(|_, c| c.book_id != id);
        tables.scenes.retain(|_, s| s.book_id != id);
        for books in tables.memberships.values_mut() {
            books.retain(|book| *book != id);
        }
        Ok(())
    }

    async fn archive_book(&self, id: BookId) -> Result<Book> {
        self.enter("archive_book").await?;
        self.tables.write().await.set_archived_book(id, true)
    }

    async fn unarchive_book(&self, id: BookId) -> Result<Book> {
        self.enter("unarchive_book").await?;
        self.tables.write().await.set_archived_book(id, false)
    }

    // Series

    async fn list_series(&self) -> Result<Vec<Series>> {
        self.enter("list_series").await?;
        Ok(self.tables.read().await.series.values().cloned().collect())
    }

    async fn get_series(&self, id: SeriesId) -> Result<Series> {
        self.enter("get_series").await?;
        lookup(&self.tables.read().await.series, id).cloned()
    }

    async fn series_books(&self, id: SeriesId) -> Result<Vec<SeriesEntry>> {
        self.enter("series_books").await?;
        let tables = self.tables.read().await;
        lookup(&tables.series, id)?;
        Ok(tables.series_entries(id))
    }

    async fn create_series(&self, series: NewSeries) -> Result<Series> {
        self.enter("create_series").await?;
        validated(series.validate())?;
        let mut tables = self.tables.write().await;
        let id = SeriesId(tables.next_id());
        let series = series.into_series(id, OffsetDateTime::now_utc());
        tables.series.insert(id, series.clone());
        tables.memberships.insert(id, Vec::new());
        Ok(series)
    }

    async fn update_series(&self, id: SeriesId, changes: SeriesChanges) -> Result<Series> {
        self.enter("update_series").await?;
        validated(changes.validate())?;
        let mut tables = self.tables.write().await;
        let series = lookup_mut(&mut tables.series, id)?;
        changes.apply_to(series);
        series.updated_at = OffsetDateTime::now_utc();
        Ok(series.clone())
    }

    async fn delete_series(&self, id: SeriesId) -> Result<()> {
        self.enter("delete_series").await?;
        let mut tables = self.tables.write().await;
        tables.series.remove(&id).ok_or_else(|| not_found(EntityKind::Series, id))?;
        tables.memberships.remove(&id);
        Ok(())
    }

    async fn archive_series(&self, id: SeriesId) -> Result<Series> {
        self.enter("archive_series").await?;
        self.tables.write().await.set_archived_series(id, true)
    }

    async fn unarchive_series(&self, id: SeriesId) -> Result<Series> {
        self.enter("unarchive_series").await?;
        self.tables.write().await.set_archived_series(id, false)
    }

    // Book-Series relationship

    async fn add_book_to_series(&self, book: BookId, series: SeriesId, position: Option<u32>) -> Result<()> {
        self.enter("add_book_to_series").await?;
        let policy = self.insert_policy().await;
        let mut tables = self.tables.write().await;
        lookup(&tables.books, book)?;
        lookup(&tables.series, series)?;
        let books = tables.memberships.entry(series).or_default();
        if books.contains(&book) {
            return Err(rejected("book is already part of this series"));
        }
        let index = match (position, policy) {
            // Positions are 1-indexed.
            (Some(position), _) => usize::try_from(position.saturating_sub(1)).unwrap_or(usize::MAX).min(books.len()),
            (None, InsertPolicy::Append) => books.len(),
            (None, InsertPolicy::Front) => 0,
        };
        books.insert(index, book);
        Ok(())
    }

    async fn remove_book_from_series(&self, book: BookId, series: SeriesId) -> Result<()> {
        self.enter("remove_book_from_series").await?;
        let mut tables = self.tables.write().await;
        lookup(&tables.series, series)?;
        let books = tables.memberships.entry(series).or_default();
        let before = books.len();
        books.retain(|b| *b != book);
        if books.len() == before {
            return Err(not_found(EntityKind::Book, book));
        }
        Ok(())
    }

    async fn update_book_position(&self, book: BookId, series: SeriesId, position: u32) -> Result<()> {
        self.enter("update_book_position").await?;
        let mut tables = self.tables.write().await;
        lookup(&tables.series, series)?;
        let books = tables.memberships.entry(series).or_default();
        let from = books.iter().position(|b| *b == book).ok_or_else(|| not_found(EntityKind::Book, book))?;
        books.remove(from);
        let to = usize::try_from(position.saturating_sub(1)).unwrap_or(usize::MAX).min(books.len());
        books.insert(to, book);
        Ok(())
    }

    async fn reorder_series(&self, series: SeriesId, books: Vec<BookId>) -> Result<()> {
        self.enter("reorder_series").await?;
        let mut tables = self.tables.write().await;
        lookup(&tables.series, series)?;
        let current = tables.memberships.entry(series).or_default();
        check_permutation(current, &books)?;
        *current = books;
        Ok(())
    }

    // Characters

    async fn characters_for_book(&self, book: BookId) -> Result<Vec<Character>> {
        self.enter("characters_for_book").await?;
        let tables = self.tables.read().await;
        lookup(&tables.books, book)?;
        Ok(siblings(&tables.characters, |c| c.book_id == book))
    }

    async fn get_character(&self, id: CharacterId) -> Result<Character> {
        self.enter("get_character").await?;
        lookup(&self.tables.read().await.characters, id).cloned()
    }

    async fn create_character(&self, character: NewCharacter) -> Result<Character> {
        self.enter("create_character").await?;
        validated(character.validate())?;
        let mut tables = self.tables.write().await;
        lookup(&tables.books, character.book_id)?;
        let position = to_u32(tables.characters.values().filter(|c| c.book_id == character.book_id).count());
        let id = CharacterId(tables.next_id());
        let character = character.into_character(id, position);
        tables.characters.insert(id, character.clone());
        Ok(character)
    }

    async fn update_character(&self, id: CharacterId, changes: CharacterChanges) -> Result<Character> {
        self.enter("update_character").await?;
        validated(changes.validate())?;
        let mut tables = self.tables.write().await;
        if let Some(book) = changes.book_id {
            lookup(&tables.books, book)?;
        }
        let character = lookup_mut(&mut tables.characters, id)?;
        let previous_book = character.book_id;
        changes.apply_to(character);
        let book = character.book_id;
        if book != previous_book {
            // Moved: goes last in the new book.
            character.position = u32::MAX;
            renumber(&mut tables.characters, |c| c.book_id == previous_book);
            renumber(&mut tables.characters, |c| c.book_id == book);
        }
        lookup(&tables.characters, id).cloned()
    }

    async fn delete_character(&self, id: CharacterId) -> Result<()> {
        self.enter("delete_character").await?;
        let mut tables = self.tables.write().await;
        let book = lookup(&tables.characters, id)?.book_id;
        tables.remove_character(id);
        renumber(&mut tables.characters, |c| c.book_id == book);
        Ok(())
    }

    async fn reorder_characters(&self, book: BookId, characters: Vec<CharacterId>) -> Result<()> {
        self.enter("reorder_characters").await?;
        let mut tables = self.tables.write().await;
        lookup(&tables.books, book)?;
        check_permutation(&sibling_ids(&tables.characters, |c| c.book_id == book), &characters)?;
        apply_order(&mut tables.characters, &characters);
        Ok(())
    }

    async fn relationships(&self, character: CharacterId) -> Result<Vec<Relationship>> {
        self.enter("relationships").await?;
        let tables = self.tables.read().await;
        lookup(&tables.characters, character)?;
        Ok(tables.relationships.values().filter(|r| r.involves(character)).cloned().collect())
    }

    async fn add_relationship(&self, relationship: NewRelationship) -> Result<Relationship> {
        self.enter("add_relationship").await?;
        validated(relationship.validate())?;
        let mut tables = self.tables.write().await;
        lookup(&tables.characters, relationship.character_id)?;
        lookup(&tables.characters, relationship.related_character_id)?;
        let duplicate = tables.relationships.values().any(|r| {
            r.kind == relationship.kind
                && ((r.character_id == relationship.character_id
                    && r.related_character_id == relationship.related_character_id)
                    || (relationship.kind.is_symmetric()
                        && r.character_id == relationship.related_character_id
                        && r.related_character_id == relationship.character_id))
        });
        if duplicate {
            return Err(rejected("relationship already exists"));
        }
        let id = RelationshipId(tables.next_id());
        let relationship = relationship.into_relationship(id);
        tables.relationships.insert(id, relationship.clone());
        Ok(relationship)
    }

    async fn update_relationship(&self, id: RelationshipId, changes: RelationshipChanges) -> Result<Relationship> {
        self.enter("update_relationship").await?;
        let mut tables = self.tables.write().await;
        let relationship = lookup_mut(&mut tables.relationships, id)?;
        changes.apply_to(relationship);
        Ok(relationship.clone())
    }

    async fn remove_relationship(&self, id: RelationshipId) -> Result<()> {
        self.enter("remove_relationship").await?;
        let mut tables = self.tables.write().await;
        tables.relationships.remove(&id).map(|_| ()).ok_or_else(|| not_found(EntityKind::Relationship, id))
    }

    // Chapters

    async fn chapters_for_book(&self, book: BookId) -> Result<Vec<Chapter>> {
        self.enter("chapters_for_book").await?;
        let tables = self.tables.read().await;
        lookup(&tables.books, book)?;
        Ok(siblings(&tables.chapters, |c| c.book_id == book))
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Chapter> {
        self.enter("get_chapter").await?;
        lookup(&self.tables.read().await.chapters, id).cloned()
    }

    async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter> {
        self.enter("create_chapter").await?;
        validated(chapter.validate())?;
        let mut tables = self.tables.write().await;
        lookup(&tables.books, chapter.book_id)?;
        let position = to_u32(tables.chapters.values().filter(|c| c.book_id == chapter.book_id).count());
        let id = ChapterId(tables.next_id());
        let chapter = chapter.into_chapter(id, position);
        tables.chapters.insert(id, chapter.clone());
        Ok(chapter)
    }

    async fn update_chapter(&self, id: ChapterId, changes: ChapterChanges) -> Result<Chapter> {
        self.enter("update_chapter").await?;
        validated(changes.validate())?;
        let mut tables = self.tables.write().await;
        let chapter = lookup_mut(&mut tables.chapters, id)?;
        changes.apply_to(chapter);
        Ok(chapter.clone())
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<()> {
        self.enter("delete_chapter").await?;
        let mut tables = self.tables.write().await;
        let book = lookup(&tables.chapters, id)?.book_id;
        tables.remove_chapter(id);
        renumber(&mut tables.chapters, |c| c.book_id == book);
        Ok(())
    }

    async fn reorder_chapters(&self, book: BookId, chapters: Vec<ChapterId>) -> Result<()> {
        self.enter("reorder_chapters").await?;
        let mut tables = self.tables.write().await;
        lookup(&tables.books, book)?;
        check_permutation(&sibling_ids(&tables.chapters, |c| c.book_id == book), &chapters)?;
        apply_order(&mut tables.chapters, &chapters);
        Ok(())
    }

    // Scenes

    async fn scenes_for_chapter(&self, chapter: ChapterId) -> Result<Vec<Scene>> {
        self.enter("scenes_for_chapter").await?;
        let tables = self.tables.read().await;
        lookup(&tables.chapters, chapter)?;
        Ok(siblings(&tables.scenes, |s| s.chapter_id == chapter))
    }

    async fn get_scene(&self, id: SceneId) -> Result<Scene> {
        self.enter("get_scene").await?;
        lookup(&self.tables.read().await.scenes, id).cloned()
    }

    async fn create_scene(&self, scene: NewScene) -> Result<Scene> {
        self.enter("create_scene").await?;
        validated(scene.validate())?;
        let mut tables = self.tables.write().await;
        let book = lookup(&tables.chapters, scene.chapter_id)?.book_id;
        let position = to_u32(tables.scenes.values().filter(|s| s.chapter_id == scene.chapter_id).count());
        let id = SceneId(tables.next_id());
        let scene = scene.into_scene(id, book, position);
        tables.scenes.insert(id, scene.clone());
        Ok(scene)
    }

    async fn update_scene(&self, id: SceneId, changes: SceneChanges) -> Result<Scene> {
        self.enter("update_scene").await?;
        let mut tables = self.tables.write().await;
        let mut scene = lookup(&tables.scenes, id)?.clone();
        changes.apply_to(&mut scene);
        validated(validate_dates(scene.start_date, scene.end_date))?;
        tables.scenes.insert(id, scene.clone());
        Ok(scene)
    }

    async fn delete_scene(&self, id: SceneId) -> Result<()> {
        self.enter("delete_scene").await?;
        let mut tables = self.tables.write().await;
        let chapter = lookup(&tables.scenes, id)?.chapter_id;
        tables.scenes.remove(&id);
        renumber(&mut tables.scenes, |s| s.chapter_id == chapter);
        Ok(())
    }

    async fn reorder_scenes(&self, chapter: ChapterId, scenes: Vec<SceneId>) -> Result<()> {
        self.enter("reorder_scenes").await?;
        let mut tables = self.tables.write().await;
        lookup(&tables.chapters, chapter)?;
        check_permutation(&sibling_ids(&tables.scenes, |s| s.chapter_id == chapter), &scenes)?;
        apply_order(&mut tables.scenes, &scenes);
        Ok(())
    }

    async fn move_scene(&self, id: SceneId, chapter: ChapterId, position: Option<u32>) -> Result<Scene> {
        self.enter("move_scene").await?;
        let mut tables = self.tables.write().await;
        let book = lookup(&tables.chapters, chapter)?.book_id;
        let previous_chapter = lookup(&tables.scenes, id)?.chapter_id;
        let mut order = sibling_ids(&tables.scenes, |s| s.chapter_id == chapter && s.id != id);
        let index = position.map_or(order.len(), |p| usize::try_from(p).unwrap_or(usize::MAX).min(order.len()));
        order.insert(index, id);
        let scene = lookup_mut(&mut tables.scenes, id)?;
        scene.chapter_id = chapter;
        scene.book_id = book;
        apply_order(&mut tables.scenes, &order);
        if previous_chapter != chapter {
            renumber(&mut tables.scenes, |s| s.chapter_id == previous_chapter);
        }
        lookup(&tables.scenes, id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_model::{RelationshipKind, Role};

    async fn seeded() -> (MockRemote, Book) {
        let remote = MockRemote::default();
        let book = remote.create_book(NewBook::new("Dune").with_author("Herbert")).await.unwrap();
        (remote, book)
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let (remote, dune) = seeded().await;
        let messiah = remote.create_book(NewBook::new("Dune Messiah")).await.unwrap();
        assert_ne!(dune.id, messiah.id);
        assert_eq!(remote.list_books().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let remote = MockRemote::default();
        let err = remote.create_book(NewBook::new("")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected(message) if message.contains("name")));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let remote = MockRemote::default();
        let err = remote.get_book(BookId(99)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(EntityRef::new(EntityKind::Book, 99i64)));
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let (remote, dune) = seeded().await;
        remote.fail_next("get_book", Failure::rejected("first")).await;
        remote.fail_next("get_book", Failure::transport("second")).await;
        assert_eq!(*remote.get_book(dune.id).await.unwrap_err(), ErrorKind::Rejected("first".to_string()));
        assert_eq!(*remote.get_book(dune.id).await.unwrap_err(), ErrorKind::Transport("second".to_string()));
        assert!(remote.get_book(dune.id).await.is_ok());
        assert_eq!(remote.calls("get_book").await, 3);
    }

    #[tokio::test]
    async fn test_series_positions() {
        let (remote, dune) = seeded().await;
        let messiah = remote.create_book(NewBook::new("Dune Messiah")).await.unwrap();
        let children = remote.create_book(NewBook::new("Children of Dune")).await.unwrap();
        let series = remote.create_series(NewSeries::new("Dune Chronicles")).await.unwrap();
        remote.add_book_to_series(messiah.id, series.id, None).await.unwrap();
        remote.add_book_to_series(children.id, series.id, None).await.unwrap();
        remote.add_book_to_series(dune.id, series.id, Some(1)).await.unwrap();
        let entries = remote.series_books(series.id).await.unwrap();
        let order: Vec<_> = entries.iter().map(|e| (e.book_id(), e.position)).collect();
        assert_eq!(order, vec![(dune.id, 1), (messiah.id, 2), (children.id, 3)]);

        remote.update_book_position(dune.id, series.id, 3).await.unwrap();
        assert_eq!(remote.membership(series.id).await, vec![messiah.id, children.id, dune.id]);

        let err = remote.add_book_to_series(dune.id, series.id, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected(_)));
    }

    #[tokio::test]
    async fn test_front_insert_policy() {
        let remote = MockRemote::default().with_insert_policy(InsertPolicy::Front);
        let a = remote.create_book(NewBook::new("A")).await.unwrap();
        let b = remote.create_book(NewBook::new("B")).await.unwrap();
        let series = remote.create_series(NewSeries::new("S")).await.unwrap();
        remote.add_book_to_series(a.id, series.id, None).await.unwrap();
        remote.add_book_to_series(b.id, series.id, None).await.unwrap();
        assert_eq!(remote.membership(series.id).await, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_reorder_requires_permutation() {
        let (remote, dune) = seeded().await;
        let paul = remote.create_character(NewCharacter::new(dune.id, "Paul")).await.unwrap();
        let jessica = remote.create_character(NewCharacter::new(dune.id, "Jessica")).await.unwrap();
        assert!(remote.reorder_characters(dune.id, vec![paul.id]).await.is_err());
        assert!(remote.reorder_characters(dune.id, vec![paul.id, paul.id]).await.is_err());
        remote.reorder_characters(dune.id, vec![jessica.id, paul.id]).await.unwrap();
        let cast: Vec<_> = remote.characters_for_book(dune.id).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(cast, vec![jessica.id, paul.id]);
    }

    #[tokio::test]
    async fn test_delete_character_cascades_relationships() {
        let (remote, dune) = seeded().await;
        let paul = remote.create_character(NewCharacter::new(dune.id, "Paul").with_role(Role::Protagonist)).await;
        let paul = paul.unwrap();
        let chani = remote.create_character(NewCharacter::new(dune.id, "Chani")).await.unwrap();
        remote.add_relationship(NewRelationship::new(paul.id, chani.id, RelationshipKind::Partner)).await.unwrap();
        assert_eq!(remote.relationships(chani.id).await.unwrap().len(), 1);
        remote.delete_character(paul.id).await.unwrap();
        assert!(remote.relationships(chani.id).await.unwrap().is_empty());
        assert_eq!(remote.characters_for_book(dune.id).await.unwrap()[0].position, 0);
    }

    #[tokio::test]
    async fn test_symmetric_duplicate_rejected() {
        let (remote, dune) = seeded().await;
        let paul = remote.create_character(NewCharacter::new(dune.id, "Paul")).await.unwrap();
        let irulan = remote.create_character(NewCharacter::new(dune.id, "Irulan")).await.unwrap();
        remote.add_relationship(NewRelationship::new(paul.id, irulan.id, RelationshipKind::Spouse)).await.unwrap();
        let err = remote
            .add_relationship(NewRelationship::new(irulan.id, paul.id, RelationshipKind::Spouse))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected(_)));
    }

    #[tokio::test]
    async fn test_move_scene_between_chapters() {
        let (remote, dune) = seeded().await;
        let one = remote.create_chapter(NewChapter::new(dune.id, "One")).await.unwrap();
        let two = remote.create_chapter(NewChapter::new(dune.id, "Two")).await.unwrap();
        let a = remote.create_scene(NewScene::new(one.id, "A")).await.unwrap();
        let b = remote.create_scene(NewScene::new(one.id, "B")).await.unwrap();
        let c = remote.create_scene(NewScene::new(two.id, "C")).await.unwrap();
        let moved = remote.move_scene(a.id, two.id, Some(0)).await.unwrap();
        assert_eq!(moved.chapter_id, two.id);
        assert_eq!(moved.position, 0);
        let two_scenes: Vec<_> = remote.scenes_for_chapter(two.id).await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(two_scenes, vec![a.id, c.id]);
        let one_scenes = remote.scenes_for_chapter(one.id).await.unwrap();
        assert_eq!(one_scenes.len(), 1);
        assert_eq!((one_scenes[0].id, one_scenes[0].position), (b.id, 0));
    }

    #[tokio::test]
    async fn test_delete_book_cascades() {
        let (remote, dune) = seeded().await;
        let chapter = remote.create_chapter(NewChapter::new(dune.id, "One")).await.unwrap();
        remote.create_scene(NewScene::new(chapter.id, "A")).await.unwrap();
        remote.create_character(NewCharacter::new(dune.id, "Paul")).await.unwrap();
        let series = remote.create_series(NewSeries::new("S")).await.unwrap();
        remote.add_book_to_series(dune.id, series.id, None).await.unwrap();
        remote.delete_book(dune.id).await.unwrap();
        assert!(remote.get_chapter(chapter.id).await.is_err());
        assert!(remote.membership(series.id).await.is_empty());
    }
}
