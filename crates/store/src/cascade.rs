//! Local cleanup when an entity is deleted: owned entities go with it, and
//! its identifier is pruned from every cached collection that listed it.

use crate::scope::Scope;
use crate::txn::Txn;
use quire_config::CharacterInvalidation;
use quire_model::{
    BookId, Chapter, ChapterId, Character, CharacterId, EntityKind, EntityRef, Relationship, RelationshipId, Scene,
    SceneId, SeriesId,
};

fn drop_entity(txn: &mut Txn<'_>, entity: EntityRef) {
    txn.remove(entity);
    txn.prune(entity);
}

pub(crate) fn delete_book(txn: &mut Txn<'_>, id: BookId) {
    let cast: Vec<CharacterId> =
        txn.entities().get_all::<Character>().filter(|c| c.book_id == id).map(|c| c.id).collect();
    for character in cast {
        remove_character(txn, character);
    }
    let chapters: Vec<ChapterId> =
        txn.entities().get_all::<Chapter>().filter(|c| c.book_id == id).map(|c| c.id).collect();
    for chapter in chapters {
        delete_chapter(txn, chapter);
    }
    // Scenes whose chapter was never loaded.
    let scenes: Vec<SceneId> = txn.entities().get_all::<Scene>().filter(|s| s.book_id == id).map(|s| s.id).collect();
    for scene in scenes {
        delete_scene(txn, scene);
    }
    txn.invalidate(Scope::Characters(id));
    txn.invalidate(Scope::Chapters(id));
    // Prunes the book from the library list and from every series layout.
    drop_entity(txn, EntityRef::new(EntityKind::Book, id));
}

pub(crate) fn delete_series(txn: &mut Txn<'_>, id: SeriesId) {
    txn.invalidate(Scope::SeriesLayout(id));
    drop_entity(txn, EntityRef::new(EntityKind::Series, id));
}

/// Remove a character and every relationship it takes part in.
fn remove_character(txn: &mut Txn<'_>, id: CharacterId) {
    let relationships: Vec<RelationshipId> =
        txn.entities().get_all::<Relationship>().filter(|r| r.involves(id)).map(|r| r.id).collect();
    for relationship in relationships {
        delete_relationship(txn, relationship);
    }
    txn.invalidate(Scope::Relationships(id));
    drop_entity(txn, EntityRef::new(EntityKind::Character, id));
}

/// Character lists are dropped rather than pruned: role groupings and
/// positions are recomputed from a fresh fetch.
pub(crate) fn delete_character(txn: &mut Txn<'_>, id: CharacterId, scope: CharacterInvalidation) {
    let book = txn.entities().get::<Character>(id).map(|c| c.book_id);
    remove_character(txn, id);
    match (scope, book) {
        (CharacterInvalidation::Book, Some(book)) => txn.invalidate(Scope::Characters(book)),
        // An unknown character could be listed anywhere.
        (CharacterInvalidation::All, _) | (_, None) => {
            txn.invalidate_where(|scope| matches!(scope, Scope::Characters(_)));
        },
    }
}

pub(crate) fn delete_relationship(txn: &mut Txn<'_>, id: RelationshipId) {
    drop_entity(txn, EntityRef::new(EntityKind::Relationship, id));
}

pub(crate) fn delete_chapter(txn: &mut Txn<'_>, id: ChapterId) {
    let scenes: Vec<SceneId> = txn.entities().get_all::<Scene>().filter(|s| s.chapter_id == id).map(|s| s.id).collect();
    for scene in scenes {
        delete_scene(txn, scene);
    }
    txn.invalidate(Scope::Scenes(id));
    drop_entity(txn, EntityRef::new(EntityKind::Chapter, id));
}

pub(crate) fn delete_scene(txn: &mut Txn<'_>, id: SceneId) {
    drop_entity(txn, EntityRef::new(EntityKind::Scene, id));
}

/// Take a book out of a series' cached layout.
pub(crate) fn unlink_book(txn: &mut Txn<'_>, book: BookId, series: SeriesId) {
    let scope = Scope::SeriesLayout(series);
    if let Some(ids) = txn.caches().get(scope) {
        let ids: Vec<i64> = ids.iter().copied().filter(|id| *id != book.get()).collect();
        txn.set(scope, ids);
    }
}

/// Drop the scene lists a scene left and joined.
pub(crate) fn moved_scene(txn: &mut Txn<'_>, scene: &Scene) {
    match txn.entities().get::<Scene>(scene.id).map(|s| s.chapter_id) {
        Some(previous) => txn.invalidate(Scope::Scenes(previous)),
        None => {
            let id = scene.id.get();
            let listing: Vec<Scope> = txn
                .caches()
                .entries()
                .iter()
                .filter(|(scope, ids)| matches!(scope, Scope::Scenes(_)) && ids.contains(&id))
                .map(|(scope, _)| *scope)
                .collect();
            for scope in listing {
                txn.invalidate(scope);
            }
        },
    }
    txn.invalidate(Scope::Scenes(scene.chapter_id));
    txn.upsert(scene.clone());
}

/// Drop both character lists when a character changed books.
pub(crate) fn updated_character(txn: &mut Txn<'_>, character: &Character, moved: bool) {
    let previous = txn.entities().get::<Character>(character.id).map(|c| c.book_id);
    match previous {
        Some(previous) if previous != character.book_id => {
            txn.invalidate(Scope::Characters(previous));
            txn.invalidate(Scope::Characters(character.book_id));
        },
        None if moved => txn.invalidate(Scope::Characters(character.book_id)),
        _ => {},
    }
    txn.upsert(character.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Caches;
    use crate::entities::Entities;
    use quire_model::{Book, Entity, NewBook, NewChapter, NewCharacter, NewRelationship, NewScene, RelationshipKind};
    use time::OffsetDateTime;
    use tokio::sync::broadcast;

    /// Whether the maps still hold anything belonging to `book`.
    fn owns_anything(txn: &Txn<'_>, book: BookId) -> bool {
        let entities = txn.entities();
        entities.get::<Book>(book).is_some()
            || entities.get_all::<Character>().any(|c| c.book_id == book)
            || entities.get_all::<Chapter>().any(|c| c.book_id == book)
            || entities.get_all::<Scene>().any(|s| s.book_id == book)
    }

    struct Fixture {
        entities: Entities,
        caches: Caches,
        events: broadcast::Sender<crate::events::StoreEvent>,
    }
    impl Fixture {
        /// Book 1 with characters 10 and 11 (related by 20), chapter 30 with
        /// scenes 40 and 41; book 2 with character 12, related to 10 by 21.
        fn new() -> Self {
            let (events, _) = broadcast::channel(64);
            let mut fixture = Self { entities: Entities::default(), caches: Caches::default(), events };
            let mut txn = fixture.txn();
            for id in [1, 2] {
                txn.upsert(NewBook::new(format!("Book {id}")).into_book(BookId(id), OffsetDateTime::UNIX_EPOCH));
            }
            txn.upsert(NewCharacter::new(BookId(1), "Paul").into_character(CharacterId(10), 0));
            txn.upsert(NewCharacter::new(BookId(1), "Chani").into_character(CharacterId(11), 1));
            txn.upsert(NewCharacter::new(BookId(2), "Leto").into_character(CharacterId(12), 0));
            txn.upsert(
                NewRelationship::new(CharacterId(10), CharacterId(11), RelationshipKind::Partner)
                    .into_relationship(RelationshipId(20)),
            );
            txn.upsert(
                NewRelationship::new(CharacterId(12), CharacterId(10), RelationshipKind::Parent)
                    .into_relationship(RelationshipId(21)),
            );
            txn.upsert(NewChapter::new(BookId(1), "One").into_chapter(ChapterId(30), 0));
            txn.upsert(NewScene::new(ChapterId(30), "A").into_scene(SceneId(40), BookId(1), 0));
            txn.upsert(NewScene::new(ChapterId(30), "B").into_scene(SceneId(41), BookId(1), 1));
            txn.set(Scope::Books, vec![1, 2]);
            txn.set(Scope::SeriesLayout(SeriesId(5)), vec![2, 1]);
            txn.set(Scope::Characters(BookId(1)), vec![10, 11]);
            txn.set(Scope::Characters(BookId(2)), vec![12]);
            txn.set(Scope::Relationships(CharacterId(10)), vec![20, 21]);
            txn.set(Scope::Relationships(CharacterId(12)), vec![21]);
            txn.set(Scope::Chapters(BookId(1)), vec![30]);
            txn.set(Scope::Scenes(ChapterId(30)), vec![40, 41]);
            txn.finish();
            fixture
        }

        fn txn(&mut self) -> Txn<'_> {
            Txn::new(&mut self.entities, &mut self.caches, &self.events)
        }
    }

    #[test]
    fn test_delete_book() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        delete_book(&mut txn, BookId(1));
        assert!(!owns_anything(&txn, BookId(1)));
        // The relationship from book 2's character went with Paul.
        assert!(txn.entities().get::<Relationship>(RelationshipId(21)).is_none());
        txn.finish();

        let caches = &fixture.caches;
        assert_eq!(caches.get(Scope::Books), Some(&[2][..]));
        assert_eq!(caches.get(Scope::SeriesLayout(SeriesId(5))), Some(&[2][..]));
        assert_eq!(caches.get(Scope::Relationships(CharacterId(12))), Some(&[][..]));
        assert!(!caches.contains(Scope::Characters(BookId(1))));
        assert!(!caches.contains(Scope::Chapters(BookId(1))));
        assert!(!caches.contains(Scope::Scenes(ChapterId(30))));
        assert!(caches.contains(Scope::Characters(BookId(2))));
    }

    #[test]
    fn test_delete_character_scoped_to_book() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        delete_character(&mut txn, CharacterId(10), CharacterInvalidation::Book);
        assert!(txn.entities().get::<Character>(CharacterId(10)).is_none());
        assert_eq!(txn.entities().get_all::<Relationship>().count(), 0);
        txn.finish();
        assert!(!fixture.caches.contains(Scope::Characters(BookId(1))));
        assert!(fixture.caches.contains(Scope::Characters(BookId(2))));
        assert!(!fixture.caches.contains(Scope::Relationships(CharacterId(10))));
    }

    #[test]
    fn test_delete_character_everywhere() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        delete_character(&mut txn, CharacterId(11), CharacterInvalidation::All);
        txn.finish();
        assert!(!fixture.caches.contains(Scope::Characters(BookId(1))));
        assert!(!fixture.caches.contains(Scope::Characters(BookId(2))));
        assert_eq!(fixture.caches.get(Scope::Relationships(CharacterId(10))), Some(&[21][..]));
    }

    #[test]
    fn test_delete_chapter_takes_scenes() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        delete_chapter(&mut txn, ChapterId(30));
        assert_eq!(txn.entities().get_all::<Scene>().count(), 0);
        txn.finish();
        assert_eq!(fixture.caches.get(Scope::Chapters(BookId(1))), Some(&[][..]));
        assert!(!fixture.caches.contains(Scope::Scenes(ChapterId(30))));
    }

    #[test]
    fn test_unlink_book() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        unlink_book(&mut txn, BookId(2), SeriesId(5));
        unlink_book(&mut txn, BookId(2), SeriesId(6));
        txn.finish();
        assert_eq!(fixture.caches.get(Scope::SeriesLayout(SeriesId(5))), Some(&[1][..]));
        assert!(!fixture.caches.contains(Scope::SeriesLayout(SeriesId(6))));
        // The book itself stays.
        assert!(fixture.entities.get::<Book>(BookId(2)).is_some());
    }

    #[test]
    fn test_updated_character_changing_book() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        let mut leto = txn.entities().get::<Character>(CharacterId(12)).cloned().unwrap();
        leto.book_id = BookId(1);
        updated_character(&mut txn, &leto, true);
        txn.finish();
        assert!(!fixture.caches.contains(Scope::Characters(BookId(1))));
        assert!(!fixture.caches.contains(Scope::Characters(BookId(2))));
        assert_eq!(fixture.entities.get::<Character>(CharacterId(12)).unwrap().book_id, BookId(1));
    }

    #[test]
    fn test_moved_scene() {
        let mut fixture = Fixture::new();
        let mut txn = fixture.txn();
        txn.set(Scope::Scenes(ChapterId(31)), vec![]);
        let mut scene = txn.entities().get::<Scene>(SceneId(40)).cloned().unwrap();
        scene.chapter_id = ChapterId(31);
        moved_scene(&mut txn, &scene);
        txn.finish();
        assert!(!fixture.caches.contains(Scope::Scenes(ChapterId(30))));
        assert!(!fixture.caches.contains(Scope::Scenes(ChapterId(31))));
        assert_eq!(fixture.entities.get::<Scene>(SceneId(40)).unwrap().chapter_id, ChapterId(31));
    }

    #[test]
    fn test_owns_anything_before_delete() {
        let mut fixture = Fixture::new();
        let txn = fixture.txn();
        assert!(owns_anything(&txn, BookId(1)));
        assert_eq!(txn.entities().get::<Book>(BookId(1)).map(|b| b.entity_ref().id), Some(1));
    }
}
