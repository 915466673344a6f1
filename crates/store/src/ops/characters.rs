use crate::cascade;
use crate::coordinator::Strategy;
use crate::error::{Operation, Result};
use crate::library::Library;
use crate::scope::Scope;
use crate::sequence::Key;
use quire_model::{
    BookId, Character, CharacterChanges, CharacterId, EntityKind, EntityRef, NewCharacter, NewRelationship,
    Relationship, RelationshipChanges, RelationshipId, RelationshipKind, Role,
};
use std::collections::BTreeMap;
use tracing::instrument;

fn key(id: CharacterId) -> Option<Key> {
    Some(Key::Entity(EntityRef::new(EntityKind::Character, id)))
}

fn relationship_key(id: RelationshipId) -> Option<Key> {
    Some(Key::Entity(EntityRef::new(EntityKind::Relationship, id)))
}

/// A relationship as seen from one of the two characters in it.
///
/// Each relationship is stored once. Seen from the related character, a
/// symmetric kind reads the same, and a directed kind reads as its inverse
/// (a parent's child sees a parent). Kinds without an inverse read as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipView {
    pub relationship: Relationship,
    /// The character on the other end.
    pub other: CharacterId,
    /// What the other character is to the viewing one.
    pub kind: RelationshipKind,
    /// Whether the view was derived from a record owned by the other character.
    pub derived: bool,
}

impl Library {
    /// The characters of a book, in cast order.
    #[instrument(level = "trace", skip(self))]
    pub async fn characters(&self, book: BookId) -> Result<Vec<Character>> {
        self.fetch(Scope::Characters(book), || self.remote.characters_for_book(book)).await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn character(&self, id: CharacterId) -> Result<Character> {
        match self.get::<Character>(id).await {
            Some(character) => Ok(character),
            None => self.load(self.remote.get_character(id)).await,
        }
    }

    #[instrument(skip(self, character), fields(book = %character.book_id))]
    pub async fn create_character(&self, character: NewCharacter) -> Result<Character> {
        let call = self.remote.create_character(character);
        self.mutate(Operation::Create, None, Strategy::ConfirmFirst, call, |txn, character: &Character| {
            txn.upsert(character.clone());
            txn.append(Scope::Characters(character.book_id), character.id);
        })
        .await
    }

    /// Update a character. Moving it to another book drops both books'
    /// character lists.
    #[instrument(skip(self, changes))]
    pub async fn update_character(&self, id: CharacterId, changes: CharacterChanges) -> Result<Character> {
        let moved = changes.book_id.is_some();
        let call = self.remote.update_character(id, changes);
        self.mutate(Operation::Update, key(id), Strategy::ConfirmFirst, call, |txn, character: &Character| {
            cascade::updated_character(txn, character, moved);
        })
        .await
    }

    /// Delete a character and every relationship it takes part in.
    #[instrument(skip(self))]
    pub async fn delete_character(&self, id: CharacterId) -> Result<()> {
        let scope = self.config.character_invalidation;
        let cascade = Strategy::optimistic(move |txn| cascade::delete_character(txn, id, scope));
        self.mutate(Operation::Delete, key(id), cascade, self.remote.delete_character(id), |_, _| ()).await
    }

    #[instrument(skip(self))]
    pub async fn reorder_characters(&self, book: BookId, characters: Vec<CharacterId>) -> Result<()> {
        let call = self.remote.reorder_characters(book, characters.clone());
        self.reorder(Scope::Characters(book), characters, || self.remote.characters_for_book(book), call).await
    }

    /// A book's characters grouped by role, each group in cast order.
    /// Roles without characters are left out.
    pub async fn characters_by_role(&self, book: BookId) -> Result<BTreeMap<Role, Vec<Character>>> {
        let mut groups: BTreeMap<Role, Vec<Character>> = BTreeMap::new();
        for character in self.characters(book).await? {
            groups.entry(character.role).or_default().push(character);
        }
        Ok(groups)
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    /// The relationships a character takes part in, at either end.
    #[instrument(level = "trace", skip(self))]
    pub async fn relationships(&self, character: CharacterId) -> Result<Vec<Relationship>> {
        self.fetch(Scope::Relationships(character), || self.remote.relationships(character)).await
    }

    /// A character's relationships, each seen from that character.
    pub async fn relationships_for(&self, character: CharacterId) -> Result<Vec<RelationshipView>> {
        let views = self.relationships(character).await?.into_iter().filter_map(|relationship| {
            if relationship.character_id == character {
                let (other, kind) = (relationship.related_character_id, relationship.kind);
                Some(RelationshipView { relationship, other, kind, derived: false })
            } else if relationship.related_character_id == character {
                let (other, kind) = (relationship.character_id, relationship.kind);
                let kind = kind.inverse().unwrap_or(kind);
                Some(RelationshipView { relationship, other, kind, derived: true })
            } else {
                None
            }
        });
        Ok(views.collect())
    }

    #[instrument(skip(self, relationship), fields(kind = %relationship.kind))]
    pub async fn add_relationship(&self, relationship: NewRelationship) -> Result<Relationship> {
        let call = self.remote.add_relationship(relationship);
        self.mutate(Operation::Link, None, Strategy::ConfirmFirst, call, |txn, relationship: &Relationship| {
            txn.upsert(relationship.clone());
            txn.append(Scope::Relationships(relationship.character_id), relationship.id);
            txn.append(Scope::Relationships(relationship.related_character_id), relationship.id);
        })
        .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_relationship(&self, id: RelationshipId, changes: RelationshipChanges) -> Result<Relationship> {
        let call = self.remote.update_relationship(id, changes);
        self.mutate(Operation::Update, relationship_key(id), Strategy::ConfirmFirst, call, |txn, r: &Relationship| {
            txn.upsert(r.clone());
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_relationship(&self, id: RelationshipId) -> Result<()> {
        let unlink = Strategy::optimistic(move |txn| cascade::delete_relationship(txn, id));
        let call = self.remote.remove_relationship(id);
        self.mutate(Operation::Unlink, relationship_key(id), unlink, call, |_, _| ()).await
    }
}
