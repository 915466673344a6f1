use crate::cascade;
use crate::coordinator::Strategy;
use crate::error::{Operation, Result};
use crate::library::Library;
use crate::scope::Scope;
use crate::sequence::Key;
use quire_model::{Book, BookChanges, BookId, EntityKind, EntityRef, NewBook};
use tracing::instrument;

fn key(id: BookId) -> Option<Key> {
    Some(Key::Entity(EntityRef::new(EntityKind::Book, id)))
}

impl Library {
    /// Every book in the library.
    #[instrument(level = "trace", skip(self))]
    pub async fn books(&self) -> Result<Vec<Book>> {
        self.fetch(Scope::Books, || self.remote.list_books()).await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn book(&self, id: BookId) -> Result<Book> {
        match self.get::<Book>(id).await {
            Some(book) => Ok(book),
            None => self.load(self.remote.get_book(id)).await,
        }
    }

    #[instrument(skip(self, book), fields(name = %book.name))]
    pub async fn create_book(&self, book: NewBook) -> Result<Book> {
        let call = self.remote.create_book(book);
        self.mutate(Operation::Create, None, Strategy::ConfirmFirst, call, |txn, book: &Book| {
            txn.upsert(book.clone());
            txn.append(Scope::Books, book.id);
        })
        .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_book(&self, id: BookId, changes: BookChanges) -> Result<Book> {
        let call = self.remote.update_book(id, changes);
        self.mutate(Operation::Update, key(id), Strategy::ConfirmFirst, call, |txn, book: &Book| {
            txn.upsert(book.clone());
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn archive_book(&self, id: BookId) -> Result<Book> {
        let call = self.remote.archive_book(id);
        self.mutate(Operation::Archive, key(id), Strategy::ConfirmFirst, call, |txn, book: &Book| {
            txn.upsert(book.clone());
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn unarchive_book(&self, id: BookId) -> Result<Book> {
        let call = self.remote.unarchive_book(id);
        self.mutate(Operation::Archive, key(id), Strategy::ConfirmFirst, call, |txn, book: &Book| {
            txn.upsert(book.clone());
        })
        .await
    }

    /// Delete a book along with everything it owns, removing it from every
    /// series it was part of.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: BookId) -> Result<()> {
        let cascade = Strategy::optimistic(move |txn| cascade::delete_book(txn, id));
        self.mutate(Operation::Delete, key(id), cascade, self.remote.delete_book(id), |_, _| ()).await
    }

    /// Books not archived, in library order.
    pub async fn books_active(&self) -> Result<Vec<Book>> {
        Ok(self.books().await?.into_iter().filter(|b| !b.archived).collect())
    }

    pub async fn books_archived(&self) -> Result<Vec<Book>> {
        Ok(self.books().await?.into_iter().filter(|b| b.archived).collect())
    }
}
