use crate::cascade;
use crate::coordinator::Strategy;
use crate::error::{Operation, Result};
use crate::library::Library;
use crate::scope::Scope;
use crate::sequence::Key;
use quire_model::{Book, BookId, EntityKind, EntityRef, NewSeries, Series, SeriesChanges, SeriesId};
use quire_remote::error::Result as RemoteResult;
use tracing::instrument;

fn key(id: SeriesId) -> Option<Key> {
    Some(Key::Entity(EntityRef::new(EntityKind::Series, id)))
}

fn layout_key(id: SeriesId) -> Option<Key> {
    Some(Key::Scope(Scope::SeriesLayout(id)))
}

impl Library {
    /// Every series in the library.
    #[instrument(level = "trace", skip(self))]
    pub async fn all_series(&self) -> Result<Vec<Series>> {
        self.fetch(Scope::Series, || self.remote.list_series()).await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn series(&self, id: SeriesId) -> Result<Series> {
        match self.get::<Series>(id).await {
            Some(series) => Ok(series),
            None => self.load(self.remote.get_series(id)).await,
        }
    }

    /// The books of a series, in series order.
    #[instrument(level = "trace", skip(self))]
    pub async fn series_layout(&self, id: SeriesId) -> Result<Vec<Book>> {
        self.fetch(Scope::SeriesLayout(id), || self.load_layout(id)).await
    }

    async fn load_layout(&self, id: SeriesId) -> RemoteResult<Vec<Book>> {
        let mut entries = self.remote.series_books(id).await?;
        // Positions are the service's; never assume they come back sorted.
        entries.sort_by_key(|e| e.position);
        Ok(entries.into_iter().map(|e| e.book).collect())
    }

    #[instrument(skip(self, series), fields(name = %series.name))]
    pub async fn create_series(&self, series: NewSeries) -> Result<Series> {
        let call = self.remote.create_series(series);
        self.mutate(Operation::Create, None, Strategy::ConfirmFirst, call, |txn, series: &Series| {
            txn.upsert(series.clone());
            txn.append(Scope::Series, series.id);
            // A new series has no books yet.
            txn.set(Scope::SeriesLayout(series.id), Vec::new());
        })
        .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_series(&self, id: SeriesId, changes: SeriesChanges) -> Result<Series> {
        let call = self.remote.update_series(id, changes);
        self.mutate(Operation::Update, key(id), Strategy::ConfirmFirst, call, |txn, series: &Series| {
            txn.upsert(series.clone());
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn archive_series(&self, id: SeriesId) -> Result<Series> {
        let call = self.remote.archive_series(id);
        self.mutate(Operation::Archive, key(id), Strategy::ConfirmFirst, call, |txn, series: &Series| {
            txn.upsert(series.clone());
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn unarchive_series(&self, id: SeriesId) -> Result<Series> {
        let call = self.remote.unarchive_series(id);
        self.mutate(Operation::Archive, key(id), Strategy::ConfirmFirst, call, |txn, series: &Series| {
            txn.upsert(series.clone());
        })
        .await
    }

    /// Delete a series. Its books are left alone.
    #[instrument(skip(self))]
    pub async fn delete_series(&self, id: SeriesId) -> Result<()> {
        let cascade = Strategy::optimistic(move |txn| cascade::delete_series(txn, id));
        self.mutate(Operation::Delete, key(id), cascade, self.remote.delete_series(id), |_, _| ()).await
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a book to a series, then reload the series' layout: the service
    /// decides where the book lands when no position is given.
    #[instrument(skip(self))]
    pub async fn add_book_to_series(&self, book: BookId, series: SeriesId, position: Option<u32>) -> Result<Vec<Book>> {
        let call = self.remote.add_book_to_series(book, series, position);
        self.mutate(Operation::Link, layout_key(series), Strategy::ConfirmFirst, call, |_, _| ()).await?;
        self.refresh(Scope::SeriesLayout(series), || self.load_layout(series)).await
    }

    #[instrument(skip(self))]
    pub async fn remove_book_from_series(&self, book: BookId, series: SeriesId) -> Result<()> {
        let unlink = Strategy::optimistic(move |txn| cascade::unlink_book(txn, book, series));
        let call = self.remote.remove_book_from_series(book, series);
        self.mutate(Operation::Unlink, layout_key(series), unlink, call, |_, _| ()).await
    }

    /// Move a book to a 1-indexed position within a series, then reload the
    /// series' layout.
    #[instrument(skip(self))]
    pub async fn update_book_position(&self, book: BookId, series: SeriesId, position: u32) -> Result<Vec<Book>> {
        let call = self.remote.update_book_position(book, series, position);
        self.mutate(Operation::Reorder, layout_key(series), Strategy::ConfirmFirst, call, |_, _| ()).await?;
        self.refresh(Scope::SeriesLayout(series), || self.load_layout(series)).await
    }

    /// Replace the order of a series' books. `books` must list every book of
    /// the series exactly once.
    #[instrument(skip(self))]
    pub async fn reorder_series(&self, series: SeriesId, books: Vec<BookId>) -> Result<()> {
        let call = self.remote.reorder_series(series, books.clone());
        self.reorder(Scope::SeriesLayout(series), books, || self.load_layout(series), call).await
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    pub async fn series_active(&self) -> Result<Vec<Series>> {
        Ok(self.all_series().await?.into_iter().filter(|s| !s.archived).collect())
    }

    /// The series a book belongs to, among the layouts loaded so far.
    pub async fn series_for_book(&self, book: BookId) -> Vec<Series> {
        let state = self.state.read().await;
        state
            .caches
            .entries()
            .iter()
            .filter_map(|(scope, ids)| match scope {
                Scope::SeriesLayout(series) if ids.contains(&book.get()) => Some(*series),
                _ => None,
            })
            .filter_map(|series| state.entities.get::<Series>(series).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::scope::Scope;
    use crate::testing::{library, library_with_remote};
    use quire_model::{Book, BookId, NewBook, NewSeries, Series};
    use quire_remote::RemoteService;
    use quire_remote::service::{Failure, InsertPolicy, MockRemote};

    fn ids(books: &[Book]) -> Vec<BookId> {
        books.iter().map(|b| b.id).collect()
    }

    async fn trilogy(remote: &MockRemote) -> (Series, Vec<BookId>) {
        let series = remote.create_series(NewSeries::new("Dune Chronicles")).await.unwrap();
        let mut books = Vec::new();
        for name in ["Dune", "Dune Messiah", "Children of Dune"] {
            let book = remote.create_book(NewBook::new(name)).await.unwrap();
            remote.add_book_to_series(book.id, series.id, None).await.unwrap();
            books.push(book.id);
        }
        (series, books)
    }

    #[tokio::test]
    async fn test_failed_reorder_keeps_layout() {
        let (remote, library) = library();
        let (series, books) = trilogy(&remote).await;
        let (b1, b2, b3) = (books[0], books[1], books[2]);
        assert_eq!(ids(&library.series_layout(series.id).await.unwrap()), vec![b1, b2, b3]);
        let before = library.snapshot().await;

        remote.fail_next("reorder_series", Failure::rejected("series is locked")).await;
        let err = library.reorder_series(series.id, vec![b3, b1, b2]).await.unwrap_err();
        assert_eq!(err.message(), "series is locked");
        assert_eq!(ids(&library.series_layout(series.id).await.unwrap()), vec![b1, b2, b3]);
        assert_eq!(library.snapshot().await, before);
        assert_eq!(remote.membership(series.id).await, vec![b1, b2, b3]);
    }

    #[tokio::test]
    async fn test_reorder_is_trusted_on_success() {
        let (remote, library) = library();
        let (series, books) = trilogy(&remote).await;
        let order = vec![books[2], books[0], books[1]];
        library.reorder_series(series.id, order.clone()).await.unwrap();
        assert_eq!(ids(&library.series_layout(series.id).await.unwrap()), order);
        assert_eq!(remote.membership(series.id).await, order);
        // No read back after a successful reorder.
        assert_eq!(remote.calls("series_books").await, 1);
    }

    #[tokio::test]
    async fn test_reorder_rejects_non_permutation() {
        let (remote, library) = library();
        let (series, books) = trilogy(&remote).await;
        library.series_layout(series.id).await.unwrap();
        let before = library.snapshot().await;
        let err = library.reorder_series(series.id, vec![books[0], books[1]]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidOrder(_)));
        assert_eq!(library.snapshot().await, before);
        assert_eq!(remote.calls("reorder_series").await, 0);
        assert!(library.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_add_book_follows_server_position() {
        let (remote, library) = library_with_remote(MockRemote::default().with_insert_policy(InsertPolicy::Front));
        let series = remote.create_series(NewSeries::new("Favourites")).await.unwrap();
        let b1 = remote.create_book(NewBook::new("Dune")).await.unwrap();
        let b4 = remote.create_book(NewBook::new("Emma")).await.unwrap();
        remote.add_book_to_series(b1.id, series.id, None).await.unwrap();
        assert_eq!(ids(&library.series_layout(series.id).await.unwrap()), vec![b1.id]);

        let layout = library.add_book_to_series(b4.id, series.id, None).await.unwrap();
        assert_eq!(ids(&layout), vec![b4.id, b1.id]);
        assert_eq!(ids(&library.cached::<Book>(Scope::SeriesLayout(series.id)).await.unwrap()), vec![b4.id, b1.id]);
        assert_eq!(remote.calls("series_books").await, 2);
    }

    #[tokio::test]
    async fn test_update_book_position_refetches() {
        let (remote, library) = library();
        let (series, books) = trilogy(&remote).await;
        library.series_layout(series.id).await.unwrap();
        let layout = library.update_book_position(books[0], series.id, 3).await.unwrap();
        assert_eq!(ids(&layout), vec![books[1], books[2], books[0]]);
    }

    #[tokio::test]
    async fn test_remove_book_from_series() {
        let (remote, library) = library();
        let (series, books) = trilogy(&remote).await;
        library.series_layout(series.id).await.unwrap();
        library.remove_book_from_series(books[1], series.id).await.unwrap();
        assert_eq!(ids(&library.series_layout(series.id).await.unwrap()), vec![books[0], books[2]]);
        // The book itself is still in the library.
        assert!(library.get::<Book>(books[1]).await.is_some());

        remote.fail_next("remove_book_from_series", Failure::transport("gone")).await;
        assert!(library.remove_book_from_series(books[0], series.id).await.is_err());
        assert_eq!(ids(&library.series_layout(series.id).await.unwrap()), vec![books[0], books[2]]);
    }

    #[tokio::test]
    async fn test_delete_series() {
        let (remote, library) = library();
        let (series, books) = trilogy(&remote).await;
        library.all_series().await.unwrap();
        library.series_layout(series.id).await.unwrap();
        assert_eq!(library.series_for_book(books[0]).await, vec![series.clone()]);

        library.delete_series(series.id).await.unwrap();
        assert!(library.all_series().await.unwrap().is_empty());
        assert!(!library.is_cached(Scope::SeriesLayout(series.id)).await);
        assert!(library.series_for_book(books[0]).await.is_empty());
        assert_eq!(library.get_all::<Book>().await.len(), 3);
    }

    #[tokio::test]
    async fn test_create_and_archive_series() {
        let (_remote, library) = library();
        library.all_series().await.unwrap();
        let series = library.create_series(NewSeries::new("Standalones")).await.unwrap();
        assert!(library.series_layout(series.id).await.unwrap().is_empty());
        library.archive_series(series.id).await.unwrap();
        assert!(library.series_active().await.unwrap().is_empty());
        library.unarchive_series(series.id).await.unwrap();
        assert_eq!(library.series_active().await.unwrap().len(), 1);
        assert_eq!(library.series(series.id).await.unwrap().name, "Standalones");
    }
}
