use crate::cascade;
use crate::coordinator::Strategy;
use crate::error::{Operation, Result};
use crate::library::Library;
use crate::scope::Scope;
use crate::sequence::Key;
use quire_model::{
    BookId, Chapter, ChapterChanges, ChapterId, EntityKind, EntityRef, NewChapter, NewScene, Scene, SceneChanges,
    SceneId,
};
use tracing::instrument;

fn chapter_key(id: ChapterId) -> Option<Key> {
    Some(Key::Entity(EntityRef::new(EntityKind::Chapter, id)))
}

fn scene_key(id: SceneId) -> Option<Key> {
    Some(Key::Entity(EntityRef::new(EntityKind::Scene, id)))
}

impl Library {
    // =========================================================================
    // Chapters
    // =========================================================================

    #[instrument(level = "trace", skip(self))]
    pub async fn chapters(&self, book: BookId) -> Result<Vec<Chapter>> {
        self.fetch(Scope::Chapters(book), || self.remote.chapters_for_book(book)).await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn chapter(&self, id: ChapterId) -> Result<Chapter> {
        match self.get::<Chapter>(id).await {
            Some(chapter) => Ok(chapter),
            None => self.load(self.remote.get_chapter(id)).await,
        }
    }

    #[instrument(skip(self, chapter), fields(book = %chapter.book_id, name = %chapter.name))]
    pub async fn create_chapter(&self, chapter: NewChapter) -> Result<Chapter> {
        let call = self.remote.create_chapter(chapter);
        self.mutate(Operation::Create, None, Strategy::ConfirmFirst, call, |txn, chapter: &Chapter| {
            txn.upsert(chapter.clone());
            txn.append(Scope::Chapters(chapter.book_id), chapter.id);
        })
        .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_chapter(&self, id: ChapterId, changes: ChapterChanges) -> Result<Chapter> {
        let call = self.remote.update_chapter(id, changes);
        self.mutate(Operation::Update, chapter_key(id), Strategy::ConfirmFirst, call, |txn, chapter: &Chapter| {
            txn.upsert(chapter.clone());
        })
        .await
    }

    /// Delete a chapter and its scenes.
    #[instrument(skip(self))]
    pub async fn delete_chapter(&self, id: ChapterId) -> Result<()> {
        let cascade = Strategy::optimistic(move |txn| cascade::delete_chapter(txn, id));
        self.mutate(Operation::Delete, chapter_key(id), cascade, self.remote.delete_chapter(id), |_, _| ()).await
    }

    #[instrument(skip(self))]
    pub async fn reorder_chapters(&self, book: BookId, chapters: Vec<ChapterId>) -> Result<()> {
        let call = self.remote.reorder_chapters(book, chapters.clone());
        self.reorder(Scope::Chapters(book), chapters, || self.remote.chapters_for_book(book), call).await
    }

    // =========================================================================
    // Scenes
    // =========================================================================

    #[instrument(level = "trace", skip(self))]
    pub async fn scenes(&self, chapter: ChapterId) -> Result<Vec<Scene>> {
        self.fetch(Scope::Scenes(chapter), || self.remote.scenes_for_chapter(chapter)).await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn scene(&self, id: SceneId) -> Result<Scene> {
        match self.get::<Scene>(id).await {
            Some(scene) => Ok(scene),
            None => self.load(self.remote.get_scene(id)).await,
        }
    }

    #[instrument(skip(self, scene), fields(chapter = %scene.chapter_id, name = %scene.name))]
    pub async fn create_scene(&self, scene: NewScene) -> Result<Scene> {
        let call = self.remote.create_scene(scene);
        self.mutate(Operation::Create, None, Strategy::ConfirmFirst, call, |txn, scene: &Scene| {
            txn.upsert(scene.clone());
            txn.append(Scope::Scenes(scene.chapter_id), scene.id);
        })
        .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update_scene(&self, id: SceneId, changes: SceneChanges) -> Result<Scene> {
        let call = self.remote.update_scene(id, changes);
        self.mutate(Operation::Update, scene_key(id), Strategy::ConfirmFirst, call, |txn, scene: &Scene| {
            txn.upsert(scene.clone());
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_scene(&self, id: SceneId) -> Result<()> {
        let cascade = Strategy::optimistic(move |txn| cascade::delete_scene(txn, id));
        self.mutate(Operation::Delete, scene_key(id), cascade, self.remote.delete_scene(id), |_, _| ()).await
    }

    #[instrument(skip(self))]
    pub async fn reorder_scenes(&self, chapter: ChapterId, scenes: Vec<SceneId>) -> Result<()> {
        let call = self.remote.reorder_scenes(chapter, scenes.clone());
        self.reorder(Scope::Scenes(chapter), scenes, || self.remote.scenes_for_chapter(chapter), call).await
    }

    /// Move a scene into another chapter, at `position` or at the end.
    ///
    /// Positions shift in both chapters, so both scene lists are dropped and
    /// refetched on next read.
    #[instrument(skip(self))]
    pub async fn move_scene(&self, id: SceneId, chapter: ChapterId, position: Option<u32>) -> Result<Scene> {
        let call = self.remote.move_scene(id, chapter, position);
        self.mutate(Operation::Move, scene_key(id), Strategy::ConfirmFirst, call, |txn, scene: &Scene| {
            cascade::moved_scene(txn, scene);
        })
        .await
    }
}
