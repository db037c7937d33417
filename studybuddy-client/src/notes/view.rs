use std::collections::VecDeque;
use std::sync::Arc;

use crate::{
    error::ClientError,
    notes::{FeedEvent, Note, NoteChanges, NoteDraft, NoteQuery, NoteStore, NoteVersion, SharedNote},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient toast for the UI; drained by the render loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Owns the in-memory note list for one user and keeps it consistent
/// across three independent inputs: direct call results, optimistic edits
/// and change-feed events. Merging is keyed by note id and idempotent, so
/// a feed event for one's own mutation may arrive before or after the
/// direct response without corrupting the list.
pub struct NotesView {
    store: Arc<dyn NoteStore>,
    user_id: String,
    notes: Vec<Note>,
    shared: Vec<SharedNote>,
    query: NoteQuery,
    search_results: Option<Vec<Note>>,
    notices: VecDeque<Notice>,
}

impl NotesView {
    pub fn new(store: Arc<dyn NoteStore>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            notes: Vec::new(),
            shared: Vec::new(),
            query: NoteQuery::default(),
            search_results: None,
            notices: VecDeque::new(),
        }
    }

    /// The list the UI renders: search results while any filter is active,
    /// the base list otherwise.
    pub fn displayed(&self) -> &[Note] {
        self.search_results.as_deref().unwrap_or(&self.notes)
    }

    pub fn shared_notes(&self) -> &[SharedNote] {
        &self.shared
    }

    pub const fn in_search_mode(&self) -> bool {
        self.search_results.is_some()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Full fetch of own and shared notes; the two requests run in parallel.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let (notes, shared) = tokio::join!(
            self.store.list(&self.user_id),
            self.store.shared_with(&self.user_id)
        );

        match (notes, shared) {
            (Ok(notes), Ok(shared)) => {
                self.notes = notes;
                self.resort();
                self.shared = shared;
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                self.push_notice(
                    NoticeKind::Error,
                    "Kunne ikke hente dine noter. Prøv venligst igen senere.",
                );
                Err(e)
            }
        }
    }

    /// Create has no optimistic phase: the canonical row is merged in only
    /// after the server confirms it.
    pub async fn submit_create(&mut self, draft: NoteDraft) -> Result<i64, ClientError> {
        if draft.title.trim().is_empty() {
            return Err(ClientError::Validation("Titlen må ikke være tom.".to_string()));
        }

        match self.store.create(&self.user_id, &draft).await {
            Ok(note) => {
                let id = note.id;
                self.upsert(note);
                self.push_notice(NoticeKind::Success, "Noten blev oprettet!");
                Ok(id)
            }
            Err(e) => {
                self.push_notice(NoticeKind::Error, format!("Fejl: {e}"));
                Err(e)
            }
        }
    }

    /// Optimistic edit: the merged note renders immediately, the server's
    /// canonical row replaces it on success, and on failure the whole list
    /// rolls back to its pre-edit state. An `Err` tells the caller to keep
    /// the edit form open.
    pub async fn submit_edit(
        &mut self,
        note_id: i64,
        changes: NoteChanges,
    ) -> Result<(), ClientError> {
        self.edit_inner(note_id, changes).await?;
        self.push_notice(NoticeKind::Success, "Noten blev opdateret!");
        Ok(())
    }

    /// Overwrites title and content from an older version. The server
    /// snapshots the pre-restore state first, so the restore itself stays
    /// in the history.
    pub async fn restore_version(
        &mut self,
        note_id: i64,
        version: &NoteVersion,
    ) -> Result<(), ClientError> {
        let changes = NoteChanges {
            title: Some(version.title.clone()),
            content: Some(version.content.clone()),
            ..Default::default()
        };
        self.edit_inner(note_id, changes).await?;
        self.push_notice(NoticeKind::Success, "Version gendannet!");
        Ok(())
    }

    async fn edit_inner(&mut self, note_id: i64, changes: NoteChanges) -> Result<(), ClientError> {
        if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ClientError::Validation("Titlen må ikke være tom.".to_string()));
        }

        let Some(index) = self.notes.iter().position(|note| note.id == note_id) else {
            return Err(ClientError::NotFound("note".to_string()));
        };

        let snapshot = self.notes.clone();

        // Optimistic render
        changes.apply(&mut self.notes[index]);

        match self.store.update(note_id, &changes).await {
            Ok(saved) => {
                self.upsert(saved);
                Ok(())
            }
            Err(e) => {
                // Rollback on error
                self.notes = snapshot;
                self.push_notice(NoticeKind::Error, format!("Fejl: {e}"));
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, note_id: i64) -> Result<(), ClientError> {
        match self.store.delete(note_id).await {
            Ok(()) => {
                self.notes.retain(|note| note.id != note_id);
                self.push_notice(NoticeKind::Success, "Note slettet!");
                Ok(())
            }
            Err(e) => {
                self.push_notice(NoticeKind::Error, format!("Fejl: {e}"));
                Err(e)
            }
        }
    }

    /// Change-feed reconciliation. Safe to re-apply: inserts are keyed by
    /// id, updates replace in place, deletes are no-ops once gone.
    pub fn apply_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Insert(note) => {
                if !self.notes.iter().any(|existing| existing.id == note.id) {
                    self.notes.insert(0, note);
                    self.resort();
                }
            }
            FeedEvent::Update(note) => {
                if let Some(existing) = self
                    .notes
                    .iter_mut()
                    .find(|existing| existing.id == note.id)
                {
                    *existing = note;
                    self.resort();
                }
            }
            FeedEvent::Delete { id } => {
                self.notes.retain(|note| note.id != id);
            }
        }
    }

    /// Switches to server-side search results when any filter is active;
    /// an empty query reverts to the base list.
    pub async fn set_query(&mut self, query: NoteQuery) -> Result<(), ClientError> {
        if query.is_empty() {
            self.query = query;
            self.search_results = None;
            return Ok(());
        }

        match self.store.search(&self.user_id, &query).await {
            Ok(results) => {
                self.query = query;
                self.search_results = Some(results);
                Ok(())
            }
            Err(e) => {
                self.push_notice(NoticeKind::Error, "Søgning fejlede");
                Err(e)
            }
        }
    }

    pub fn clear_search(&mut self) {
        self.query = NoteQuery::default();
        self.search_results = None;
    }

    pub const fn query(&self) -> &NoteQuery {
        &self.query
    }

    pub async fn versions(&self, note_id: i64) -> Result<Vec<NoteVersion>, ClientError> {
        self.store.versions(note_id).await
    }

    pub async fn share(
        &mut self,
        note_id: i64,
        shared_with_id: &str,
        role: &str,
    ) -> Result<(), ClientError> {
        match self
            .store
            .share(note_id, &self.user_id, shared_with_id, role)
            .await
        {
            Ok(()) => {
                self.push_notice(
                    NoticeKind::Success,
                    format!("Note delt med {shared_with_id}"),
                );
                Ok(())
            }
            Err(e) => {
                self.push_notice(NoticeKind::Error, "Kunne ikke dele noten");
                Err(e)
            }
        }
    }

    /// Idempotent upsert by id: replace the matching entry or prepend.
    fn upsert(&mut self, note: Note) {
        if let Some(existing) = self
            .notes
            .iter_mut()
            .find(|existing| existing.id == note.id)
        {
            *existing = note;
        } else {
            self.notes.insert(0, note);
        }
        self.resort();
    }

    /// Base view order: most recently updated first.
    fn resort(&mut self) {
        self.notes
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    fn push_notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push_back(Notice {
            kind,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use super::*;
    use crate::notes::SortKey;

    #[derive(Default)]
    struct MockStore {
        notes: Mutex<Vec<Note>>,
        next_id: AtomicI64,
        create_calls: AtomicU32,
        fail_update: AtomicBool,
    }

    impl MockStore {
        fn stamp(&self) -> chrono::DateTime<Utc> {
            // Monotonic timestamps so recency ordering is deterministic.
            let tick = self.next_id.load(Ordering::SeqCst);
            Utc::now() + Duration::milliseconds(tick)
        }
    }

    #[async_trait]
    impl NoteStore for MockStore {
        async fn list(&self, user_id: &str) -> Result<Vec<Note>, ClientError> {
            let mut notes: Vec<Note> = self
                .notes
                .lock()
                .unwrap()
                .iter()
                .filter(|note| note.user_id == user_id)
                .cloned()
                .collect();
            notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(notes)
        }

        async fn create(&self, user_id: &str, draft: &NoteDraft) -> Result<Note, ClientError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.stamp();
            let note = Note {
                id,
                user_id: user_id.to_string(),
                title: draft.title.clone(),
                content: draft.content.clone(),
                category: draft.category.clone(),
                tags: draft.tags.clone(),
                color: draft.color.clone(),
                grade: None,
                feedback: None,
                created_at: now,
                updated_at: now,
            };
            self.notes.lock().unwrap().push(note.clone());
            Ok(note)
        }

        async fn update(&self, note_id: i64, changes: &NoteChanges) -> Result<Note, ClientError> {
            if self.fail_update.load(Ordering::SeqCst) {
                return Err(ClientError::Transport(
                    "forbindelsen blev afbrudt".to_string(),
                ));
            }
            let stamp = self.stamp();
            let mut notes = self.notes.lock().unwrap();
            let note = notes
                .iter_mut()
                .find(|note| note.id == note_id)
                .ok_or_else(|| ClientError::NotFound("note".to_string()))?;
            changes.apply(note);
            note.updated_at = stamp;
            Ok(note.clone())
        }

        async fn delete(&self, note_id: i64) -> Result<(), ClientError> {
            self.notes.lock().unwrap().retain(|note| note.id != note_id);
            Ok(())
        }

        async fn search(&self, user_id: &str, query: &NoteQuery) -> Result<Vec<Note>, ClientError> {
            let notes = self
                .notes
                .lock()
                .unwrap()
                .iter()
                .filter(|note| note.user_id == user_id)
                .filter(|note| {
                    query
                        .category
                        .as_ref()
                        .is_none_or(|category| note.category.as_ref() == Some(category))
                })
                .cloned()
                .collect();
            Ok(notes)
        }

        async fn versions(&self, _note_id: i64) -> Result<Vec<NoteVersion>, ClientError> {
            Ok(Vec::new())
        }

        async fn shared_with(&self, _user_id: &str) -> Result<Vec<SharedNote>, ClientError> {
            Ok(Vec::new())
        }

        async fn categories(&self, _user_id: &str) -> Result<Vec<String>, ClientError> {
            Ok(Vec::new())
        }

        async fn share(
            &self,
            _note_id: i64,
            _owner_id: &str,
            _shared_with_id: &str,
            _role: &str,
        ) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn view_over(store: &Arc<MockStore>) -> NotesView {
        NotesView::new(store.clone(), "u1")
    }

    fn draft(title: &str, category: &str, content: &str) -> NoteDraft {
        NoteDraft {
            title: title.to_string(),
            content: content.to_string(),
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn created_note_keeps_its_id_and_lists_first() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        view.submit_create(draft("Fysik", "Fysik", "older"))
            .await
            .expect("create");
        let id = view
            .submit_create(draft("Calc", "Matematik", "x"))
            .await
            .expect("create");

        view.refresh().await.expect("refresh");

        let first = &view.displayed()[0];
        assert_eq!(first.id, id);
        assert_eq!(first.title, "Calc");
        assert_eq!(first.excerpt(), "x");
    }

    #[tokio::test]
    async fn failed_edit_rolls_the_list_back() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        view.submit_create(draft("Calc", "Matematik", "original"))
            .await
            .expect("create");
        view.drain_notices();

        let before = view.displayed().to_vec();
        store.fail_update.store(true, Ordering::SeqCst);

        let changes = NoteChanges {
            content: Some("edited".to_string()),
            ..Default::default()
        };
        let result = view.submit_edit(before[0].id, changes).await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(view.displayed(), before.as_slice());

        let notices = view.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn successful_edit_takes_the_canonical_row() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        let id = view
            .submit_create(draft("Calc", "Matematik", "v1"))
            .await
            .expect("create");

        let changes = NoteChanges {
            content: Some("v2".to_string()),
            ..Default::default()
        };
        view.submit_edit(id, changes).await.expect("edit");

        assert_eq!(view.displayed()[0].content, "v2");
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_any_call() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        let result = view.submit_create(draft("   ", "Matematik", "x")).await;

        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        // Inline form error, not a toast
        assert!(view.drain_notices().is_empty());
    }

    fn feed_note(id: i64, title: &str) -> Note {
        Note {
            id,
            user_id: "u1".to_string(),
            title: title.to_string(),
            content: String::new(),
            category: None,
            tags: None,
            color: None,
            grade: None,
            feedback: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reapplying_a_feed_event_is_a_no_op() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        view.apply_event(FeedEvent::Insert(feed_note(1, "a")));
        view.apply_event(FeedEvent::Insert(feed_note(1, "a")));
        assert_eq!(view.displayed().len(), 1);

        let mut renamed = feed_note(1, "b");
        renamed.updated_at = Utc::now() + Duration::seconds(1);
        view.apply_event(FeedEvent::Update(renamed.clone()));
        let after_first = view.displayed().to_vec();
        view.apply_event(FeedEvent::Update(renamed));
        assert_eq!(view.displayed(), after_first.as_slice());

        view.apply_event(FeedEvent::Delete { id: 1 });
        view.apply_event(FeedEvent::Delete { id: 1 });
        assert!(view.displayed().is_empty());
    }

    #[tokio::test]
    async fn own_create_racing_its_feed_event_leaves_one_copy() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        // The feed can deliver our own insert before the direct response
        // lands; ids from the mock start at 1.
        view.apply_event(FeedEvent::Insert(feed_note(1, "Calc")));
        view.submit_create(draft("Calc", "Matematik", "x"))
            .await
            .expect("create");

        assert_eq!(view.displayed().len(), 1);
    }

    #[tokio::test]
    async fn update_event_for_an_unknown_id_is_ignored() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        view.apply_event(FeedEvent::Update(feed_note(99, "ghost")));
        assert!(view.displayed().is_empty());
    }

    #[tokio::test]
    async fn search_mode_switches_the_displayed_set_and_reverts() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        view.submit_create(draft("Calc", "Matematik", "x"))
            .await
            .expect("create");
        view.submit_create(draft("WW2", "Historie", "y"))
            .await
            .expect("create");

        let query = NoteQuery {
            category: Some("Historie".to_string()),
            sort: SortKey::Title,
            ..Default::default()
        };
        view.set_query(query).await.expect("search");

        assert!(view.in_search_mode());
        assert_eq!(view.displayed().len(), 1);
        assert_eq!(view.displayed()[0].title, "WW2");

        view.set_query(NoteQuery::default()).await.expect("clear");
        assert!(!view.in_search_mode());
        assert_eq!(view.displayed().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_the_note_locally() {
        let store = Arc::new(MockStore::default());
        let mut view = view_over(&store);

        let id = view
            .submit_create(draft("Calc", "Matematik", "x"))
            .await
            .expect("create");
        view.delete(id).await.expect("delete");

        assert!(view.displayed().is_empty());
    }
}
