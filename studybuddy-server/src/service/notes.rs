use std::sync::Arc;

use crate::{
    dto::{
        CreateNoteRequest, NoteResponse, NoteVersionResponse, SearchQuery, ShareRequest,
        ShareResponse, SharedNoteResponse, SortKey, UpdateNoteRequest,
    },
    feed::{NoteChange, NoteEvent, NoteFeed},
    models::{NewNote, Note, NoteFilter, NoteOrder},
    repository::Repository,
    service::ServiceError,
};

pub struct NoteService {
    repo: Arc<tokio::sync::Mutex<Repository>>,
    feed: NoteFeed,
}

impl NoteService {
    pub const fn new(repo: Arc<tokio::sync::Mutex<Repository>>, feed: NoteFeed) -> Self {
        Self { repo, feed }
    }

    pub const fn feed(&self) -> &NoteFeed {
        &self.feed
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<NoteResponse>, ServiceError> {
        let notes = self.repo.lock().await.list_notes(user_id).await?;
        Ok(notes.into_iter().map(NoteResponse::from).collect())
    }

    /// Inserts the note and writes its initial version snapshot.
    pub async fn create(&self, request: CreateNoteRequest) -> Result<NoteResponse, ServiceError> {
        if request.title.trim().is_empty() {
            return Err(ServiceError::Validation(
                "note title must not be empty".to_string(),
            ));
        }

        let new = NewNote {
            user_id: request.user_id,
            title: request.title,
            content: request.content,
            category: request.category,
            tags: request.tags,
            color: request.color,
        };

        let repo = self.repo.lock().await;
        let note = repo.create_note(&new).await?;
        repo.insert_version(note.id, &note.user_id, &note.title, &note.content)
            .await?;
        drop(repo);

        let response = NoteResponse::from(note);
        self.feed.publish(NoteEvent {
            user_id: response.user_id.clone(),
            change: NoteChange::Inserted(response.clone()),
        });

        Ok(response)
    }

    /// Partial update. The pre-update state is snapshotted into the version
    /// history before the new values are applied.
    pub async fn update(
        &self,
        id: i64,
        request: UpdateNoteRequest,
    ) -> Result<Option<NoteResponse>, ServiceError> {
        if request.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::Validation(
                "note title must not be empty".to_string(),
            ));
        }

        let repo = self.repo.lock().await;
        let Some(current) = repo.get_note(id).await? else {
            return Ok(None);
        };

        repo.insert_version(current.id, &current.user_id, &current.title, &current.content)
            .await?;

        let merged = Note {
            title: request.title.unwrap_or(current.title),
            content: request.content.unwrap_or(current.content),
            category: request.category.or(current.category),
            tags: request.tags.or(current.tags),
            color: request.color.or(current.color),
            grade: request.grade.or(current.grade),
            feedback: request.feedback.or(current.feedback),
            ..current
        };

        let updated = repo.update_note(&merged).await?;
        drop(repo);

        Ok(updated.map(|note| {
            let response = NoteResponse::from(note);
            self.feed.publish(NoteEvent {
                user_id: response.user_id.clone(),
                change: NoteChange::Updated(response.clone()),
            });
            response
        }))
    }

    pub async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let repo = self.repo.lock().await;
        let Some(note) = repo.get_note(id).await? else {
            return Ok(false);
        };

        let deleted = repo.delete_note(id).await?;
        drop(repo);

        if deleted {
            self.feed.publish(NoteEvent {
                user_id: note.user_id,
                change: NoteChange::Deleted { id },
            });
        }

        Ok(deleted)
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<NoteResponse>, ServiceError> {
        let filter = NoteFilter {
            text: query.q.clone().filter(|q| !q.trim().is_empty()),
            category: query.category.clone().filter(|c| !c.is_empty()),
            tags: query
                .tags
                .as_deref()
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            from: query.from,
            to: query.to,
            order: match query.sort {
                SortKey::Updated => NoteOrder::UpdatedDesc,
                SortKey::Created => NoteOrder::CreatedDesc,
                SortKey::Title => NoteOrder::TitleAsc,
            },
        };

        let notes = self
            .repo
            .lock()
            .await
            .search_notes(&query.user_id, &filter)
            .await?;

        Ok(notes.into_iter().map(NoteResponse::from).collect())
    }

    pub async fn versions(&self, note_id: i64) -> Result<Vec<NoteVersionResponse>, ServiceError> {
        let versions = self.repo.lock().await.list_versions(note_id).await?;
        Ok(versions.into_iter().map(NoteVersionResponse::from).collect())
    }

    pub async fn categories(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        Ok(self.repo.lock().await.list_categories(user_id).await?)
    }

    /// Grants a role over an existing note. Duplicate grants and self-shares
    /// are stored as-is; recipients simply see the note once per grant.
    pub async fn share(&self, request: &ShareRequest) -> Result<Option<ShareResponse>, ServiceError> {
        let repo = self.repo.lock().await;
        if repo.get_note(request.note_id).await?.is_none() {
            return Ok(None);
        }

        let share = repo
            .create_share(
                request.note_id,
                &request.owner_id,
                &request.shared_with_id,
                request.role.as_str(),
            )
            .await?;

        Ok(Some(ShareResponse::from(share)))
    }

    pub async fn shared_with(
        &self,
        user_id: &str,
    ) -> Result<Vec<SharedNoteResponse>, ServiceError> {
        let shares = self.repo.lock().await.list_shares_for(user_id).await?;

        Ok(shares
            .into_iter()
            .map(|(share, note)| SharedNoteResponse {
                id: share.id,
                note_id: share.note_id,
                shared_with_id: share.shared_with_id,
                role: share.role,
                note: NoteResponse::from(note),
            })
            .collect())
    }
}
