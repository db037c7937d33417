use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::{
    error::ClientError,
    notes::{Note, NoteChanges, NoteDraft, NoteQuery, NoteVersion, SharedNote},
    session::{Session, expect_json, expect_ok},
};

/// Translation layer between application intents and the data service.
/// The HTTP implementation talks to studybuddy-server; tests swap in an
/// in-memory double.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Notes owned by the user, most recently updated first.
    async fn list(&self, user_id: &str) -> Result<Vec<Note>, ClientError>;

    /// Inserts the note and returns the canonical row. Also bumps the
    /// notes-created counter; that side effect is non-critical and its
    /// failure never surfaces.
    async fn create(&self, user_id: &str, draft: &NoteDraft) -> Result<Note, ClientError>;

    /// Partial update; returns the canonical row.
    async fn update(&self, note_id: i64, changes: &NoteChanges) -> Result<Note, ClientError>;

    async fn delete(&self, note_id: i64) -> Result<(), ClientError>;

    /// Server-side filtered query; ordering follows the query's sort key.
    async fn search(&self, user_id: &str, query: &NoteQuery) -> Result<Vec<Note>, ClientError>;

    /// Version history for one note, newest first.
    async fn versions(&self, note_id: i64) -> Result<Vec<NoteVersion>, ClientError>;

    /// Notes other users shared with this one.
    async fn shared_with(&self, user_id: &str) -> Result<Vec<SharedNote>, ClientError>;

    /// Distinct categories across the user's notes.
    async fn categories(&self, user_id: &str) -> Result<Vec<String>, ClientError>;

    /// Grants another user access to a note.
    async fn share(
        &self,
        note_id: i64,
        owner_id: &str,
        shared_with_id: &str,
        role: &str,
    ) -> Result<(), ClientError>;
}

#[derive(Serialize)]
struct CreateBody<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    draft: &'a NoteDraft,
}

pub struct HttpNoteStore {
    session: Session,
}

impl HttpNoteStore {
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl NoteStore for HttpNoteStore {
    async fn list(&self, user_id: &str) -> Result<Vec<Note>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url("/rest/notes"))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        expect_json(response, "notes").await
    }

    async fn create(&self, user_id: &str, draft: &NoteDraft) -> Result<Note, ClientError> {
        let response = self
            .session
            .http()
            .post(self.session.url("/rest/notes"))
            .json(&CreateBody { user_id, draft })
            .send()
            .await?;
        let note: Note = expect_json(response, "note").await?;

        // Non-critical side effect: the progress counter must never fail
        // the create itself.
        let counter = self
            .session
            .http()
            .post(self.session.url("/rest/progress/notes-created"))
            .json(&json!({ "user_id": user_id }))
            .send()
            .await;
        match counter {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    "notes-created counter returned status {}",
                    response.status()
                );
            }
            Err(e) => tracing::warn!("notes-created counter call failed: {e}"),
        }

        Ok(note)
    }

    async fn update(&self, note_id: i64, changes: &NoteChanges) -> Result<Note, ClientError> {
        let response = self
            .session
            .http()
            .put(self.session.url(&format!("/rest/notes/{note_id}")))
            .json(changes)
            .send()
            .await?;
        expect_json(response, "note").await
    }

    async fn delete(&self, note_id: i64) -> Result<(), ClientError> {
        let response = self
            .session
            .http()
            .delete(self.session.url(&format!("/rest/notes/{note_id}")))
            .send()
            .await?;
        expect_ok(response, "note").await
    }

    async fn search(&self, user_id: &str, query: &NoteQuery) -> Result<Vec<Note>, ClientError> {
        let mut params = vec![
            ("user_id".to_string(), user_id.to_string()),
            ("sort".to_string(), query.sort.as_str().to_string()),
        ];
        if let Some(text) = &query.text {
            params.push(("q".to_string(), text.clone()));
        }
        if let Some(category) = &query.category {
            params.push(("category".to_string(), category.clone()));
        }
        if !query.tags.is_empty() {
            params.push(("tags".to_string(), query.tags.join(",")));
        }
        if let Some(from) = query.from {
            params.push(("from".to_string(), from.to_string()));
        }
        if let Some(to) = query.to {
            params.push(("to".to_string(), to.to_string()));
        }

        let response = self
            .session
            .http()
            .get(self.session.url("/rest/notes/search"))
            .query(&params)
            .send()
            .await?;
        expect_json(response, "search").await
    }

    async fn versions(&self, note_id: i64) -> Result<Vec<NoteVersion>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url(&format!("/rest/notes/{note_id}/versions")))
            .send()
            .await?;
        expect_json(response, "versions").await
    }

    async fn shared_with(&self, user_id: &str) -> Result<Vec<SharedNote>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url("/rest/shares"))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        expect_json(response, "shared notes").await
    }

    async fn categories(&self, user_id: &str) -> Result<Vec<String>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url("/rest/categories"))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        expect_json(response, "categories").await
    }

    async fn share(
        &self,
        note_id: i64,
        owner_id: &str,
        shared_with_id: &str,
        role: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .session
            .http()
            .post(self.session.url("/rest/shares"))
            .json(&json!({
                "note_id": note_id,
                "owner_id": owner_id,
                "shared_with_id": shared_with_id,
                "role": role,
            }))
            .send()
            .await?;
        expect_ok(response, "share").await
    }
}
