use std::sync::Arc;

use crate::{
    dto::{PresenceResponse, UpdatePresenceRequest},
    feed::{PresenceChange, PresenceEvent, PresenceFeed},
    repository::Repository,
    service::ServiceError,
};

pub struct PresenceService {
    repo: Arc<tokio::sync::Mutex<Repository>>,
    feed: PresenceFeed,
}

impl PresenceService {
    pub const fn new(repo: Arc<tokio::sync::Mutex<Repository>>, feed: PresenceFeed) -> Self {
        Self { repo, feed }
    }

    pub const fn feed(&self) -> &PresenceFeed {
        &self.feed
    }

    /// Records where a collaborator currently is inside a note. One row per
    /// (note, user); repeated calls refresh it.
    pub async fn update(
        &self,
        request: UpdatePresenceRequest,
    ) -> Result<Option<PresenceResponse>, ServiceError> {
        let repo = self.repo.lock().await;
        if repo.get_note(request.note_id).await?.is_none() {
            return Ok(None);
        }

        let presence = repo
            .upsert_presence(
                request.note_id,
                &request.user_id,
                request.cursor,
                request.selection_start,
                request.selection_end,
            )
            .await?;
        let user_name = repo
            .get_profile(&presence.user_id)
            .await?
            .and_then(|profile| profile.display_name);
        drop(repo);

        let response = PresenceResponse::from((presence, user_name));
        self.feed.publish(PresenceEvent {
            note_id: response.note_id,
            change: PresenceChange::Updated(response.clone()),
        });

        Ok(Some(response))
    }

    /// Everyone currently inside the note, freshest first.
    pub async fn list(&self, note_id: i64) -> Result<Vec<PresenceResponse>, ServiceError> {
        let rows = self.repo.lock().await.list_presence(note_id).await?;
        Ok(rows.into_iter().map(PresenceResponse::from).collect())
    }

    pub async fn leave(&self, note_id: i64, user_id: &str) -> Result<bool, ServiceError> {
        let cleared = self
            .repo
            .lock()
            .await
            .clear_presence(note_id, user_id)
            .await?;

        if cleared {
            self.feed.publish(PresenceEvent {
                note_id,
                change: PresenceChange::Left {
                    user_id: user_id.to_string(),
                },
            });
        }

        Ok(cleared)
    }
}
