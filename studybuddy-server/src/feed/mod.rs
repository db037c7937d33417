use serde_json::json;
use tokio::sync::broadcast;

use crate::dto::{NoteResponse, PresenceResponse};

/// A row-level change on the notes table, published after the write commits.
#[derive(Debug, Clone)]
pub struct NoteEvent {
    /// Owner of the affected row; feed subscriptions are scoped per user.
    pub user_id: String,
    pub change: NoteChange,
}

#[derive(Debug, Clone)]
pub enum NoteChange {
    Inserted(NoteResponse),
    Updated(NoteResponse),
    Deleted { id: i64 },
}

impl NoteChange {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Inserted(_) => "insert",
            Self::Updated(_) => "update",
            Self::Deleted { .. } => "delete",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Inserted(note) | Self::Updated(note) => {
                serde_json::to_value(note).unwrap_or_else(|_| json!({}))
            }
            Self::Deleted { id } => json!({ "id": id }),
        }
    }
}

/// A collaborator moving inside, or leaving, one note's editor.
#[derive(Debug, Clone)]
pub struct PresenceEvent {
    /// Note the presence belongs to; subscriptions are scoped per note.
    pub note_id: i64,
    pub change: PresenceChange,
}

#[derive(Debug, Clone)]
pub enum PresenceChange {
    Updated(PresenceResponse),
    Left { user_id: String },
}

impl PresenceChange {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Updated(_) => "update",
            Self::Left { .. } => "leave",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Updated(presence) => {
                serde_json::to_value(presence).unwrap_or_else(|_| json!({}))
            }
            Self::Left { user_id } => json!({ "user_id": user_id }),
        }
    }
}

/// Fan-out hub for realtime events. Publishing with no subscribers is a
/// no-op, and a slow subscriber only loses its own backlog.
pub struct Feed<E> {
    tx: broadcast::Sender<E>,
}

pub type NoteFeed = Feed<NoteEvent>;
pub type PresenceFeed = Feed<PresenceEvent>;

impl<E: Clone> Feed<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: E) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }
}

impl<E> Clone for Feed<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: i64, user_id: &str) -> NoteResponse {
        NoteResponse {
            id,
            user_id: user_id.to_string(),
            title: "Calc".to_string(),
            content: "x".to_string(),
            category: None,
            tags: None,
            color: None,
            grade: None,
            feedback: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let feed = NoteFeed::new(16);
        let mut rx = feed.subscribe();

        feed.publish(NoteEvent {
            user_id: "u1".to_string(),
            change: NoteChange::Inserted(note(1, "u1")),
        });

        let event = rx.recv().await.expect("event");
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.change.kind(), "insert");
    }

    #[test]
    fn delete_payload_carries_only_the_id() {
        let change = NoteChange::Deleted { id: 7 };
        assert_eq!(change.kind(), "delete");
        assert_eq!(change.payload(), json!({ "id": 7 }));
    }

    #[test]
    fn leave_payload_carries_only_the_user() {
        let change = PresenceChange::Left {
            user_id: "u2".to_string(),
        };
        assert_eq!(change.kind(), "leave");
        assert_eq!(change.payload(), json!({ "user_id": "u2" }));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let feed = NoteFeed::new(4);
        feed.publish(NoteEvent {
            user_id: "u1".to_string(),
            change: NoteChange::Deleted { id: 1 },
        });
    }
}
