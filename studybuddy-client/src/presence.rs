use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    error::ClientError,
    session::{Session, expect_json, expect_ok},
    sse::{SseFrame, SseParser},
};

/// A collaborator's live position inside an open note.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresenceState {
    pub note_id: i64,
    pub user_id: String,
    pub user_name: Option<String>,
    pub cursor: Option<i32>,
    pub selection_start: Option<i32>,
    pub selection_end: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    Updated(PresenceState),
    Left { user_id: String },
}

/// The collaborator list for one open note, merged by user id. Each user
/// appears at most once; re-applying the same event changes nothing.
#[derive(Debug, Default)]
pub struct PresenceRoster {
    entries: Vec<PresenceState>,
}

impl PresenceRoster {
    pub fn entries(&self) -> &[PresenceState] {
        &self.entries
    }

    pub fn apply(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Updated(state) => {
                self.entries.retain(|entry| entry.user_id != state.user_id);
                self.entries.push(state);
            }
            PresenceEvent::Left { user_id } => {
                self.entries.retain(|entry| entry.user_id != user_id);
            }
        }
    }
}

/// Reports the current user's cursor inside a note and reads everyone
/// else's, so an open editor can render collaborator positions.
pub struct PresenceClient {
    session: Session,
}

impl PresenceClient {
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Upserts this user's position; repeated calls refresh it.
    pub async fn update(
        &self,
        note_id: i64,
        cursor: i32,
        selection: Option<(i32, i32)>,
    ) -> Result<PresenceState, ClientError> {
        let (selection_start, selection_end) = match selection {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let response = self
            .session
            .http()
            .post(self.session.url("/rest/presence"))
            .json(&json!({
                "note_id": note_id,
                "user_id": self.session.user_id(),
                "cursor": cursor,
                "selection_start": selection_start,
                "selection_end": selection_end,
            }))
            .send()
            .await?;
        expect_json(response, "presence").await
    }

    /// Everyone currently inside the note, freshest first.
    pub async fn list(&self, note_id: i64) -> Result<Vec<PresenceState>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url("/rest/presence"))
            .query(&[("note_id", note_id.to_string())])
            .send()
            .await?;
        expect_json(response, "presence").await
    }

    /// Clears this user's position when the editor closes.
    pub async fn leave(&self, note_id: i64) -> Result<(), ClientError> {
        let response = self
            .session
            .http()
            .delete(self.session.url("/rest/presence"))
            .query(&[
                ("note_id", note_id.to_string()),
                ("user_id", self.session.user_id().to_string()),
            ])
            .send()
            .await?;
        expect_ok(response, "presence").await
    }
}

/// Scoped handle on one note's presence feed, mirroring the note feed's
/// lifecycle: the SSE consumer task dies with the handle.
pub struct PresenceSubscription {
    events: mpsc::Receiver<PresenceEvent>,
    task: JoinHandle<()>,
}

impl PresenceSubscription {
    pub async fn open(session: &Session, note_id: i64) -> Result<Self, ClientError> {
        let response = session
            .http()
            .get(session.url("/rest/presence/feed"))
            .query(&[("note_id", note_id.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "presence subscription failed with status {status}"
            )));
        }

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut parser = SseParser::default();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        for frame in parser.push(&bytes) {
                            let Some(event) = decode(&frame) else {
                                continue;
                            };
                            if tx.send(event).await.is_err() {
                                return; // receiver gone
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("presence feed stream ended: {e}");
                        return;
                    }
                }
            }
        });

        Ok(Self { events: rx, task })
    }

    pub async fn next(&mut self) -> Option<PresenceEvent> {
        self.events.recv().await
    }
}

impl Drop for PresenceSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Deserialize)]
struct LeftRow {
    user_id: String,
}

fn decode(frame: &SseFrame) -> Option<PresenceEvent> {
    match frame.kind.as_str() {
        "update" => serde_json::from_str(&frame.data)
            .ok()
            .map(PresenceEvent::Updated),
        "leave" => serde_json::from_str::<LeftRow>(&frame.data)
            .ok()
            .map(|row| PresenceEvent::Left {
                user_id: row.user_id,
            }),
        other => {
            tracing::debug!("ignoring unknown presence event '{other}'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(user_id: &str, cursor: i32) -> PresenceState {
        PresenceState {
            note_id: 1,
            user_id: user_id.to_string(),
            user_name: None,
            cursor: Some(cursor),
            selection_start: None,
            selection_end: None,
        }
    }

    #[test]
    fn update_replaces_the_same_users_entry() {
        let mut roster = PresenceRoster::default();

        roster.apply(PresenceEvent::Updated(state("u2", 5)));
        roster.apply(PresenceEvent::Updated(state("u2", 12)));

        assert_eq!(roster.entries().len(), 1);
        assert_eq!(roster.entries()[0].cursor, Some(12));
    }

    #[test]
    fn reapplying_the_same_event_is_a_no_op() {
        let mut roster = PresenceRoster::default();

        roster.apply(PresenceEvent::Updated(state("u2", 5)));
        let before = roster.entries().to_vec();
        roster.apply(PresenceEvent::Updated(state("u2", 5)));

        assert_eq!(roster.entries(), before.as_slice());
    }

    #[test]
    fn leave_removes_only_that_user() {
        let mut roster = PresenceRoster::default();

        roster.apply(PresenceEvent::Updated(state("u2", 5)));
        roster.apply(PresenceEvent::Updated(state("u3", 9)));
        roster.apply(PresenceEvent::Left {
            user_id: "u2".to_string(),
        });

        assert_eq!(roster.entries().len(), 1);
        assert_eq!(roster.entries()[0].user_id, "u3");

        // Leaving again changes nothing
        roster.apply(PresenceEvent::Left {
            user_id: "u2".to_string(),
        });
        assert_eq!(roster.entries().len(), 1);
    }

    #[test]
    fn update_frame_decodes_the_collaborator_row() {
        let frame = SseFrame {
            kind: "update".to_string(),
            data: "{\"note_id\":1,\"user_id\":\"u2\",\"user_name\":\"Sofie\",\
                   \"cursor\":4,\"selection_start\":null,\"selection_end\":null}"
                .to_string(),
        };

        let event = decode(&frame).expect("event");
        assert!(matches!(
            event,
            PresenceEvent::Updated(state) if state.user_name.as_deref() == Some("Sofie")
        ));
    }

    #[test]
    fn leave_frame_carries_only_the_user_id() {
        let frame = SseFrame {
            kind: "leave".to_string(),
            data: "{\"user_id\":\"u2\"}".to_string(),
        };

        assert_eq!(
            decode(&frame),
            Some(PresenceEvent::Left {
                user_id: "u2".to_string()
            })
        );
    }
}
