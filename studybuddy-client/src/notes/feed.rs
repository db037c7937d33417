use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    error::ClientError,
    notes::Note,
    session::Session,
    sse::{SseFrame, SseParser},
};

/// One row-level change delivered over the per-user change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Insert(Note),
    Update(Note),
    Delete { id: i64 },
}

/// Scoped handle on the realtime note feed. The SSE connection lives in a
/// background task that forwards decoded events into a channel; dropping
/// the handle aborts the task, so the feed is released on every exit path.
pub struct FeedSubscription {
    events: mpsc::Receiver<FeedEvent>,
    task: JoinHandle<()>,
}

impl FeedSubscription {
    pub async fn open(session: &Session) -> Result<Self, ClientError> {
        let response = session
            .http()
            .get(session.url("/rest/notes/feed"))
            .query(&[("user_id", session.user_id())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "feed subscription failed with status {status}"
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
                        tracing::warn!("note feed stream ended: {e}");
                        return;
                    }
                }
            }
        });

        Ok(Self { events: rx, task })
    }

    /// Next decoded event; `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Deserialize)]
struct DeletedRow {
    id: i64,
}

fn decode(frame: &SseFrame) -> Option<FeedEvent> {
    match frame.kind.as_str() {
        "insert" => serde_json::from_str(&frame.data).ok().map(FeedEvent::Insert),
        "update" => serde_json::from_str(&frame.data).ok().map(FeedEvent::Update),
        "delete" => serde_json::from_str::<DeletedRow>(&frame.data)
            .ok()
            .map(|row| FeedEvent::Delete { id: row.id }),
        other => {
            tracing::debug!("ignoring unknown feed event '{other}'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_json(id: i64, title: &str) -> String {
        format!(
            "{{\"id\":{id},\"user_id\":\"u1\",\"title\":\"{title}\",\"content\":\"\",\
             \"category\":null,\"tags\":null,\"color\":null,\"grade\":null,\"feedback\":null,\
             \"created_at\":\"2026-08-05T10:00:00Z\",\"updated_at\":\"2026-08-05T10:00:00Z\"}}"
        )
    }

    fn frame(kind: &str, data: String) -> SseFrame {
        SseFrame {
            kind: kind.to_string(),
            data,
        }
    }

    #[test]
    fn insert_frame_carries_the_full_row() {
        let event = decode(&frame("insert", note_json(1, "Calc"))).expect("event");
        assert!(matches!(event, FeedEvent::Insert(note) if note.id == 1));
    }

    #[test]
    fn update_frame_carries_the_full_row() {
        let event = decode(&frame("update", note_json(2, "Fysik"))).expect("event");
        assert!(matches!(event, FeedEvent::Update(note) if note.id == 2));
    }

    #[test]
    fn delete_frame_carries_only_the_id() {
        let event = decode(&frame("delete", "{\"id\":7}".to_string()));
        assert_eq!(event, Some(FeedEvent::Delete { id: 7 }));
    }

    #[test]
    fn unknown_event_kinds_are_dropped() {
        assert!(decode(&frame("truncate", "{}".to_string())).is_none());
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        assert!(decode(&frame("insert", "not json".to_string())).is_none());
    }
}
