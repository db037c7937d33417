pub mod feed;
pub mod repo;
pub mod view;

pub use feed::{FeedEvent, FeedSubscription};
pub use repo::{HttpNoteStore, NoteStore};
pub use view::{NotesView, Notice, NoticeKind};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Card excerpts cap out at this many characters of content.
pub const EXCERPT_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Content preview for cards, truncated with an ellipsis.
    pub fn excerpt(&self) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(EXCERPT_MAX_CHARS).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

/// Fields the user fills in for a brand-new note.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
}

/// Partial update; only the present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl NoteChanges {
    /// Merges the present fields onto `note`, leaving the rest untouched.
    pub fn apply(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(category) = &self.category {
            note.category = Some(category.clone());
        }
        if let Some(tags) = &self.tags {
            note.tags = Some(tags.clone());
        }
        if let Some(color) = &self.color {
            note.color = Some(color.clone());
        }
        if let Some(grade) = self.grade {
            note.grade = Some(grade);
        }
        if let Some(feedback) = &self.feedback {
            note.feedback = Some(feedback.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Updated,
    Created,
    Title,
}

impl SortKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Created => "created",
            Self::Title => "title",
        }
    }
}

/// Active search filters. An all-empty query means the base list is shown;
/// the sort key alone does not switch the view into search mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub sort: SortKey,
}

impl NoteQuery {
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty())
            && self.category.as_deref().is_none_or(str::is_empty)
            && self.tags.is_empty()
            && self.from.is_none()
            && self.to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoteVersion {
    pub id: i64,
    pub note_id: i64,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A note someone else shared with the current user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SharedNote {
    pub id: i64,
    pub note_id: i64,
    pub shared_with_id: String,
    pub role: String,
    pub note: Note,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_with_content(content: &str) -> Note {
        Note {
            id: 1,
            user_id: "u1".to_string(),
            title: "Calc".to_string(),
            content: content.to_string(),
            category: Some("Matematik".to_string()),
            tags: None,
            color: None,
            grade: None,
            feedback: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn short_content_is_not_truncated() {
        let note = note_with_content("x");
        assert_eq!(note.excerpt(), "x");

        let exactly_limit = "a".repeat(EXCERPT_MAX_CHARS);
        assert_eq!(note_with_content(&exactly_limit).excerpt(), exactly_limit);
    }

    #[test]
    fn long_content_is_capped_with_ellipsis() {
        let long = "a".repeat(EXCERPT_MAX_CHARS + 1);
        let excerpt = note_with_content(&long).excerpt();
        assert_eq!(excerpt, format!("{}...", "a".repeat(EXCERPT_MAX_CHARS)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let danish = "æ".repeat(EXCERPT_MAX_CHARS * 2);
        let excerpt = note_with_content(&danish).excerpt();
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 3);
    }

    #[test]
    fn apply_leaves_absent_fields_untouched() {
        let mut note = note_with_content("old");
        let changes = NoteChanges {
            content: Some("new".to_string()),
            ..Default::default()
        };
        changes.apply(&mut note);

        assert_eq!(note.content, "new");
        assert_eq!(note.title, "Calc");
        assert_eq!(note.category.as_deref(), Some("Matematik"));
    }

    #[test]
    fn query_with_only_a_sort_key_is_empty() {
        let query = NoteQuery {
            sort: SortKey::Title,
            ..Default::default()
        };
        assert!(query.is_empty());

        let query = NoteQuery {
            tags: vec!["eksamen".to_string()],
            ..Default::default()
        };
        assert!(!query.is_empty());
    }
}
