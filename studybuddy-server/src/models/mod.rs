use chrono::{DateTime, NaiveDate, Utc};

/// Fields accepted for a brand-new note; the server fills in the rest.
pub struct NewNote {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
}

/// Server-side search predicate over a user's notes.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    pub text: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub order: NoteOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteOrder {
    #[default]
    UpdatedDesc,
    CreatedDesc,
    TitleAsc,
}

impl NoteOrder {
    /// Alphabetical sorting ascends; recency sorts descend.
    pub const fn sql(self) -> &'static str {
        match self {
            Self::UpdatedDesc => "updated_at DESC",
            Self::CreatedDesc => "created_at DESC",
            Self::TitleAsc => "title ASC",
        }
    }
}

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

pub struct NoteVersion {
    pub id: i64,
    pub note_id: i64,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub struct NoteShare {
    pub id: i64,
    pub note_id: i64,
    pub owner_id: String,
    pub shared_with_id: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// A collaborator's live position inside one note, upserted while the
/// note is open and cleared when they leave.
pub struct Presence {
    pub id: i64,
    pub note_id: i64,
    pub user_id: String,
    pub cursor: Option<i32>,
    pub selection_start: Option<i32>,
    pub selection_end: Option<i32>,
    pub last_seen: DateTime<Utc>,
}

pub struct ProgressLog {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub minutes: i32,
    pub notes_created: i32,
    pub quizzes_done: i32,
    pub created_at: DateTime<Utc>,
}

pub struct FileRecord {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub storage_path: String,
    pub note_id: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub is_premium: bool,
    pub has_seen_intro: bool,
    pub created_at: DateTime<Utc>,
}
