use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{FileRecord, Note, NoteShare, NoteVersion, Presence, Profile, ProgressLog};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    /// Note ID
    pub id: i64,
    /// Owning user
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

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id,
            title: note.title,
            content: note.content,
            category: note.category,
            tags: note.tags,
            color: note.color,
            grade: note.grade,
            feedback: note.feedback,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateNoteRequest {
    /// Owning user
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
}

/// Partial update: absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteVersionResponse {
    pub id: i64,
    pub note_id: i64,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<NoteVersion> for NoteVersionResponse {
    fn from(version: NoteVersion) -> Self {
        Self {
            id: version.id,
            note_id: version.note_id,
            user_id: version.user_id,
            title: version.title,
            content: version.content,
            created_at: version.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    Editor,
    Viewer,
}

impl ShareRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareRequest {
    pub note_id: i64,
    pub owner_id: String,
    pub shared_with_id: String,
    pub role: ShareRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareResponse {
    pub id: i64,
    pub note_id: i64,
    pub owner_id: String,
    pub shared_with_id: String,
    pub role: String,
}

impl From<NoteShare> for ShareResponse {
    fn from(share: NoteShare) -> Self {
        Self {
            id: share.id,
            note_id: share.note_id,
            owner_id: share.owner_id,
            shared_with_id: share.shared_with_id,
            role: share.role,
        }
    }
}

/// A share granted to the requesting user, with the note embedded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SharedNoteResponse {
    pub id: i64,
    pub note_id: i64,
    pub shared_with_id: String,
    pub role: String,
    pub note: NoteResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PresenceResponse {
    pub id: i64,
    pub note_id: i64,
    pub user_id: String,
    /// Display name resolved from the profile, when one exists
    pub user_name: Option<String>,
    pub cursor: Option<i32>,
    pub selection_start: Option<i32>,
    pub selection_end: Option<i32>,
    pub last_seen: DateTime<Utc>,
}

impl From<(Presence, Option<String>)> for PresenceResponse {
    fn from((presence, user_name): (Presence, Option<String>)) -> Self {
        Self {
            id: presence.id,
            note_id: presence.note_id,
            user_id: presence.user_id,
            user_name,
            cursor: presence.cursor,
            selection_start: presence.selection_start,
            selection_end: presence.selection_end,
            last_seen: presence.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePresenceRequest {
    pub note_id: i64,
    pub user_id: String,
    pub cursor: Option<i32>,
    pub selection_start: Option<i32>,
    pub selection_end: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressLogResponse {
    pub id: i64,
    pub user_id: String,
    /// Calendar-day key
    pub date: NaiveDate,
    pub minutes: i32,
    pub notes_created: i32,
    pub quizzes_done: i32,
}

impl From<ProgressLog> for ProgressLogResponse {
    fn from(log: ProgressLog) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            date: log.date,
            minutes: log.minutes,
            notes_created: log.notes_created,
            quizzes_done: log.quizzes_done,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddMinutesRequest {
    pub user_id: String,
    pub minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CounterRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: String,
    pub display_name: Option<String>,
    pub is_premium: bool,
    pub has_seen_intro: bool,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            is_premium: profile.is_premium,
            has_seen_intro: profile.has_seen_intro,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub is_premium: Option<bool>,
    pub has_seen_intro: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub storage_path: String,
    pub note_id: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            user_id: file.user_id,
            name: file.name,
            mime_type: file.mime_type,
            size: file.size,
            storage_path: file.storage_path,
            note_id: file.note_id,
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadUrlResponse {
    /// Server-relative URL, valid until `expires_at`
    pub url: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Updated,
    Created,
    Title,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub user_id: String,
    /// Full-text query over title and content
    pub q: Option<String>,
    pub category: Option<String>,
    /// Comma-separated tag list; matching notes carry all of them
    pub tags: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: SortKey,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ProgressQuery {
    pub user_id: String,
    /// Trailing window in days: 7, 30 or 365
    #[serde(default = "default_progress_days")]
    pub days: u32,
}

const fn default_progress_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ProfileQuery {
    pub user_id: String,
    /// Used to derive a display name when the profile is created lazily
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UploadQuery {
    pub user_id: String,
    /// Original file name
    pub name: String,
    pub note_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SignedQuery {
    pub expires: i64,
    pub sig: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PresenceQuery {
    pub note_id: i64,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LeavePresenceQuery {
    pub note_id: i64,
    pub user_id: String,
}
