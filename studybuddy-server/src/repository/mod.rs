mod embedded;

use embedded::migrations;

use chrono::NaiveDate;
use tokio_postgres::{Client, NoTls, Row, types::ToSql};

use crate::models::{
    FileRecord, NewNote, Note, NoteFilter, NoteShare, NoteVersion, Presence, Profile, ProgressLog,
};

fn note_from_row(row: &Row) -> Note {
    Note {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        category: row.get("category"),
        tags: row.get("tags"),
        color: row.get("color"),
        grade: row.get("grade"),
        feedback: row.get("feedback"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn version_from_row(row: &Row) -> NoteVersion {
    NoteVersion {
        id: row.get("id"),
        note_id: row.get("note_id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn progress_from_row(row: &Row) -> ProgressLog {
    ProgressLog {
        id: row.get("id"),
        user_id: row.get("user_id"),
        date: row.get("date"),
        minutes: row.get("minutes"),
        notes_created: row.get("notes_created"),
        quizzes_done: row.get("quizzes_done"),
        created_at: row.get("created_at"),
    }
}

fn file_from_row(row: &Row) -> FileRecord {
    FileRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        mime_type: row.get("mime_type"),
        size: row.get("size"),
        storage_path: row.get("storage_path"),
        note_id: row.get("note_id"),
        uploaded_at: row.get("uploaded_at"),
    }
}

fn presence_from_row(row: &Row) -> Presence {
    Presence {
        id: row.get("id"),
        note_id: row.get("note_id"),
        user_id: row.get("user_id"),
        cursor: row.get("cursor_pos"),
        selection_start: row.get("selection_start"),
        selection_end: row.get("selection_end"),
        last_seen: row.get("last_seen"),
    }
}

fn profile_from_row(row: &Row) -> Profile {
    Profile {
        id: row.get("id"),
        display_name: row.get("display_name"),
        is_premium: row.get("is_premium"),
        has_seen_intro: row.get("has_seen_intro"),
        created_at: row.get("created_at"),
    }
}

pub struct Repository {
    client: Client,
}

impl Repository {
    pub async fn new(database_dsn: String) -> Result<Self, tokio_postgres::Error> {
        let (client, con) = tokio_postgres::connect(&database_dsn, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = con.await {
                tracing::error!("connection error: {}", e);
            }
        });

        Ok(Self { client })
    }

    pub async fn migrate(&mut self) -> Result<(), refinery::Error> {
        let migrations_report = migrations::runner().run_async(&mut self.client).await?;

        for migration in migrations_report.applied_migrations() {
            tracing::info!(
                "Migration Applied -  Name: {}, Version: {}",
                migration.name(),
                migration.version()
            );
        }

        tracing::info!("DB migrations finished!");

        Ok(())
    }

    // ------------------------------------------------------------------ notes

    pub async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT id, user_id, title, content, category, tags, color, grade, feedback, \
                 created_at, updated_at FROM notes WHERE user_id = $1 ORDER BY updated_at DESC",
                &[&user_id],
            )
            .await?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    pub async fn create_note(&self, new: &NewNote) -> Result<Note, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO notes (user_id, title, content, category, tags, color) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING id, user_id, title, content, category, tags, color, grade, feedback, \
                 created_at, updated_at",
                &[
                    &new.user_id,
                    &new.title,
                    &new.content,
                    &new.category,
                    &new.tags,
                    &new.color,
                ],
            )
            .await?;

        Ok(note_from_row(&row))
    }

    pub async fn get_note(&self, id: i64) -> Result<Option<Note>, tokio_postgres::Error> {
        let row = self
            .client
            .query_opt(
                "SELECT id, user_id, title, content, category, tags, color, grade, feedback, \
                 created_at, updated_at FROM notes WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(note_from_row))
    }

    /// Writes the full set of mutable columns and bumps `updated_at`.
    /// The caller merges partial changes onto the current row first.
    pub async fn update_note(&self, note: &Note) -> Result<Option<Note>, tokio_postgres::Error> {
        let row = self
            .client
            .query_opt(
                "UPDATE notes SET title = $1, content = $2, category = $3, tags = $4, \
                 color = $5, grade = $6, feedback = $7, updated_at = now() \
                 WHERE id = $8 \
                 RETURNING id, user_id, title, content, category, tags, color, grade, feedback, \
                 created_at, updated_at",
                &[
                    &note.title,
                    &note.content,
                    &note.category,
                    &note.tags,
                    &note.color,
                    &note.grade,
                    &note.feedback,
                    &note.id,
                ],
            )
            .await?;

        Ok(row.as_ref().map(note_from_row))
    }

    pub async fn delete_note(&self, id: i64) -> Result<bool, tokio_postgres::Error> {
        let rows = self
            .client
            .execute("DELETE FROM notes WHERE id = $1", &[&id])
            .await?;

        Ok(rows == 1)
    }

    pub async fn search_notes(
        &self,
        user_id: &str,
        filter: &NoteFilter,
    ) -> Result<Vec<Note>, tokio_postgres::Error> {
        let mut sql = String::from(
            "SELECT id, user_id, title, content, category, tags, color, grade, feedback, \
             created_at, updated_at FROM notes WHERE user_id = $1",
        );
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![&user_id];

        if let Some(text) = &filter.text {
            params.push(text);
            sql.push_str(&format!(
                " AND content_search @@ plainto_tsquery('simple', ${})",
                params.len()
            ));
        }
        if let Some(category) = &filter.category {
            params.push(category);
            sql.push_str(&format!(" AND category = ${}", params.len()));
        }
        if !filter.tags.is_empty() {
            params.push(&filter.tags);
            sql.push_str(&format!(" AND tags @> ${}", params.len()));
        }
        if let Some(from) = &filter.from {
            params.push(from);
            sql.push_str(&format!(" AND created_at::date >= ${}", params.len()));
        }
        if let Some(to) = &filter.to {
            params.push(to);
            sql.push_str(&format!(" AND created_at::date <= ${}", params.len()));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(filter.order.sql());

        let rows = self.client.query(sql.as_str(), &params).await?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    pub async fn list_categories(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT DISTINCT category FROM notes \
                 WHERE user_id = $1 AND category IS NOT NULL ORDER BY category",
                &[&user_id],
            )
            .await?;

        Ok(rows.iter().map(|row| row.get("category")).collect())
    }

    // --------------------------------------------------------------- versions

    pub async fn insert_version(
        &self,
        note_id: i64,
        user_id: &str,
        title: &str,
        content: &str,
    ) -> Result<NoteVersion, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO note_versions (note_id, user_id, title, content) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, note_id, user_id, title, content, created_at",
                &[&note_id, &user_id, &title, &content],
            )
            .await?;

        Ok(version_from_row(&row))
    }

    pub async fn list_versions(
        &self,
        note_id: i64,
    ) -> Result<Vec<NoteVersion>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT id, note_id, user_id, title, content, created_at \
                 FROM note_versions WHERE note_id = $1 ORDER BY created_at DESC, id DESC",
                &[&note_id],
            )
            .await?;

        Ok(rows.iter().map(version_from_row).collect())
    }

    // ----------------------------------------------------------------- shares

    pub async fn create_share(
        &self,
        note_id: i64,
        owner_id: &str,
        shared_with_id: &str,
        role: &str,
    ) -> Result<NoteShare, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO note_shares (note_id, owner_id, shared_with_id, role) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, note_id, owner_id, shared_with_id, role, created_at",
                &[&note_id, &owner_id, &shared_with_id, &role],
            )
            .await?;

        Ok(NoteShare {
            id: row.get("id"),
            note_id: row.get("note_id"),
            owner_id: row.get("owner_id"),
            shared_with_id: row.get("shared_with_id"),
            role: row.get("role"),
            created_at: row.get("created_at"),
        })
    }

    /// Shares granted *to* the given user, with the shared note joined in.
    pub async fn list_shares_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<(NoteShare, Note)>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT s.id AS share_id, s.note_id, s.owner_id, s.shared_with_id, s.role, \
                        s.created_at AS shared_at, \
                        n.id, n.user_id, n.title, n.content, n.category, n.tags, n.color, \
                        n.grade, n.feedback, n.created_at, n.updated_at \
                 FROM note_shares s \
                 JOIN notes n ON n.id = s.note_id \
                 WHERE s.shared_with_id = $1 \
                 ORDER BY s.created_at DESC",
                &[&user_id],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let share = NoteShare {
                    id: row.get("share_id"),
                    note_id: row.get("note_id"),
                    owner_id: row.get("owner_id"),
                    shared_with_id: row.get("shared_with_id"),
                    role: row.get("role"),
                    created_at: row.get("shared_at"),
                };
                (share, note_from_row(row))
            })
            .collect())
    }

    // --------------------------------------------------------------- progress

    pub async fn list_progress(
        &self,
        user_id: &str,
        from: NaiveDate,
    ) -> Result<Vec<ProgressLog>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT id, user_id, date, minutes, notes_created, quizzes_done, created_at \
                 FROM progress_logs WHERE user_id = $1 AND date >= $2 ORDER BY date ASC",
                &[&user_id, &from],
            )
            .await?;

        Ok(rows.iter().map(progress_from_row).collect())
    }

    pub async fn add_minutes(
        &self,
        user_id: &str,
        date: NaiveDate,
        minutes: i32,
    ) -> Result<ProgressLog, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO progress_logs (user_id, date, minutes) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, date) \
                 DO UPDATE SET minutes = progress_logs.minutes + EXCLUDED.minutes \
                 RETURNING id, user_id, date, minutes, notes_created, quizzes_done, created_at",
                &[&user_id, &date, &minutes],
            )
            .await?;

        Ok(progress_from_row(&row))
    }

    pub async fn increment_notes_created(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<ProgressLog, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO progress_logs (user_id, date, notes_created) VALUES ($1, $2, 1) \
                 ON CONFLICT (user_id, date) \
                 DO UPDATE SET notes_created = progress_logs.notes_created + 1 \
                 RETURNING id, user_id, date, minutes, notes_created, quizzes_done, created_at",
                &[&user_id, &date],
            )
            .await?;

        Ok(progress_from_row(&row))
    }

    pub async fn increment_quizzes_done(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<ProgressLog, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO progress_logs (user_id, date, quizzes_done) VALUES ($1, $2, 1) \
                 ON CONFLICT (user_id, date) \
                 DO UPDATE SET quizzes_done = progress_logs.quizzes_done + 1 \
                 RETURNING id, user_id, date, minutes, notes_created, quizzes_done, created_at",
                &[&user_id, &date],
            )
            .await?;

        Ok(progress_from_row(&row))
    }

    // --------------------------------------------------------------- presence

    pub async fn upsert_presence(
        &self,
        note_id: i64,
        user_id: &str,
        cursor: Option<i32>,
        selection_start: Option<i32>,
        selection_end: Option<i32>,
    ) -> Result<Presence, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO presence (note_id, user_id, cursor_pos, selection_start, selection_end) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (note_id, user_id) \
                 DO UPDATE SET cursor_pos = EXCLUDED.cursor_pos, \
                               selection_start = EXCLUDED.selection_start, \
                               selection_end = EXCLUDED.selection_end, \
                               last_seen = now() \
                 RETURNING id, note_id, user_id, cursor_pos, selection_start, selection_end, \
                 last_seen",
                &[&note_id, &user_id, &cursor, &selection_start, &selection_end],
            )
            .await?;

        Ok(presence_from_row(&row))
    }

    /// Presence rows for one note, freshest first, with the collaborator's
    /// display name joined in where a profile exists.
    pub async fn list_presence(
        &self,
        note_id: i64,
    ) -> Result<Vec<(Presence, Option<String>)>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT p.id, p.note_id, p.user_id, p.cursor_pos, p.selection_start, \
                        p.selection_end, p.last_seen, pr.display_name \
                 FROM presence p \
                 LEFT JOIN profiles pr ON pr.id = p.user_id \
                 WHERE p.note_id = $1 \
                 ORDER BY p.last_seen DESC",
                &[&note_id],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| (presence_from_row(row), row.get("display_name")))
            .collect())
    }

    pub async fn clear_presence(
        &self,
        note_id: i64,
        user_id: &str,
    ) -> Result<bool, tokio_postgres::Error> {
        let rows = self
            .client
            .execute(
                "DELETE FROM presence WHERE note_id = $1 AND user_id = $2",
                &[&note_id, &user_id],
            )
            .await?;

        Ok(rows == 1)
    }

    // --------------------------------------------------------------- profiles

    pub async fn get_profile(&self, id: &str) -> Result<Option<Profile>, tokio_postgres::Error> {
        let row = self
            .client
            .query_opt(
                "SELECT id, display_name, is_premium, has_seen_intro, created_at \
                 FROM profiles WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    pub async fn create_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
    ) -> Result<Profile, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO profiles (id, display_name) VALUES ($1, $2) \
                 RETURNING id, display_name, is_premium, has_seen_intro, created_at",
                &[&id, &display_name],
            )
            .await?;

        Ok(profile_from_row(&row))
    }

    pub async fn update_profile(
        &self,
        profile: &Profile,
    ) -> Result<Option<Profile>, tokio_postgres::Error> {
        let row = self
            .client
            .query_opt(
                "UPDATE profiles SET display_name = $1, is_premium = $2, has_seen_intro = $3 \
                 WHERE id = $4 \
                 RETURNING id, display_name, is_premium, has_seen_intro, created_at",
                &[
                    &profile.display_name,
                    &profile.is_premium,
                    &profile.has_seen_intro,
                    &profile.id,
                ],
            )
            .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    // ------------------------------------------------------------------ files

    pub async fn insert_file(
        &self,
        user_id: &str,
        name: &str,
        mime_type: &str,
        size: i64,
        storage_path: &str,
        note_id: Option<i64>,
    ) -> Result<FileRecord, tokio_postgres::Error> {
        let row = self
            .client
            .query_one(
                "INSERT INTO files (user_id, name, mime_type, size, storage_path, note_id) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING id, user_id, name, mime_type, size, storage_path, note_id, uploaded_at",
                &[&user_id, &name, &mime_type, &size, &storage_path, &note_id],
            )
            .await?;

        Ok(file_from_row(&row))
    }

    pub async fn list_files(
        &self,
        user_id: &str,
    ) -> Result<Vec<FileRecord>, tokio_postgres::Error> {
        let rows = self
            .client
            .query(
                "SELECT id, user_id, name, mime_type, size, storage_path, note_id, uploaded_at \
                 FROM files WHERE user_id = $1 ORDER BY uploaded_at DESC",
                &[&user_id],
            )
            .await?;

        Ok(rows.iter().map(file_from_row).collect())
    }

    pub async fn get_file(&self, id: i64) -> Result<Option<FileRecord>, tokio_postgres::Error> {
        let row = self
            .client
            .query_opt(
                "SELECT id, user_id, name, mime_type, size, storage_path, note_id, uploaded_at \
                 FROM files WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(file_from_row))
    }

    pub async fn get_file_by_path(
        &self,
        storage_path: &str,
    ) -> Result<Option<FileRecord>, tokio_postgres::Error> {
        let row = self
            .client
            .query_opt(
                "SELECT id, user_id, name, mime_type, size, storage_path, note_id, uploaded_at \
                 FROM files WHERE storage_path = $1",
                &[&storage_path],
            )
            .await?;

        Ok(row.as_ref().map(file_from_row))
    }

    pub async fn delete_file(&self, id: i64) -> Result<bool, tokio_postgres::Error> {
        let rows = self
            .client
            .execute("DELETE FROM files WHERE id = $1", &[&id])
            .await?;

        Ok(rows == 1)
    }
}
