use chrono::{DateTime, Utc};
use reqwest::header;
use serde::Deserialize;

use crate::{
    error::ClientError,
    session::{Session, expect_json, expect_ok},
};

/// Client-side upload cap; the server stores whatever it is handed.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
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

/// A file picked for upload, before it goes anywhere.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub uploaded: Vec<FileRecord>,
    pub rejected: Vec<RejectedFile>,
}

#[derive(Debug, Deserialize)]
struct DownloadUrl {
    url: String,
    #[allow(dead_code)]
    expires_at: i64,
}

/// Splits a batch into files small enough to send and size rejections.
/// Runs before any bytes go on the wire.
pub fn partition_by_size(files: Vec<LocalFile>) -> (Vec<LocalFile>, Vec<RejectedFile>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for file in files {
        if file.bytes.len() as u64 > MAX_FILE_SIZE {
            rejected.push(RejectedFile {
                reason: format!("{} er for stor (max 10MB)", file.name),
                name: file.name,
            });
        } else {
            accepted.push(file);
        }
    }

    (accepted, rejected)
}

pub struct FileClient {
    session: Session,
}

impl FileClient {
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Uploads a batch. Oversized files are rejected locally while the rest
    /// of the batch proceeds; a transport failure aborts the remainder and
    /// the user re-triggers.
    pub async fn upload(
        &self,
        files: Vec<LocalFile>,
        note_id: Option<i64>,
    ) -> Result<UploadOutcome, ClientError> {
        let (accepted, rejected) = partition_by_size(files);
        let mut outcome = UploadOutcome {
            uploaded: Vec::new(),
            rejected,
        };

        for file in accepted {
            let record = self.upload_one(&file, note_id).await?;
            tracing::info!("Uploaded '{}' ({} bytes)", record.name, record.size);
            outcome.uploaded.push(record);
        }

        Ok(outcome)
    }

    async fn upload_one(
        &self,
        file: &LocalFile,
        note_id: Option<i64>,
    ) -> Result<FileRecord, ClientError> {
        let mut params = vec![
            ("user_id".to_string(), self.session.user_id().to_string()),
            ("name".to_string(), file.name.clone()),
        ];
        if let Some(note_id) = note_id {
            params.push(("note_id".to_string(), note_id.to_string()));
        }

        let response = self
            .session
            .http()
            .post(self.session.url("/rest/files"))
            .query(&params)
            .header(header::CONTENT_TYPE, file.mime_type.as_str())
            .body(file.bytes.clone())
            .send()
            .await?;

        expect_json(response, "file upload").await
    }

    /// Metadata for the user's files, newest upload first.
    pub async fn list(&self) -> Result<Vec<FileRecord>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url("/rest/files"))
            .query(&[("user_id", self.session.user_id())])
            .send()
            .await?;
        expect_json(response, "files").await
    }

    /// Absolute, time-limited download URL for one file.
    pub async fn download_url(&self, id: i64) -> Result<String, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url(&format!("/rest/files/{id}/download-url")))
            .send()
            .await?;
        let url: DownloadUrl = expect_json(response, "download url").await?;
        Ok(self.session.url(&url.url))
    }

    /// Removes the blob and its metadata row.
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        let response = self
            .session
            .http()
            .delete(self.session.url(&format!("/rest/files/{id}")))
            .send()
            .await?;
        expect_ok(response, "file").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: usize) -> LocalFile {
        LocalFile {
            name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: vec![0; size],
        }
    }

    #[test]
    fn oversized_files_are_rejected_and_the_rest_proceed() {
        let batch = vec![
            file("noter.pdf", 1024),
            file("forelæsning.mp4", (MAX_FILE_SIZE + 1) as usize),
            file("opgave.txt", 42),
        ];

        let (accepted, rejected) = partition_by_size(batch);

        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].name, "noter.pdf");
        assert_eq!(accepted[1].name, "opgave.txt");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].name, "forelæsning.mp4");
        assert!(rejected[0].reason.contains("for stor"));
    }

    #[test]
    fn a_file_at_exactly_the_limit_is_accepted() {
        let batch = vec![file("max.bin", MAX_FILE_SIZE as usize)];
        let (accepted, rejected) = partition_by_size(batch);

        assert_eq!(accepted.len(), 1);
        assert!(rejected.is_empty());
    }
}
