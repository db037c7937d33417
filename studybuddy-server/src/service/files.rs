use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::{DownloadUrlResponse, FileResponse},
    models::FileRecord,
    repository::Repository,
    service::ServiceError,
    storage::BlobStore,
};

pub struct FileService {
    repo: Arc<tokio::sync::Mutex<Repository>>,
    store: BlobStore,
    url_ttl: Duration,
}

impl FileService {
    pub const fn new(
        repo: Arc<tokio::sync::Mutex<Repository>>,
        store: BlobStore,
        url_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            store,
            url_ttl,
        }
    }

    /// Writes the blob under a generated path, then records its metadata.
    pub async fn upload(
        &self,
        user_id: &str,
        name: &str,
        mime_type: &str,
        note_id: Option<i64>,
        bytes: &[u8],
    ) -> Result<FileResponse, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "file name must not be empty".to_string(),
            ));
        }

        let storage_path = match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                format!("{user_id}/{}.{ext}", Uuid::new_v4())
            }
            _ => format!("{user_id}/{}", Uuid::new_v4()),
        };

        self.store.put(&storage_path, bytes).await?;

        let record = self
            .repo
            .lock()
            .await
            .insert_file(
                user_id,
                name,
                mime_type,
                bytes.len() as i64,
                &storage_path,
                note_id,
            )
            .await?;

        tracing::info!(
            "Stored file '{}' ({} bytes) at {}",
            record.name,
            record.size,
            record.storage_path
        );

        Ok(FileResponse::from(record))
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<FileResponse>, ServiceError> {
        let files = self.repo.lock().await.list_files(user_id).await?;
        Ok(files.into_iter().map(FileResponse::from).collect())
    }

    pub async fn download_url(
        &self,
        id: i64,
    ) -> Result<Option<DownloadUrlResponse>, ServiceError> {
        let Some(record) = self.repo.lock().await.get_file(id).await? else {
            return Ok(None);
        };

        let expires = Utc::now().timestamp() + self.url_ttl.as_secs() as i64;
        let sig = self.store.sign(&record.storage_path, expires);

        Ok(Some(DownloadUrlResponse {
            url: format!(
                "/rest/files/download/{}?expires={expires}&sig={sig}",
                record.storage_path
            ),
            expires_at: expires,
        }))
    }

    /// Verifies the signed URL, then reads the blob.
    pub async fn serve(
        &self,
        storage_path: &str,
        expires: i64,
        sig: &str,
    ) -> Result<Option<(FileRecord, Vec<u8>)>, ServiceError> {
        if !self
            .store
            .verify(storage_path, expires, sig, Utc::now().timestamp())
        {
            return Err(ServiceError::BadSignature);
        }

        let Some(record) = self.repo.lock().await.get_file_by_path(storage_path).await? else {
            return Ok(None);
        };

        let bytes = self.store.get(storage_path).await?;
        Ok(Some((record, bytes)))
    }

    /// Removes the blob first, then the metadata row.
    pub async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let repo = self.repo.lock().await;
        let Some(record) = repo.get_file(id).await? else {
            return Ok(false);
        };

        self.store.remove(&record.storage_path).await?;
        Ok(repo.delete_file(id).await?)
    }
}
