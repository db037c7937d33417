use std::path::{Path, PathBuf};

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Disk-backed blob store. Blobs live under `root`, addressed by a
/// caller-chosen relative path; downloads go through time-limited
/// HMAC-signed URLs so the HTTP surface never exposes raw paths unsigned.
pub struct BlobStore {
    root: PathBuf,
    secret: String,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, secret: String) -> Self {
        Self {
            root: root.into(),
            secret,
        }
    }

    fn resolve(&self, storage_path: &str) -> Result<PathBuf, StorageError> {
        // Reject anything that could climb out of the root.
        if storage_path.is_empty()
            || Path::new(storage_path).is_absolute()
            || storage_path.split('/').any(|part| part == "..")
        {
            return Err(StorageError::InvalidPath(storage_path.to_string()));
        }
        Ok(self.root.join(storage_path))
    }

    pub async fn put(&self, storage_path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(storage_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn get(&self, storage_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(storage_path)?;
        Ok(tokio::fs::read(&path).await?)
    }

    pub async fn remove(&self, storage_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(storage_path)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    /// Hex HMAC-SHA256 over `path:expires`.
    pub fn sign(&self, storage_path: &str, expires: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{storage_path}:{expires}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, storage_path: &str, expires: i64, sig: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(raw) = hex::decode(sig) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{storage_path}:{expires}").as_bytes());
        mac.verify_slice(&raw).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> BlobStore {
        BlobStore::new(root, "test-secret".to_string())
    }

    #[tokio::test]
    async fn put_get_remove_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        store.put("u1/a.txt", b"hello").await.expect("put");
        assert_eq!(store.get("u1/a.txt").await.expect("get"), b"hello");

        store.remove("u1/a.txt").await.expect("remove");
        assert!(store.get("u1/a.txt").await.is_err());
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        assert!(matches!(
            store.put("../escape.txt", b"x").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.get("/etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn signature_verifies_until_expiry() {
        let store = BlobStore::new("/tmp/blobs", "s3cret".to_string());
        let sig = store.sign("u1/a.txt", 1_000);

        assert!(store.verify("u1/a.txt", 1_000, &sig, 999));
        // Expired
        assert!(!store.verify("u1/a.txt", 1_000, &sig, 1_001));
        // Tampered path
        assert!(!store.verify("u1/b.txt", 1_000, &sig, 999));
        // Tampered expiry
        assert!(!store.verify("u1/a.txt", 2_000, &sig, 999));
        // Not hex at all
        assert!(!store.verify("u1/a.txt", 1_000, "zz", 999));
    }
}
