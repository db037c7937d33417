mod ai;
mod files;
mod notes;
mod presence;
mod profiles;
mod progress;

pub use ai::{AiError, AiProxyService};
pub use files::FileService;
pub use notes::NoteService;
pub use presence::PresenceService;
pub use profiles::ProfileService;
pub use progress::ProgressService;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("signature rejected")]
    BadSignature,
}
