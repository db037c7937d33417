use std::sync::Arc;

use chrono::{Days, Utc};

use crate::{
    dto::ProgressLogResponse, repository::Repository, service::ServiceError,
};

pub struct ProgressService {
    repo: Arc<tokio::sync::Mutex<Repository>>,
}

impl ProgressService {
    pub const fn new(repo: Arc<tokio::sync::Mutex<Repository>>) -> Self {
        Self { repo }
    }

    /// Log rows for the trailing window, oldest first.
    pub async fn list(
        &self,
        user_id: &str,
        days: u32,
    ) -> Result<Vec<ProgressLogResponse>, ServiceError> {
        if !matches!(days, 7 | 30 | 365) {
            return Err(ServiceError::Validation(
                "days must be one of 7, 30 or 365".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        let from = today - Days::new(u64::from(days));

        let logs = self.repo.lock().await.list_progress(user_id, from).await?;
        Ok(logs.into_iter().map(ProgressLogResponse::from).collect())
    }

    pub async fn add_minutes(
        &self,
        user_id: &str,
        minutes: i32,
    ) -> Result<ProgressLogResponse, ServiceError> {
        if minutes <= 0 {
            return Err(ServiceError::Validation(
                "minutes must be positive".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        let log = self
            .repo
            .lock()
            .await
            .add_minutes(user_id, today, minutes)
            .await?;

        Ok(ProgressLogResponse::from(log))
    }

    pub async fn note_created(&self, user_id: &str) -> Result<ProgressLogResponse, ServiceError> {
        let today = Utc::now().date_naive();
        let log = self
            .repo
            .lock()
            .await
            .increment_notes_created(user_id, today)
            .await?;

        Ok(ProgressLogResponse::from(log))
    }

    pub async fn quiz_done(&self, user_id: &str) -> Result<ProgressLogResponse, ServiceError> {
        let today = Utc::now().date_naive();
        let log = self
            .repo
            .lock()
            .await
            .increment_quizzes_done(user_id, today)
            .await?;

        Ok(ProgressLogResponse::from(log))
    }
}
