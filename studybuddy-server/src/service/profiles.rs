use std::sync::Arc;

use crate::{
    dto::{ProfileResponse, UpdateProfileRequest},
    models::Profile,
    repository::Repository,
    service::ServiceError,
};

pub struct ProfileService {
    repo: Arc<tokio::sync::Mutex<Repository>>,
}

impl ProfileService {
    pub const fn new(repo: Arc<tokio::sync::Mutex<Repository>>) -> Self {
        Self { repo }
    }

    /// Fetches the profile, creating it lazily on first sight of the user.
    /// The display name falls back to the email's local part.
    pub async fn fetch_or_create(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<ProfileResponse, ServiceError> {
        let repo = self.repo.lock().await;

        if let Some(profile) = repo.get_profile(user_id).await? {
            return Ok(ProfileResponse::from(profile));
        }

        let display_name = email.and_then(|email| email.split('@').next());
        let profile = repo.create_profile(user_id, display_name).await?;
        tracing::info!("Created profile for user {}", profile.id);

        Ok(ProfileResponse::from(profile))
    }

    pub async fn update(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<Option<ProfileResponse>, ServiceError> {
        let repo = self.repo.lock().await;
        let Some(current) = repo.get_profile(user_id).await? else {
            return Ok(None);
        };

        let merged = Profile {
            display_name: request.display_name.or(current.display_name),
            is_premium: request.is_premium.unwrap_or(current.is_premium),
            has_seen_intro: request.has_seen_intro.unwrap_or(current.has_seen_intro),
            ..current
        };

        let updated = repo.update_profile(&merged).await?;
        Ok(updated.map(ProfileResponse::from))
    }
}
