use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ClientError;

/// The signed-in user's profile row, created lazily by the server on the
/// first fetch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub is_premium: bool,
    pub has_seen_intro: bool,
}

/// Application context for one signed-in user: identity, premium flag and
/// the shared HTTP client. Constructed at login, passed down explicitly,
/// torn down by dropping it.
#[derive(Debug, Clone)]
pub struct Session {
    profile: Profile,
    email: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl Session {
    /// Fetches (or lazily creates) the profile and builds the context.
    pub async fn sign_in(
        base_url: &str,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let base_url = base_url.trim_end_matches('/').to_string();

        let mut query = vec![("user_id", user_id.to_string())];
        if let Some(email) = email {
            query.push(("email", email.to_string()));
        }

        let response = http
            .get(format!("{base_url}/rest/profile"))
            .query(&query)
            .send()
            .await?;
        let profile: Profile = expect_json(response, "profile").await?;

        tracing::info!("Signed in as {}", profile.id);

        Ok(Self {
            profile,
            email: email.map(str::to_string),
            base_url,
            http,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.profile.id
    }

    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub const fn is_premium(&self) -> bool {
        self.profile.is_premium
    }

    pub const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn refresh_profile(&mut self) -> Result<(), ClientError> {
        let mut query = vec![("user_id", self.profile.id.clone())];
        if let Some(email) = &self.email {
            query.push(("email", email.clone()));
        }

        let response = self
            .http
            .get(self.url("/rest/profile"))
            .query(&query)
            .send()
            .await?;
        self.profile = expect_json(response, "profile").await?;
        Ok(())
    }

    /// Flips the premium flag after a successful checkout.
    pub async fn activate_premium(&mut self) -> Result<(), ClientError> {
        self.patch_profile(json!({ "is_premium": true })).await
    }

    pub async fn complete_onboarding(&mut self) -> Result<(), ClientError> {
        self.patch_profile(json!({ "has_seen_intro": true })).await
    }

    async fn patch_profile(&mut self, body: serde_json::Value) -> Result<(), ClientError> {
        let response = self
            .http
            .patch(self.url(&format!("/rest/profile/{}", self.profile.id)))
            .json(&body)
            .send()
            .await?;
        self.profile = expect_json(response, "profile").await?;
        Ok(())
    }
}

/// Maps a response onto the client error taxonomy, decoding the body on
/// success. `what` names the operation for the human-readable message.
pub(crate) async fn expect_json<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Parse(format!("{what}: invalid response body: {e}")));
    }
    Err(error_for(status, response, what).await)
}

pub(crate) async fn expect_ok(
    response: reqwest::Response,
    what: &str,
) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(error_for(status, response, what).await)
}

async fn error_for(status: StatusCode, response: reqwest::Response, what: &str) -> ClientError {
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
        StatusCode::BAD_REQUEST => {
            if body.is_empty() {
                ClientError::Validation(format!("{what}: invalid request"))
            } else {
                ClientError::Validation(body)
            }
        }
        _ => ClientError::Transport(format!("{what} failed with status {status}")),
    }
}
