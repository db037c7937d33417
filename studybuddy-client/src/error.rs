/// Everything the data service or a proxy function can throw at the app,
/// normalized to four cases the views know how to present.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network or server failure talking to the data service.
    #[error("{0}")]
    Transport(String),

    /// A required field is missing or malformed; shown inline, not toasted.
    #[error("{0}")]
    Validation(String),

    /// The response body was not what the contract promises.
    #[error("{0}")]
    Parse(String),

    /// The id refers to a row that no longer exists.
    #[error("{0} not found")]
    NotFound(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
