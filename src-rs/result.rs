use thiserror::Error;

/// Everything the backend can do to us, sorted by how it arrives: the
/// transport fails outright, the HTTP status is non-2xx, a 200 carries an
/// `{"status": "error"}` envelope, or the entity simply is not there.
#[derive(Error, Debug)]
pub enum DashError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    #[error("backend error: {0}")]
    Api(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl DashError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DashError::NotFound(_))
    }
}

pub type DashResult<T> = Result<T, DashError>;
