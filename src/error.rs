use thiserror::Error;

/// Boxed error returned by resolver implementations and passed through untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid nameserver: {0}")]
    InvalidNameserver(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid expiration: {0}")]
    InvalidExpiration(String),

    #[error("Invalid attempts: {0}")]
    InvalidAttempts(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Entropy source failure: {0}")]
    EntropySource(String),

    #[error("Token expired; regenerate token")]
    TokenExpired,

    #[error("Invalid hash length {0}; regenerate token")]
    InvalidHash(usize),

    #[error(transparent)]
    Resolver(BoxError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    #[error("No token found for domain: {0}")]
    TokenNotFound(String),

    #[error("Token schema error: {0}")]
    Schema(String),

    #[error("Unsupported token schema version: {0}")]
    UnsupportedSchemaVersion(u32),
}

impl VerifyError {
    /// True for failures produced by the caller's operation context.
    pub fn is_context_error(&self) -> bool {
        matches!(self, VerifyError::Cancelled | VerifyError::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        VerifyError::Schema(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
