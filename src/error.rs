use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Planner error in {site}: {message}")]
    Planner { site: String, message: String },
}

impl DbError {
    /// Construct a planner error identifying the specific site that failed,
    /// per the stage's "report a diagnostic string identifying the site" policy.
    pub fn planner(site: &str, message: impl Into<String>) -> DbError {
        DbError::Planner {
            site: site.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}
