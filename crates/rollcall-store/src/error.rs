use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Case-insensitive name collision at registration time; the caller
    /// must choose another name.
    #[error("an identity named '{0}' already exists")]
    DuplicateName(String),
    /// Update or lookup on an unknown identity: a caller bug or a stale
    /// snapshot.
    #[error("no identity named '{0}'")]
    NotFound(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
