/// Errors from the storage layer.
///
/// # Examples
///
/// ```rust
/// use domwatch_storage::error::StorageError;
///
/// let err = StorageError::InvalidUrl {
///     url: "not a url".to_string(),
/// };
/// assert!(err.to_string().contains("not a url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A domain registration carried a URL that does not parse to a
    /// valid hostname.
    #[error("storage: URL '{url}' does not contain a valid hostname")]
    InvalidUrl { url: String },

    /// An underlying SQLite error.
    #[error("storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while creating the data directory.
    #[error("storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored column held a value that no longer parses into its enum
    /// (schema drift or manual edits).
    #[error("storage: corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
