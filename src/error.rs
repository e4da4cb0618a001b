/// Error types for Tab Shelf
use thiserror::Error;

/// Errors surfaced by storage transactions and the backup codec.
///
/// Lookups by group id or tab index that miss are not errors: the group store
/// reports them as `false` / `None` and leaves the collection untouched.
#[derive(Debug, Error)]
pub enum ShelfError {
    /// Malformed import document or text
    #[error("Invalid format: {0}")]
    Format(String),

    /// Referenced group or tab does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The persistent key-value store rejected a read or write
    #[error("Storage error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShelfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ShelfError::Format("'groups' array missing".to_string());
        assert_eq!(err.to_string(), "Invalid format: 'groups' array missing");

        let err = ShelfError::Store("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Storage error: quota exceeded");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ShelfError = parse.unwrap_err().into();
        assert!(matches!(err, ShelfError::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }
}
