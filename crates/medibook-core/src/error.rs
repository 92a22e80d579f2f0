use thiserror::Error;

/// Top-level error type for the booking assistant.
///
/// Subsystem crates define their own error types and convert from
/// `MedibookError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MedibookError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    /// The user already holds this date and time for a different booking.
    #[error("Slot already taken: {0}")]
    SlotTaken(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MedibookError {
    fn from(err: toml::de::Error) -> Self {
        MedibookError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MedibookError {
    fn from(err: toml::ser::Error) -> Self {
        MedibookError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MedibookError {
    fn from(err: serde_json::Error) -> Self {
        MedibookError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for booking assistant operations.
pub type Result<T> = std::result::Result<T, MedibookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MedibookError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(MedibookError, &str)> = vec![
            (
                MedibookError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                MedibookError::UserNotFound("u-1".to_string()),
                "User not found: u-1",
            ),
            (
                MedibookError::UserExists("u-1".to_string()),
                "User already exists: u-1",
            ),
            (
                MedibookError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MedibookError = io_err.into();
        assert!(matches!(err, MedibookError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: MedibookError = json_err.into();
        assert!(matches!(err, MedibookError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: MedibookError = toml_err.into();
        assert!(matches!(err, MedibookError::Config(_)));
    }
}
