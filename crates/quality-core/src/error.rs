use thiserror::Error;

/// Error type for quality estimation helpers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Codec name that is not in the catalogue
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    /// Quality category name that is not recognised
    #[error("Unknown quality category: {0}")]
    UnknownCategory(String),
}

/// Result type for quality estimation helpers
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::UnknownCodec("AMR".into()).to_string(), "Unknown codec: AMR");
        assert_eq!(
            Error::UnknownCategory("Superb".into()).to_string(),
            "Unknown quality category: Superb"
        );
    }
}
