//! Common error types used throughout rawdrop.

/// Common error type for rawdrop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every candidate name for a new file was already taken.
    #[error("No free file name for {name} after {attempts} attempts")]
    NameExhausted { name: String, attempts: u32 },
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("DSC_0001.NEF");
        assert_eq!(err.to_string(), "Not found: DSC_0001.NEF");

        let err = Error::invalid_input("empty file name");
        assert_eq!(err.to_string(), "Invalid input: empty file name");

        let err = Error::NameExhausted {
            name: "a.nef".into(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "No free file name for a.nef after 3 attempts");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
