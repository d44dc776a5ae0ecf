//! Error types for the MCTF core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for MCTF operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the MCTF core
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream file could not be opened
    #[error("unable to open \"{}\": {source}", .path.display())]
    FileOpen {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A stream ended before the expected frame or field was complete
    #[error("short read on \"{stream}\" at picture {picture}")]
    ShortRead {
        /// Which stream was being read
        stream: &'static str,
        /// Index of the picture or motion field being read
        picture: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Picture geometry incompatible with the requested block layout
    #[error("Geometry error: {0}")]
    Geometry(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a geometry error
    pub fn geometry<S: Into<String>>(msg: S) -> Self {
        Error::Geometry(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("pictures must be odd");
        assert_eq!(err.to_string(), "Configuration error: pictures must be odd");

        let err = Error::ShortRead {
            stream: "even",
            picture: 7,
        };
        assert_eq!(err.to_string(), "short read on \"even\" at picture 7");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
