//! Unified error type for all store operations.

/// Things that can go wrong when using the store.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A required argument was missing (e.g. an empty path).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The path can't name a file on this platform.
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// File system problem (read, write, rename, mkdir).
    #[error("i/o error: {0}")]
    Io(String),
    /// The file content isn't valid for the configured serializer.
    #[error("parse error: {0}")]
    Parse(String),
    /// Failed to serialize the map to bytes.
    #[error("serialization error: {0}")]
    Serialize(String),
    /// The OS change notification could not be set up.
    #[error("watch error: {0}")]
    Watch(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.to_string())
        } else if err.is_syntax() || err.is_eof() || err.is_data() {
            Error::Parse(err.to_string())
        } else {
            Error::Serialize(err.to_string())
        }
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watch(err.to_string())
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_map_to_parse() {
        let err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        assert!(matches!(Error::from(err), Error::Parse(_)));
    }

    #[test]
    fn watcher_errors_map_to_watch() {
        let err = notify::Error::path_not_found().add_path("/gone/db.json".into());
        match Error::from(err) {
            Error::Watch(msg) => assert!(msg.contains("/gone/db.json"), "{msg}"),
            other => panic!("expected a watch error, got {other:?}"),
        }
    }

    #[test]
    fn display_carries_the_message() {
        let err = Error::InvalidPath("a\0b".into());
        assert!(err.to_string().starts_with("invalid path"));
    }
}
