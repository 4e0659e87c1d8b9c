use std::path::PathBuf;

/// Errors raised by the sheet store and the argument parser.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// The sheet file exists but is not a valid sheet document.
    #[error("Sheet at {} is corrupt: {source}", path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No entry for the requested person.
    #[error("'{0}' not found")]
    NotFound(String),

    /// Malformed command line input.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SheetError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SheetError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;
