/// Error taxonomy shared by every engine error type, plus content loading errors.
use std::fmt;
use thiserror::Error;

/// Broad class of a failed engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A location, scene, choice or area id did not resolve.
    NotFound,
    /// An unlock condition or choice precondition evaluated false.
    PreconditionFailed,
    /// The operation is not valid in the current state.
    InvalidOperation,
    /// Content references something that does not exist.
    ContentIntegrity,
    /// A restored snapshot failed validation.
    CorruptSaveData,
}

impl ErrorKind {
    /// Whether the presentation layer can simply re-prompt the player.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ContentIntegrity | Self::CorruptSaveData)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::PreconditionFailed => "precondition failed",
            Self::InvalidOperation => "invalid operation",
            Self::ContentIntegrity => "content integrity error",
            Self::CorruptSaveData => "corrupt save data",
        };
        f.write_str(name)
    }
}

/// Failure loading or validating content tables.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("content integrity error: {0}")]
    Integrity(String),
}

impl ContentError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ContentIntegrity
    }
}
