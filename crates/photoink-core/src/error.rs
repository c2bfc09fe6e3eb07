//! Error types surfaced to callers.

use crate::view_state::ViewHandle;
use thiserror::Error;

/// Errors reported by the save family of operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Bitmap unavailable: {0}")]
    BitmapUnavailable(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl SaveError {
    /// Classify a filesystem error, keeping permission failures distinct.
    pub fn from_io(context: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                SaveError::PermissionDenied(format!("{}: {}", context, err))
            }
            _ => SaveError::Io(format!("{}: {}", context, err)),
        }
    }
}

/// Result type for save operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// Errors from direct [`ViewState`](crate::view_state::ViewState) manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewStateError {
    #[error("Handle already present: {0:?}")]
    AlreadyPresent(ViewHandle),
}
