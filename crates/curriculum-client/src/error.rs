use curriculum_core::types::AssetRole;
use curriculum_core::CurriculumError;
use std::fmt;
use thiserror::Error;

/// Which write of the finalize step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStage {
    DeleteOld,
    UpdateMetadata,
}

impl fmt::Display for FinalizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeStage::DeleteOld => f.write_str("delete of superseded asset"),
            FinalizeStage::UpdateMetadata => f.write_str("item metadata update"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode {context} response: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CurriculumError),

    #[error("thumbnail derivation failed: {0}")]
    Thumbnail(String),

    /// Saving a new order failed; the scope was restored to its snapshot.
    #[error("saving order for {scope} failed, reverted to last saved order: {source}")]
    OrderPersist {
        scope: String,
        #[source]
        source: Box<ClientError>,
    },

    /// An asset PUT failed and took the whole job down with it.
    #[error("transfer of {role} asset '{file_name}' failed: {source}")]
    Transfer {
        role: AssetRole,
        file_name: String,
        /// Keys of sibling assets that already landed and are now unreferenced.
        orphaned_keys: Vec<String>,
        #[source]
        source: Box<ClientError>,
    },

    #[error("finalize failed during {stage}: {source}")]
    Finalize {
        stage: FinalizeStage,
        #[source]
        source: Box<ClientError>,
    },

    /// Internal signal that a shared cancellation token fired. Never
    /// returned from the public upload API; jobs report
    /// `UploadOutcome::Cancelled` instead.
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}
