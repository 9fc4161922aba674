use thiserror::Error;

#[derive(Debug, Error)]
pub enum CurriculumError {
    #[error("not initialized: run 'curriculum config init'")]
    NotInitialized,

    #[error("scope not loaded: {0}")]
    ScopeNotLoaded(String),

    #[error("item '{item}' not found in scope {scope}")]
    ItemNotFound { scope: String, item: String },

    #[error("scope {0} has no items to order")]
    EmptyScope(String),

    #[error("invalid order list: {0}")]
    InvalidOrder(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("asset '{file_name}' is {size} bytes, above the {limit} byte limit")]
    AssetTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("asset '{0}' is empty")]
    EmptyAsset(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CurriculumError>;
