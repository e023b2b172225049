use thiserror::Error;

/// Reasons an import payload is rejected. Validation fails closed: nothing is
/// applied when any of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Import file is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Import file must contain a JSON object")]
    NotAnObject,
    #[error("Import file has no collections array")]
    MissingCollections,
    #[error("Collection {index} is malformed")]
    MalformedCollection { index: usize },
    #[error("Tab {index} in collection {collection} is malformed")]
    MalformedTab { collection: usize, index: usize },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Import(#[from] ImportError),
}

pub type StoreResult<T> = Result<T, StoreError>;
