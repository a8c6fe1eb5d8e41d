use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store directory not usable: {0}")]
    Directory(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace record: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("{0}")]
    Other(String),
}
