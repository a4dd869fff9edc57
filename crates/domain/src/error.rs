/// Shared error type used across the BlueKit crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("project path does not exist: {0}")]
    ProjectPath(String),
}

pub type Result<T> = std::result::Result<T, Error>;
