use thiserror::Error;

/// Errors produced by model constructors and validation routines.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid geofence: {0}")]
    InvalidFence(String),

    #[error("invalid position: {0}")]
    InvalidPosition(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
