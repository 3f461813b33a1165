use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundleError {
    /// Bad magic number, truncated index, or a structurally invalid bundle.
    #[error("Bundle format error: {0}")]
    Format(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Bundle already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// True for failures caused by one record's bytes. The reader stores these
    /// on the record and keeps scanning; anything else is returned to the caller.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            BundleError::Decode(_)
                | BundleError::UnsupportedFormat(_)
                | BundleError::Format(_)
                | BundleError::InvalidDimensions(_, _)
                | BundleError::IllegalArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BundleError>;
