use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StashError {
    #[error("Tag extraction failed: {0}")]
    Extraction(String),

    #[error("Tag extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Reference tag database unavailable: {0}")]
    MissingReferenceDatabase(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("Malformed PNG: {0}")]
    MalformedPng(String),

    #[error("PNG encoding failed: {0}")]
    PngEncoding(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StashError>;
