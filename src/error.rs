use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TwlError {
    #[error("invalid forecast region: {0}")]
    InvalidRegion(String),

    #[error("invalid forecast cycle: {0}")]
    InvalidCycle(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("object store request failed: {0}")]
    StoreHttp(String),

    #[error("object store returned status {status}: {message}")]
    StoreStatus { status: u16, message: String },

    #[error("metadata feed request failed: {0}")]
    FeedHttp(String),

    #[error("metadata feed returned status {status}: {message}")]
    FeedStatus { status: u16, message: String },

    #[error("metadata feed returned malformed CSV: {0}")]
    FeedParse(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("shef decode failed: {0}")]
    DecodeFailed(String),

    #[error("no bulletin could be retrieved for any configured region")]
    NoData,

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
