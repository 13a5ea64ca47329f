//! Error types for the shared data model

use thiserror::Error;

/// Errors raised while building or parsing shared types
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("Malformed version string: {0:?}")]
    MalformedVersion(String),

    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(#[from] serde_json::Error),

    #[error("Declaration has no {0:?} object")]
    MissingDeclarationBody(&'static str),
}

/// Result type for shared type operations
pub type Result<T> = std::result::Result<T, TypesError>;
