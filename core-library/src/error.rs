use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Stored JSON under `namespace` could not be decoded. The stored value
    /// is left untouched.
    #[error("Stored data under '{namespace}' is corrupted: {message}")]
    Corrupted { namespace: String, message: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Search failed: {0}")]
    Search(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
