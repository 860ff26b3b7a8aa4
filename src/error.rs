//! Error types for the EMMI compiler
//!
//! The sanitizer, inference pass, serializer and block mapper are total and
//! report defects as warnings. The errors below cover the places that can
//! genuinely fail: reading wire scripts back, talking to collaborators, and
//! the transport hand-off.

use std::time::Duration;
use thiserror::Error;

use crate::mapper::BlockId;

/// Errors raised while parsing or validating a wire-protocol script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The script does not follow the token grammar
    #[error("invalid script syntax at byte {position}: {message}")]
    Syntax {
        /// Byte offset where parsing stopped
        position: usize,
        /// Description of the problem
        message: String,
    },

    /// The script failed a structural check (markers, delimiters, arguments)
    #[error("script validation failed: {0}")]
    Validation(String),
}

/// Convenience result alias for compiler operations
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Errors surfaced by the reasoning-service collaborator
#[derive(Debug, Error)]
pub enum ReasonerError {
    /// No credentials or endpoint are configured
    #[error("{0}")]
    NotConfigured(String),

    /// The HTTP exchange itself failed
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// The completion payload carried no text
    #[error("completion payload missing response text")]
    EmptyCompletion,

    /// The completion text held no JSON object
    #[error("AI returned invalid JSON")]
    InvalidJson,
}

/// Errors reported by a visual workspace while instantiating blocks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    /// The workspace has no definition for the requested block kind
    #[error("Missing block type: {0}")]
    UnknownKind(String),

    /// The attachment refers to a block the workspace does not hold
    #[error("Block {0} not found in workspace")]
    UnknownBlock(BlockId),

    /// The workspace refused the block for another reason
    #[error("Block {kind} rejected: {detail}")]
    Rejected {
        /// Requested block kind
        kind: String,
        /// Why the workspace refused it
        detail: String,
    },
}

/// Errors raised when handing a script to the transport layer
#[derive(Debug, Error)]
pub enum TransportError {
    /// The script failed validation and was never transmitted
    #[error("script rejected before transmission: {0}")]
    Rejected(#[from] CompileError),

    /// No delivery confirmation arrived in time
    #[error("delivery not confirmed within {0:?}")]
    Timeout(Duration),

    /// The link to the device dropped
    #[error("transport disconnected: {0}")]
    Disconnected(String),
}
