//! EMMI Script – compiler from robot program descriptions to the EMMI wire protocol
//!
//! This crate implements:
//! - A whitelisting sanitizer for untrusted, model-generated program trees
//! - Hardware-flag inference and the `|I|..|S|..|L|..|` token serializer
//! - A reader and structural validator for wire scripts
//! - A keyword translator for when no reasoning service is available
//! - Mapping of programs onto visual block workspaces

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Sanitizer, inference, serializer, parser and validator
pub mod compiler;
/// Translator configuration
pub mod config;
/// Error types
pub mod error;
/// Program to visual-block mapping
pub mod mapper;
/// End-to-end translation of free-text requests
pub mod pipeline;
/// Reasoning-service client
pub mod reasoner;
/// Shared helpers
pub mod util;

// Re-export key types for convenience
pub use compiler::{Compiled, Program, compile, parse_script, sanitize, serialize, validate_script};
pub use config::TranslatorConfig;
pub use error::{CompileError, CompileResult};
pub use pipeline::{TranslationResponse, Translator};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
