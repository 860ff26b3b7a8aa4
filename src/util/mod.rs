//! Small helpers shared across modules.

/// Views over untrusted `serde_json` trees.
pub mod json;
