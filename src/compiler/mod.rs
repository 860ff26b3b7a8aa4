//! Compiler from program descriptions to the EMMI wire protocol.
//!
//! Descriptions arrive as untrusted JSON, usually from a language model. The
//! sanitizer turns them into a typed [`Program`], the inference pass decides
//! which subsystems the robot must initialise, and the serializer renders the
//! `|I|..|S|..|L|..|` script the firmware reads. None of these steps fail;
//! they record warnings instead.

/// Program tree and init flags.
pub mod ast;
/// Keyword translator used when no reasoning service is available.
pub mod heuristic;
/// Hardware-flag inference.
pub mod infer;
/// Reader for wire scripts.
pub mod parser;
/// Whitelisting sanitizer for untrusted descriptions.
pub mod sanitize;
/// Token serializer.
pub mod serialize;
/// Structural checks on rendered scripts.
pub mod validate;
/// Scalar values and symbolic references.
pub mod value;

pub use ast::{
    AssignOp, Assignment, CompareOp, Expression, InitFlag, Node, Program, SwitchCase,
};
pub use heuristic::{Heuristic, heuristic_translate, parse_requested_delay_ms};
pub use infer::{command_flag, infer_init_flags};
pub use parser::{parse_script, parse_token_list};
pub use sanitize::{Sanitized, sanitize};
pub use serialize::{FALLBACK_SCRIPT, serialize};
pub use validate::validate_script;
pub use value::{Sensor, Symbol, Value, VarSlot, VarType};

use crate::error::CompileResult;

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    /// Sanitized program.
    pub program: Program,
    /// Rendered, validated script.
    pub script: String,
    /// Sanitizer warnings.
    pub warnings: Vec<String>,
}

/// Sanitize, serialize and validate a description in one step.
pub fn compile(raw: &serde_json::Value) -> CompileResult<Compiled> {
    let Sanitized { program, warnings } = sanitize(raw);
    let script = serialize(&program);
    validate_script(&script)?;
    Ok(Compiled {
        program,
        script,
        warnings,
    })
}
