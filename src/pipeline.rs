//! Translation pipeline
//!
//! Free text goes to the reasoning service, the reply is sanitized and
//! serialized, and the script is validated before anything is returned.
//! When the service is missing or its answer is unusable, the keyword
//! translator is tried, and failing that the safe fallback script is used.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::compiler::ast::Program;
use crate::compiler::heuristic::{Heuristic, heuristic_translate};
use crate::compiler::sanitize::{Sanitized, sanitize};
use crate::compiler::serialize::{FALLBACK_SCRIPT, serialize};
use crate::compiler::validate::validate_script;
use crate::config::TranslatorConfig;
use crate::error::{ReasonerError, TransportError};
use crate::reasoner::{ChatCompletionsReasoner, ReasoningService};

const DEFAULT_EXPLANATION: &str = "Program generated successfully.";
const FALLBACK_EXPLANATION: &str = "Using safe fallback program.";
const HEURISTIC_NOTE: &str = "Used deterministic local translator for this request.";

/// Result of one translation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResponse {
    /// Program behind `script`
    pub program: Program,
    /// Validated wire script, ready to transmit
    pub script: String,
    /// What the program does, or why the fallback was used
    pub explanation: String,
    /// Everything that was repaired, dropped or skipped along the way
    pub warnings: Vec<String>,
    /// Whether this is the safe fallback program
    pub fallback: bool,
}

impl TranslationResponse {
    fn fallback(mut warnings: Vec<String>, reason: impl Into<String>) -> Self {
        warnings.push(reason.into());
        Self {
            program: Program::default(),
            script: FALLBACK_SCRIPT.to_string(),
            explanation: FALLBACK_EXPLANATION.to_string(),
            warnings,
            fallback: true,
        }
    }
}

/// Channel that carries a script to the robot
pub trait Transport {
    /// Send `script` and wait up to `timeout` for the acknowledgement.
    fn deliver(&mut self, script: &str, timeout: Duration) -> Result<String, TransportError>;
}

/// Natural-language to wire-script translator
pub struct Translator {
    reasoner: Option<Box<dyn ReasoningService>>,
    heuristic_enabled: bool,
    notes: Vec<String>,
}

impl Translator {
    /// Translator over an explicit reasoning service.
    pub fn new(reasoner: Option<Box<dyn ReasoningService>>, heuristic_enabled: bool) -> Self {
        Self {
            reasoner,
            heuristic_enabled,
            notes: Vec::new(),
        }
    }

    /// Translator built from configuration.
    ///
    /// A missing API key is not fatal: the translator runs without a service
    /// and reports why on every request.
    pub fn from_config(config: &TranslatorConfig) -> Result<Self, ReasonerError> {
        if config.offline {
            return Ok(Self::new(None, config.heuristic_fallback));
        }
        match ChatCompletionsReasoner::new(config.reasoner.clone()) {
            Ok(reasoner) => Ok(Self::new(Some(Box::new(reasoner)), config.heuristic_fallback)),
            Err(ReasonerError::NotConfigured(reason)) => {
                warn!(%reason, "reasoning service disabled");
                let mut translator = Self::new(None, config.heuristic_fallback);
                translator.notes.push(reason);
                Ok(translator)
            }
            Err(err) => Err(err),
        }
    }

    /// Whether a reasoning service is attached
    pub fn has_reasoner(&self) -> bool {
        self.reasoner.is_some()
    }

    /// Translate a request into a validated script.
    pub fn translate(&self, message: &str) -> TranslationResponse {
        let message = message.trim();
        if message.is_empty() {
            return TranslationResponse::fallback(Vec::new(), "Request message is required.");
        }

        let mut warnings = Vec::new();
        let reply = match &self.reasoner {
            Some(reasoner) => match reasoner.request_program(message) {
                Ok(reply) => Some(reply),
                Err(err) => {
                    warn!(error = %err, "reasoning service failed");
                    warnings.push(format!("AI service unavailable: {err}"));
                    None
                }
            },
            None => {
                let reason = self
                    .notes
                    .first()
                    .map(String::as_str)
                    .unwrap_or("no reasoning service configured.");
                warnings.push(format!("AI service unavailable: {reason}"));
                None
            }
        };

        let Some(reply) = reply else {
            return self.heuristic_or_fallback(message, warnings);
        };

        let Sanitized {
            program,
            warnings: repairs,
        } = sanitize(&reply.program);
        warnings.extend(repairs);
        warnings.extend(reply.warnings);

        if program.is_empty() {
            warnings.push("AI returned an empty program.".to_string());
            return self.heuristic_or_fallback(message, warnings);
        }

        let explanation = reply
            .explanation
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());
        match finish(program, explanation, warnings) {
            Ok(response) => response,
            Err(warnings) => self.heuristic_or_fallback(message, warnings),
        }
    }

    /// Validate `script` and hand it to `transport`.
    pub fn transmit<T>(
        &self,
        transport: &mut T,
        script: &str,
        timeout: Duration,
    ) -> Result<String, TransportError>
    where
        T: Transport + ?Sized,
    {
        transmit(transport, script, timeout)
    }

    fn heuristic_or_fallback(&self, message: &str, mut warnings: Vec<String>) -> TranslationResponse {
        if !self.heuristic_enabled {
            return TranslationResponse::fallback(warnings, "Could not generate program automatically.");
        }
        let Some(Heuristic {
            program,
            explanation,
        }) = heuristic_translate(message)
        else {
            info!("no translation found, using fallback program");
            return TranslationResponse::fallback(warnings, "Could not generate program automatically.");
        };

        warnings.push(HEURISTIC_NOTE.to_string());
        match finish(program, explanation, warnings) {
            Ok(response) => response,
            Err(warnings) => TranslationResponse::fallback(warnings, "Could not generate program automatically."),
        }
    }
}

/// Validate `script` and hand it to `transport`.
///
/// Invalid scripts never reach the transport.
pub fn transmit<T>(transport: &mut T, script: &str, timeout: Duration) -> Result<String, TransportError>
where
    T: Transport + ?Sized,
{
    validate_script(script)?;
    transport.deliver(script, timeout)
}

// Serialize and validate; on failure the warnings come back with the reason.
fn finish(
    program: Program,
    explanation: String,
    mut warnings: Vec<String>,
) -> Result<TranslationResponse, Vec<String>> {
    let script = serialize(&program);
    if let Err(err) = validate_script(&script) {
        warn!(error = %err, script = %script, "generated script rejected");
        warnings.push(format!("Validation failed: {err}"));
        return Err(warnings);
    }

    info!(
        script_len = script.len(),
        warnings = warnings.len(),
        "translated request"
    );
    Ok(TranslationResponse {
        program,
        script,
        explanation,
        warnings,
        fallback: false,
    })
}
