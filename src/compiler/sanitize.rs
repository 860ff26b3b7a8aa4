//! Sanitizer for untrusted program descriptions.
//!
//! Every field of every node type has an explicit fallback. Anything outside
//! the whitelist is dropped or rewritten and a warning names the path where
//! it happened, e.g. `loop[2].expr.left`.

use serde_json::Value as Json;
use tracing::debug;

use super::ast::{
    AssignOp, Assignment, CompareOp, Expression, InitFlag, Node, Program, SwitchCase,
    is_command_token,
};
use super::infer::infer_init_flags;
use super::value::{Symbol, Value, VarSlot, VarType};
use crate::util::json::{ObjectView, as_object};

/// Deepest node-list nesting kept; top-level phases are depth 0.
pub const MAX_DEPTH: usize = 6;
/// Longest node list kept.
pub const MAX_NODES: usize = 200;
/// Most switch cases kept.
pub const MAX_CASES: usize = 12;
/// Longest string value kept, in characters.
pub const MAX_TEXT_CHARS: usize = 120;

/// Result of sanitizing a description.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    /// Structurally valid program.
    pub program: Program,
    /// Human-readable notes on everything that was dropped or rewritten.
    pub warnings: Vec<String>,
}

/// Turn an arbitrary JSON tree into a well-formed [`Program`].
///
/// Accepts `{"program": {...}}` or the program object itself. Never fails.
pub fn sanitize(raw: &Json) -> Sanitized {
    let mut sanitizer = Sanitizer::default();
    let program = sanitizer.program(raw);
    debug!(
        setup = program.setup.len(),
        main_loop = program.main_loop.len(),
        warnings = sanitizer.warnings.len(),
        "sanitized program description"
    );
    Sanitized {
        program,
        warnings: sanitizer.warnings,
    }
}

#[derive(Default)]
struct Sanitizer {
    warnings: Vec<String>,
}

impl Sanitizer {
    fn warn(&mut self, path: &str, message: impl AsRef<str>) {
        self.warnings.push(format!("{path}: {}", message.as_ref()));
    }

    fn program(&mut self, raw: &Json) -> Program {
        let source = match raw.get("program") {
            Some(inner @ Json::Object(_)) => inner,
            _ => raw,
        };
        let Some(object) = as_object(source) else {
            self.warn("program", "expected an object, using an empty program.");
            return Program::default();
        };

        let pairing = self.init_flags(object.field("initFlags"));
        let setup = self.nodes(object.field("setup"), 0, "setup");
        let main_loop = self.nodes(object.field("loop"), 0, "loop");

        // Enumerated flags are recomputed from what the program actually uses.
        let mut init_flags = infer_init_flags(&setup, &main_loop);
        init_flags.extend(pairing);

        Program {
            init_flags,
            setup,
            main_loop,
        }
    }

    fn init_flags(&mut self, raw: Option<&Json>) -> Vec<InitFlag> {
        let Some(raw) = raw else {
            return Vec::new();
        };
        let Some(items) = raw.as_array() else {
            self.warn("initFlags", "expected a list, ignored.");
            return Vec::new();
        };

        let mut pairing = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Some(text) = item.as_str() else {
                self.warn(&format!("initFlags[{index}]"), "non-string flag dropped.");
                continue;
            };
            let token = text.trim();
            if token.is_empty() {
                continue;
            }
            match InitFlag::from_token(token) {
                Some(flag @ InitFlag::Pairing(_)) => {
                    if !pairing.contains(&flag) {
                        pairing.push(flag);
                    }
                }
                Some(_) => {}
                None => self
                    .warnings
                    .push(format!("Dropped unsupported init flag: {token}")),
            }
        }
        pairing
    }

    fn nodes(&mut self, raw: Option<&Json>, depth: usize, path: &str) -> Vec<Node> {
        let items = match raw {
            None => return Vec::new(),
            Some(Json::Array(items)) => items,
            Some(_) => {
                self.warn(path, "expected a node list, ignored.");
                return Vec::new();
            }
        };

        if depth > MAX_DEPTH {
            if !items.is_empty() {
                self.warn(path, "maximum nesting depth exceeded, body truncated.");
            }
            return Vec::new();
        }

        let mut output = Vec::new();
        for (index, raw) in items.iter().enumerate() {
            if output.len() >= MAX_NODES {
                break;
            }
            let label = format!("{path}[{index}]");
            if let Some(node) = self.node(raw, depth, &label) {
                output.push(node);
            }
        }

        if items.len() > MAX_NODES {
            self.warn(path, format!("node list trimmed to {MAX_NODES} entries."));
        }
        output
    }

    fn node(&mut self, raw: &Json, depth: usize, path: &str) -> Option<Node> {
        let Some(object) = as_object(raw) else {
            self.warn(path, "skipped invalid node.");
            return None;
        };

        let kind = object.field_str("type").map(str::trim).unwrap_or_default();
        match kind {
            "cmd" => self.command(object, path),
            "delay" => Some(Node::Delay {
                ms: self.delay_ms(object, path),
            }),
            "set_var" => Some(Node::Assign(self.assignment(object, path))),
            "if" => Some(Node::If {
                expr: self.expression(object.field("expr"), &format!("{path}.expr")),
                then: self.nodes(object.field("then"), depth + 1, &format!("{path}.then")),
                otherwise: self.nodes(object.field("else"), depth + 1, &format!("{path}.else")),
            }),
            "while" => Some(Node::While {
                expr: self.expression(object.field("expr"), &format!("{path}.expr")),
                body: self.nodes(object.field("body"), depth + 1, &format!("{path}.body")),
            }),
            "for" => Some(self.for_loop(object, depth, path)),
            "switch" => Some(self.switch(object, depth, path)),
            "break" => Some(Node::Break),
            "" => {
                self.warn(path, "node missing type, skipped.");
                None
            }
            other => {
                self.warn(path, format!("unsupported node type \"{other}\" skipped."));
                None
            }
        }
    }

    fn command(&mut self, object: ObjectView<'_>, path: &str) -> Option<Node> {
        let token = object
            .field_str("cmd")
            .map(|cmd| cmd.trim().to_ascii_uppercase())
            .unwrap_or_default();
        if token.is_empty() {
            self.warn(path, "cmd missing token.");
            return None;
        }
        if !is_command_token(&token) {
            self.warn(path, format!("invalid cmd token \"{token}\" skipped."));
            return None;
        }
        Some(Node::Command { cmd: token })
    }

    fn delay_ms(&mut self, object: ObjectView<'_>, path: &str) -> u32 {
        let label = format!("{path}.ms");
        let Some(ms) = object.field_number("ms").map(f64::round) else {
            self.warn(&label, "missing or non-numeric delay, using 0.");
            return 0;
        };
        if ms < 0.0 {
            self.warn(&label, "negative delay clamped to 0.");
            return 0;
        }
        if ms > f64::from(u32::MAX) {
            self.warn(&label, format!("delay clamped to {}.", u32::MAX));
            return u32::MAX;
        }
        ms as u32
    }

    fn assignment(&mut self, object: ObjectView<'_>, path: &str) -> Assignment {
        let var_type = match object.field_str("varType") {
            Some(code) => {
                let upper = code.trim().to_ascii_uppercase();
                let mut chars = upper.chars();
                match (chars.next(), chars.next()) {
                    (Some(code), None) => VarType::from_code(code),
                    _ => None,
                }
                .unwrap_or_else(|| {
                    self.warn(
                        &format!("{path}.varType"),
                        format!("unsupported variable type \"{code}\", using I."),
                    );
                    VarType::Int
                })
            }
            None => {
                self.warn(&format!("{path}.varType"), "missing variable type, using I.");
                VarType::Int
            }
        };

        let index = match object.field_number("index").map(f64::round) {
            Some(index) if (1.0..=5.0).contains(&index) => index as i64,
            Some(index) => {
                self.warn(&format!("{path}.index"), "slot index clamped to 1..5.");
                if index < 1.0 { 1 } else { 5 }
            }
            None => {
                self.warn(&format!("{path}.index"), "missing slot index, using 1.");
                1
            }
        };

        let op = match object.field_str("op").map(str::trim) {
            Some("=") => AssignOp::Assign,
            Some("+") => AssignOp::Increment,
            other => {
                let shown = other.unwrap_or_default();
                self.warn(
                    &format!("{path}.op"),
                    format!("unsupported assignment op \"{shown}\", using =."),
                );
                AssignOp::Assign
            }
        };

        Assignment {
            target: VarSlot::clamped(var_type, index),
            op,
            value: self.scalar(object.field("value"), &format!("{path}.value")),
        }
    }

    fn for_loop(&mut self, object: ObjectView<'_>, depth: usize, path: &str) -> Node {
        let start = self.integer(object, "start", 0, path);
        let end = self.integer(object, "end", 0, path);
        let mut step = self.integer(object, "step", 1, path);
        if step == 0 {
            self.warn(&format!("{path}.step"), "step 0 replaced with 1.");
            step = 1;
        }
        Node::For {
            start,
            end,
            step,
            body: self.nodes(object.field("body"), depth + 1, &format!("{path}.body")),
        }
    }

    fn integer(&mut self, object: ObjectView<'_>, key: &str, default: i32, path: &str) -> i32 {
        let label = format!("{path}.{key}");
        let Some(value) = object.field_number(key).map(f64::round) else {
            self.warn(&label, format!("missing or non-numeric value, using {default}."));
            return default;
        };
        let (min, max) = (f64::from(i32::MIN), f64::from(i32::MAX));
        if !(min..=max).contains(&value) {
            self.warn(&label, "value clamped to the 32-bit range.");
        }
        value.clamp(min, max) as i32
    }

    fn switch(&mut self, object: ObjectView<'_>, depth: usize, path: &str) -> Node {
        let value = self.scalar(object.field("value"), &format!("{path}.value"));

        let cases_label = format!("{path}.cases");
        let raw_cases: &[Json] = match object.field("cases") {
            None => &[],
            Some(Json::Array(items)) => items,
            Some(_) => {
                self.warn(&cases_label, "expected a case list, ignored.");
                &[]
            }
        };
        if raw_cases.len() > MAX_CASES {
            self.warn(&cases_label, format!("case list trimmed to {MAX_CASES} entries."));
        }

        let mut cases = Vec::new();
        for (index, entry) in raw_cases.iter().take(MAX_CASES).enumerate() {
            let label = format!("{cases_label}[{index}]");
            let entry = as_object(entry);
            let matches = self.scalar(
                entry.and_then(|case| case.field("match")),
                &format!("{label}.match"),
            );
            let body = self.nodes(
                entry.and_then(|case| case.field("body")),
                depth + 1,
                &format!("{label}.body"),
            );
            cases.push(SwitchCase { matches, body });
        }

        Node::Switch {
            value,
            cases,
            default: self.nodes(object.field("default"), depth + 1, &format!("{path}.default")),
        }
    }

    fn expression(&mut self, raw: Option<&Json>, path: &str) -> Expression {
        let Some(object) = raw.and_then(as_object) else {
            self.warn(path, "invalid expression, replaced with 1==0.");
            return Expression::never();
        };

        let symbol = object.field_str("op").map(str::trim).unwrap_or_default();
        let op = CompareOp::parse(symbol).unwrap_or_else(|| {
            self.warn(path, format!("unsupported op \"{symbol}\", replaced with =="));
            CompareOp::Eq
        });

        Expression {
            op,
            left: self.scalar(object.field("left"), &format!("{path}.left")),
            right: self.scalar(object.field("right"), &format!("{path}.right")),
        }
    }

    fn scalar(&mut self, raw: Option<&Json>, path: &str) -> Value {
        match raw {
            Some(Json::Number(num)) => {
                if let Some(int) = num.as_i64() {
                    return Value::Integer(int);
                }
                match num.as_f64().filter(|float| float.is_finite()) {
                    Some(float) => Value::Float(float),
                    None => {
                        self.warn(path, "non-finite number replaced with 0.");
                        Value::zero()
                    }
                }
            }
            Some(Json::Bool(flag)) => Value::Boolean(*flag),
            Some(Json::String(text)) => self.text(text, path),
            _ => {
                self.warn(path, "unsupported value type, replaced with 0.");
                Value::zero()
            }
        }
    }

    fn text(&mut self, raw: &str, path: &str) -> Value {
        let trimmed = raw.trim();
        let mut text: String = trimmed.chars().filter(|c| !is_reserved(*c)).collect();
        if text.len() != trimmed.len() {
            self.warn(path, "removed characters reserved by the wire protocol.");
            text = text.trim().to_string();
        }

        if text.chars().count() > MAX_TEXT_CHARS {
            self.warn(path, format!("string truncated to {MAX_TEXT_CHARS} chars."));
            text = text.chars().take(MAX_TEXT_CHARS).collect();
            text.truncate(text.trim_end().len());
        }

        match Symbol::parse(&text) {
            Some(symbol) => Value::Symbol(symbol),
            None => Value::Text(text),
        }
    }
}

// These would break token or argument boundaries on the device.
fn is_reserved(c: char) -> bool {
    c.is_control() || matches!(c, '|' | '{' | '}' | '(' | ')' | ',')
}
