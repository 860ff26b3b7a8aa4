//! Reader for the EMMI wire protocol, the inverse of the serializer.
//!
//! Parsing a rendered program and rendering it again yields the same text.
//! Values that the serializer would have printed verbatim are kept verbatim.

use std::str::FromStr;

use super::ast::{
    AssignOp, Assignment, CompareOp, Expression, InitFlag, Node, Program, SwitchCase,
};
use super::serialize::text_literal;
use super::value::{Symbol, Value, VarSlot, VarType, is_numeric_literal, scan_quoted};
use crate::error::{CompileError, CompileResult};

/// Deepest body nesting the parser follows before giving up.
pub const MAX_PARSE_DEPTH: usize = 64;

/// Parse a full `|I|..|S|..|L|..|` script.
pub fn parse_script(script: &str) -> CompileResult<Program> {
    let mut parser = Parser::new(script);
    parser.expect("|I|")?;
    let init_flags = parser.parse_flags()?;
    parser.expect("|S|")?;
    let (setup, main_loop) = parser.parse_phases()?;
    Ok(Program {
        init_flags,
        setup,
        main_loop,
    })
}

/// Parse a bare `|`-separated token stream such as `ERN|D200|ERF`.
///
/// Leading and trailing separators are ignored.
pub fn parse_token_list(text: &str) -> CompileResult<Vec<Node>> {
    let trimmed = text.trim().trim_matches('|');
    let mut parser = Parser::new(trimmed);
    let mut nodes = Vec::new();
    if parser.eof() {
        return Ok(nodes);
    }
    loop {
        nodes.push(parser.parse_token()?);
        if parser.eof() {
            return Ok(nodes);
        }
        parser.expect("|")?;
    }
}

#[derive(Clone, Copy)]
struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
            depth: 0,
        }
    }

    fn eof(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.index..]
    }

    fn at(&self, literal: &str) -> bool {
        self.rest().starts_with(literal)
    }

    fn expect(&mut self, literal: &str) -> CompileResult<()> {
        if self.at(literal) {
            self.index += literal.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected `{literal}`")))
        }
    }

    fn parse_flags(&mut self) -> CompileResult<Vec<InitFlag>> {
        let mut flags = Vec::new();
        while !self.at("|S|") {
            if !flags.is_empty() {
                self.expect("|")?;
            }
            let start = self.index;
            while self.current().is_some_and(|b| b != b'|') {
                self.index += 1;
            }
            let token = &self.src[start..self.index];
            let flag = InitFlag::from_token(token).ok_or_else(|| CompileError::Syntax {
                position: start,
                message: format!("unknown init flag `{token}`"),
            })?;
            flags.push(flag);
        }
        Ok(flags)
    }

    // A setup token list may legitimately contain an `L` command, so every
    // `|L|` is a candidate boundary; the first one whose remainder parses wins.
    fn parse_phases(&mut self) -> CompileResult<(Vec<Node>, Vec<Node>)> {
        let mut setup = Vec::new();
        let mut last_error = None;
        loop {
            if self.at("|L|") {
                let mut attempt = *self;
                attempt.index += 3;
                match attempt.parse_loop_phase() {
                    Ok(main_loop) => return Ok((setup, main_loop)),
                    Err(err) => last_error = Some(err),
                }
            }
            if !setup.is_empty() {
                if let Err(err) = self.expect("|") {
                    return Err(last_error.unwrap_or(err));
                }
            }
            match self.parse_token() {
                Ok(node) => setup.push(node),
                Err(err) => return Err(last_error.unwrap_or(err)),
            }
        }
    }

    fn parse_loop_phase(&mut self) -> CompileResult<Vec<Node>> {
        let mut nodes = Vec::new();
        while self.rest() != "|" {
            if !nodes.is_empty() {
                self.expect("|")?;
            }
            nodes.push(self.parse_token()?);
        }
        Ok(nodes)
    }

    fn parse_body(&mut self) -> CompileResult<Vec<Node>> {
        self.expect("{")?;
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(self.error("bodies nested too deeply"));
        }
        let mut nodes = Vec::new();
        if self.current() == Some(b'}') {
            self.index += 1;
            return Ok(nodes);
        }

        self.depth += 1;
        self.expect("|")?;
        loop {
            nodes.push(self.parse_token()?);
            if self.at("|}") {
                self.index += 2;
                break;
            }
            self.expect("|")?;
        }
        self.depth -= 1;
        Ok(nodes)
    }

    fn parse_token(&mut self) -> CompileResult<Node> {
        match (self.current(), self.bytes.get(self.index + 1).copied()) {
            (Some(b'C'), Some(b'(')) => self.parse_if(),
            (Some(b'W'), Some(b'(')) => self.parse_while(),
            (Some(b'F'), Some(b'(')) => self.parse_for(),
            (Some(b'K'), Some(b'(')) => self.parse_switch(),
            (Some(b'G'), Some(b'(')) => self.parse_assign(),
            _ => self.parse_word(),
        }
    }

    fn parse_word(&mut self) -> CompileResult<Node> {
        let start = self.index;
        while self
            .current()
            .is_some_and(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
        {
            self.index += 1;
        }
        let word = &self.src[start..self.index];
        if word.is_empty() {
            return Err(self.error("expected a token"));
        }

        if word == "X" {
            return Ok(Node::Break);
        }
        if let Some(ms) = word.strip_prefix('D').and_then(canonical::<u32>) {
            return Ok(Node::Delay { ms });
        }
        Ok(Node::Command {
            cmd: word.to_string(),
        })
    }

    fn parse_if(&mut self) -> CompileResult<Node> {
        self.expect("C(")?;
        let expr = self.parse_expr()?;
        self.expect(")")?;
        let then = self.parse_body()?;
        let otherwise = self.parse_body()?;
        Ok(Node::If {
            expr,
            then,
            otherwise,
        })
    }

    fn parse_while(&mut self) -> CompileResult<Node> {
        self.expect("W(")?;
        let expr = self.parse_expr()?;
        self.expect(")")?;
        let body = self.parse_body()?;
        Ok(Node::While { expr, body })
    }

    fn parse_for(&mut self) -> CompileResult<Node> {
        self.expect("F(")?;
        let start = self.parse_int()?;
        self.expect("-")?;
        let end = self.parse_int()?;
        self.expect(",")?;
        let step = self.parse_int()?;
        self.expect(")")?;
        if step == 0 {
            return Err(self.error("for step must not be 0"));
        }
        let body = self.parse_body()?;
        Ok(Node::For {
            start,
            end,
            step,
            body,
        })
    }

    fn parse_switch(&mut self) -> CompileResult<Node> {
        self.expect("K(")?;
        let value = self.parse_value()?;
        self.expect(", ")?;

        let mut cases = Vec::new();
        loop {
            self.expect("(")?;
            if self.at("D)") {
                self.index += 2;
                let default = self.parse_body()?;
                self.expect(")")?;
                return Ok(Node::Switch {
                    value,
                    cases,
                    default,
                });
            }
            let matches = self.parse_value()?;
            self.expect(")")?;
            let body = self.parse_body()?;
            self.expect(" ")?;
            cases.push(SwitchCase { matches, body });
        }
    }

    fn parse_assign(&mut self) -> CompileResult<Node> {
        self.expect("G(")?;
        let var_type = self
            .current()
            .and_then(|b| VarType::from_code(b as char))
            .ok_or_else(|| self.error("expected variable type I, F, C, S or B"))?;
        self.index += 1;
        self.expect(",")?;
        let target = self
            .current()
            .filter(u8::is_ascii_digit)
            .and_then(|b| VarSlot::new(var_type, b - b'0'))
            .ok_or_else(|| self.error("expected slot index 1..5"))?;
        self.index += 1;
        self.expect(",")?;
        let op = match self.current() {
            Some(b'=') => AssignOp::Assign,
            Some(b'+') => AssignOp::Increment,
            _ => return Err(self.error("expected assignment op `=` or `+`")),
        };
        self.index += 1;
        self.expect(",")?;
        let value = self.parse_value()?;
        self.expect(")")?;
        Ok(Node::Assign(Assignment { target, op, value }))
    }

    fn parse_expr(&mut self) -> CompileResult<Expression> {
        self.expect("O")?;
        let op = ["!=", ">=", "<=", "=", ">", "<"]
            .into_iter()
            .find(|symbol| self.at(symbol))
            .and_then(CompareOp::from_wire)
            .ok_or_else(|| self.error("expected comparison operator"))?;
        self.index += op.wire().len();
        self.expect(",")?;
        let left = self.parse_value()?;
        self.expect(",")?;
        let right = self.parse_value()?;
        Ok(Expression { op, left, right })
    }

    fn parse_int(&mut self) -> CompileResult<i32> {
        let start = self.index;
        if self.current() == Some(b'-') {
            self.index += 1;
        }
        while self.current().is_some_and(|b| b.is_ascii_digit()) {
            self.index += 1;
        }
        self.src[start..self.index].parse::<i32>().map_err(|_| CompileError::Syntax {
            position: start,
            message: "expected a 32-bit integer".to_string(),
        })
    }

    fn parse_value(&mut self) -> CompileResult<Value> {
        let start = self.index;
        if let Some(quote @ (b'"' | b'\'')) = self.current() {
            let len = scan_quoted(self.rest())
                .ok_or_else(|| self.error("unterminated quoted value"))?;
            let raw = &self.src[start..start + len];
            self.index += len;
            if quote == b'"' {
                let decoded = unescape(&raw[1..raw.len() - 1]);
                if text_literal(&decoded) == raw {
                    return Ok(Value::Text(decoded));
                }
            }
            return Ok(Value::Text(raw.to_string()));
        }

        while self
            .current()
            .is_some_and(|b| !matches!(b, b',' | b')' | b'(' | b'|' | b'{' | b'}'))
        {
            self.index += 1;
        }
        let raw = &self.src[start..self.index];
        if let Some(symbol) = Symbol::parse(raw) {
            return Ok(Value::Symbol(symbol));
        }
        if !is_numeric_literal(raw) {
            return Err(CompileError::Syntax {
                position: start,
                message: format!("expected a value, found `{raw}`"),
            });
        }
        if let Some(int) = canonical::<i64>(raw) {
            return Ok(Value::Integer(int));
        }
        if let Some(float) = canonical::<f64>(raw).filter(|float| float.is_finite()) {
            return Ok(Value::Float(float));
        }
        // Non-canonical spellings such as `007` survive as verbatim text.
        Ok(Value::Text(raw.to_string()))
    }

    fn error(&self, message: &str) -> CompileError {
        CompileError::Syntax {
            position: self.index,
            message: message.to_string(),
        }
    }
}

// Parses `text` only when printing the result reproduces it exactly.
fn canonical<T: FromStr + ToString>(text: &str) -> Option<T> {
    text.parse::<T>()
        .ok()
        .filter(|value| value.to_string() == text)
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::serialize::serialize;
    use crate::compiler::value::Sensor;

    #[test]
    fn parses_minimal_script() {
        let program = parse_script("|I|E|S||L|ERN|").expect("parse");
        assert_eq!(program.init_flags, vec![InitFlag::Eyes]);
        assert!(program.setup.is_empty());
        assert_eq!(program.main_loop, vec![Node::command("ERN")]);
    }

    #[test]
    fn parses_fallback_script() {
        let program = parse_script("|I||S||L||").expect("parse");
        assert_eq!(program, Program::default());
    }

    #[test]
    fn parses_nested_structures() {
        let script = "|I|E|T|S|G(I,1,=,0)|L|C(O=,TR,1){|G(I,1,+,1)|C(O>,I1,2){|G(I,1,=,0)|}{}|D300|}{}|K(I1, (0){|EAF|EGN|} (D){|EAF|})|";
        let program = parse_script(script).expect("parse");
        assert_eq!(program.init_flags, vec![InitFlag::Eyes, InitFlag::Touch]);
        assert_eq!(program.setup.len(), 1);
        assert_eq!(program.main_loop.len(), 2);

        let Node::If { expr, then, .. } = &program.main_loop[0] else {
            panic!("expected if");
        };
        assert_eq!(expr.left.as_sensor(), Some(Sensor::Touch));
        assert_eq!(then.len(), 3);
        assert_eq!(serialize(&program), script);
    }

    #[test]
    fn setup_may_hold_an_l_command() {
        let program = parse_script("|I||S|L|L|L||").expect("parse");
        assert_eq!(program.setup, vec![Node::command("L"), Node::command("L")]);
        assert!(program.main_loop.is_empty());
    }

    #[test]
    fn words_become_delay_break_or_command() {
        let nodes = parse_token_list("|ERN|D200|X|D007|MF|").expect("parse");
        assert_eq!(
            nodes,
            vec![
                Node::command("ERN"),
                Node::delay(200),
                Node::Break,
                Node::command("D007"),
                Node::command("MF"),
            ]
        );
        assert_eq!(parse_token_list("  ").expect("parse"), vec![]);
    }

    #[test]
    fn quoted_values_round_trip() {
        let script = "|I||S|G(S,1,=,\"hi \\\"there\\\"\")|G(S,2,=,'x')|G(F,1,=,2.5)|L||";
        let program = parse_script(script).expect("parse");
        let Node::Assign(first) = &program.setup[0] else { panic!("expected assignment") };
        assert_eq!(first.value, Value::Text("hi \"there\"".into()));
        let Node::Assign(third) = &program.setup[2] else { panic!("expected assignment") };
        assert_eq!(third.value, Value::Float(2.5));
        assert_eq!(serialize(&program), script);
    }

    #[test]
    fn reports_error_position() {
        let err = parse_script("|I|E|S|ERN|L|C(O=,TR){}{}|").unwrap_err();
        let CompileError::Syntax { message, .. } = err else { panic!("expected syntax error") };
        assert!(!message.is_empty());

        assert!(parse_script("|I|Q|S||L||").is_err());
        assert!(parse_script("|I||S||L|ERN").is_err());
        assert!(parse_script("|I||S||L|F(0-3,0){}|").is_err());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut token = "ERN".to_string();
        for _ in 0..(MAX_PARSE_DEPTH + 1) {
            token = format!("W(O=,1,1){{|{token}|}}");
        }
        assert!(parse_token_list(&token).is_err());
    }
}
