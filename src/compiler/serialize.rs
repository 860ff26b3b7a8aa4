//! Token serializer for the EMMI wire protocol.
//!
//! ```text
//! script   = "|I|" list "|S|" list "|L|" list "|" ;
//! list     = [ token { "|" token } ] ;
//! body     = "{" [ "|" token { "|" token } "|" ] "}" ;
//! token    = delay | assign | if | while | for | switch | "X" | command ;
//! delay    = "D" digits ;
//! assign   = "G(" vtype "," slot "," ( "=" | "+" ) "," value ")" ;
//! if       = "C(" expr ")" body body ;
//! while    = "W(" expr ")" body ;
//! for      = "F(" int "-" int "," int ")" body ;
//! switch   = "K(" value ", " { "(" value ")" body " " } "(D)" body ")" ;
//! expr     = "O" op "," value "," value ;
//! op       = "=" | "!=" | ">" | ">=" | "<" | "<=" ;
//! ```
//!
//! Serialization is total and deterministic: every [`Program`] has exactly
//! one rendering.

use super::ast::{Expression, Node, Program};
use super::value::{Symbol, Value, is_numeric_literal, is_quoted_literal};

/// Script sent when nothing usable could be produced.
pub const FALLBACK_SCRIPT: &str = "|I||S||L||";

/// Render a whole program inside the `|I|..|S|..|L|..|` envelope.
pub fn serialize(program: &Program) -> String {
    let flags: Vec<String> = program.init_flags.iter().map(ToString::to_string).collect();
    format!(
        "|I|{}|S|{}|L|{}|",
        flags.join("|"),
        serialize_nodes(&program.setup).join("|"),
        serialize_nodes(&program.main_loop).join("|"),
    )
}

/// Render each node of a list to its token.
pub fn serialize_nodes(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(serialize_node).collect()
}

/// Render one node.
pub fn serialize_node(node: &Node) -> String {
    match node {
        Node::Command { cmd } => cmd.clone(),
        Node::Delay { ms } => format!("D{ms}"),
        Node::Assign(assignment) => format!(
            "G({},{},{},{})",
            assignment.target.var_type().code(),
            assignment.target.index(),
            assignment.op.symbol(),
            serialize_value(&assignment.value),
        ),
        Node::If {
            expr,
            then,
            otherwise,
        } => format!(
            "C({}){{{}}}{{{}}}",
            serialize_expr(expr),
            wrap_body(then),
            wrap_body(otherwise),
        ),
        Node::While { expr, body } => {
            format!("W({}){{{}}}", serialize_expr(expr), wrap_body(body))
        }
        Node::For {
            start,
            end,
            step,
            body,
        } => format!("F({start}-{end},{step}){{{}}}", wrap_body(body)),
        Node::Switch {
            value,
            cases,
            default,
        } => {
            let mut arms: Vec<String> = cases
                .iter()
                .map(|case| {
                    format!(
                        "({}){{{}}}",
                        serialize_value(&case.matches),
                        wrap_body(&case.body)
                    )
                })
                .collect();
            arms.push(format!("(D){{{}}}", wrap_body(default)));
            format!("K({}, {})", serialize_value(value), arms.join(" "))
        }
        Node::Break => "X".to_string(),
    }
}

/// `O<op>,<left>,<right>`
pub fn serialize_expr(expr: &Expression) -> String {
    format!(
        "O{},{},{}",
        expr.op.wire(),
        serialize_value(&expr.left),
        serialize_value(&expr.right)
    )
}

/// Render a scalar operand.
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::Integer(num) => num.to_string(),
        Value::Float(num) => num.to_string(),
        Value::Boolean(flag) => String::from(if *flag { "1" } else { "0" }),
        Value::Symbol(symbol) => symbol.to_string(),
        Value::Text(text) => text_literal(text),
    }
}

/// Render a text value, quoting and escaping it unless it already reads as
/// a number, a symbol or a quoted literal.
pub fn text_literal(text: &str) -> String {
    let token = text.trim();
    if token.is_empty() {
        return "\"\"".to_string();
    }
    if is_numeric_literal(token) || Symbol::parse(token).is_some() || is_quoted_literal(token) {
        return token.to_string();
    }
    format!("\"{}\"", token.replace('\\', "\\\\").replace('"', "\\\""))
}

fn wrap_body(nodes: &[Node]) -> String {
    if nodes.is_empty() {
        String::new()
    } else {
        format!("|{}|", serialize_nodes(nodes).join("|"))
    }
}
