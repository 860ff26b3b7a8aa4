//! Hardware-flag inference.

use std::collections::BTreeSet;

use super::ast::{Expression, InitFlag, Node};
use super::value::Value;

/// Subsystem flag implied by a command token, if any.
///
/// `E[RGBA][NF]` drives the eyes, `M[FBLRS]` the wheels and any token
/// starting with `BS`, `BN` or `BF` the buzzer.
pub fn command_flag(token: &str) -> Option<InitFlag> {
    let bytes = token.as_bytes();
    match bytes {
        [b'E', b'R' | b'G' | b'B' | b'A', b'N' | b'F'] => Some(InitFlag::Eyes),
        [b'M', b'F' | b'B' | b'L' | b'R' | b'S'] => Some(InitFlag::Motors),
        [b'B', b'S' | b'N' | b'F', ..] => Some(InitFlag::Buzzer),
        _ => None,
    }
}

/// Minimal set of enumerated flags both phases need, in canonical order.
pub fn infer_init_flags(setup: &[Node], main_loop: &[Node]) -> Vec<InitFlag> {
    let mut flags = BTreeSet::new();
    scan_nodes(setup, &mut flags);
    scan_nodes(main_loop, &mut flags);
    flags.into_iter().collect()
}

fn scan_nodes(nodes: &[Node], flags: &mut BTreeSet<InitFlag>) {
    for node in nodes {
        match node {
            Node::Command { cmd } => flags.extend(command_flag(cmd)),
            Node::Assign(assignment) => scan_value(&assignment.value, flags),
            Node::If {
                expr,
                then,
                otherwise,
            } => {
                scan_expr(expr, flags);
                scan_nodes(then, flags);
                scan_nodes(otherwise, flags);
            }
            Node::While { expr, body } => {
                scan_expr(expr, flags);
                scan_nodes(body, flags);
            }
            Node::For { body, .. } => scan_nodes(body, flags),
            Node::Switch {
                value,
                cases,
                default,
            } => {
                scan_value(value, flags);
                for case in cases {
                    scan_value(&case.matches, flags);
                    scan_nodes(&case.body, flags);
                }
                scan_nodes(default, flags);
            }
            Node::Delay { .. } | Node::Break => {}
        }
    }
}

fn scan_expr(expr: &Expression, flags: &mut BTreeSet<InitFlag>) {
    scan_value(&expr.left, flags);
    scan_value(&expr.right, flags);
}

fn scan_value(value: &Value, flags: &mut BTreeSet<InitFlag>) {
    flags.extend(value.as_sensor().map(InitFlag::for_sensor));
}
