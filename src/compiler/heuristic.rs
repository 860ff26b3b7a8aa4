//! Deterministic keyword translator used when no reasoning service answers.
//!
//! It recognises two request families and nothing else. Anything it cannot
//! classify yields `None` so the caller can fall back to the safe script.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::{AssignOp, CompareOp, Expression, Node, Program, SwitchCase};
use super::infer::infer_init_flags;
use super::value::{Sensor, Value, VarSlot, VarType};

/// Shortest delay the translator will emit.
pub const MIN_DELAY_MS: u32 = 20;
/// Longest delay the translator will emit.
pub const MAX_DELAY_MS: u32 = 10_000;
/// Delay used when the request names none.
pub const DEFAULT_DELAY_MS: u32 = 500;

static MILLIS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{2,5})\s*(ms|msec|millisecond)").expect("millisecond pattern compiles")
});

static SECONDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,3})\s*(s|sec|second)").expect("second pattern compiles")
});

/// Program built from a recognised request.
#[derive(Debug, Clone, PartialEq)]
pub struct Heuristic {
    /// Sanitizer-clean program.
    pub program: Program,
    /// One-line description of what the program does.
    pub explanation: String,
}

/// Translate a natural-language request by keyword matching.
pub fn heuristic_translate(message: &str) -> Option<Heuristic> {
    let text = message.to_lowercase();
    touch_cycle(&text).or_else(|| eye_control(&text))
}

/// Delay named in `text`, e.g. `250ms` or `2 seconds`, clamped to 20..=10000.
pub fn parse_requested_delay_ms(text: &str) -> u32 {
    let requested = if let Some(caps) = MILLIS.captures(text) {
        caps[1].parse::<u64>().ok()
    } else if let Some(caps) = SECONDS.captures(text) {
        caps[1].parse::<u64>().ok().map(|secs| secs * 1000)
    } else {
        None
    };

    match requested {
        Some(ms) => ms.clamp(u64::from(MIN_DELAY_MS), u64::from(MAX_DELAY_MS)) as u32,
        None => DEFAULT_DELAY_MS,
    }
}

// Touch pad cycles I1 through 0, 1, 2 and each state lights one color.
fn touch_cycle(text: &str) -> Option<Heuristic> {
    let mentions_state = text.contains("i1") || text.contains("state");
    let mentions_colors = ["green", "red", "blue"].iter().all(|c| text.contains(c));
    if !(mentions_state && text.contains("touch") && mentions_colors) {
        return None;
    }

    let debounce = if text.contains("500") || text.contains("debounce") {
        500
    } else {
        300
    };
    let state = VarSlot::clamped(VarType::Int, 1);
    let setup = vec![Node::assign(state, AssignOp::Assign, 0)];

    let color_case = |matches: i64, on: &str| SwitchCase {
        matches: Value::Integer(matches),
        body: vec![Node::command("EAF"), Node::command(on)],
    };
    let main_loop = vec![
        Node::If {
            expr: Expression::new(CompareOp::Eq, Sensor::Touch, 1),
            then: vec![
                Node::assign(state, AssignOp::Increment, 1),
                Node::If {
                    expr: Expression::new(CompareOp::Gt, state, 2),
                    then: vec![Node::assign(state, AssignOp::Assign, 0)],
                    otherwise: vec![],
                },
                Node::delay(debounce),
            ],
            otherwise: vec![],
        },
        Node::Switch {
            value: Value::from(state),
            cases: vec![
                color_case(0, "EGN"),
                color_case(1, "ERN"),
                color_case(2, "EBN"),
            ],
            default: vec![Node::command("EAF")],
        },
    ];

    Some(Heuristic {
        program: program(setup, main_loop),
        explanation: "Touch input cycles I1 through 0, 1, 2 with debounce, then drives LED color per state."
            .to_string(),
    })
}

fn eye_control(text: &str) -> Option<Heuristic> {
    let mentions_eyes = ["led", "eye", "rgb", "light"]
        .iter()
        .any(|word| text.contains(word));
    if !mentions_eyes {
        return None;
    }

    let (color, on, off) = if text.contains("green") {
        ("green", "EGN", "EGF")
    } else if text.contains("blue") {
        ("blue", "EBN", "EBF")
    } else if text.contains("all") {
        ("all", "EAN", "EAF")
    } else {
        ("red", "ERN", "ERF")
    };

    let blink = ["blink", "flash", "toggle"]
        .iter()
        .any(|word| text.contains(word));
    let switch_off = text.contains(" off") || text.contains("disable");

    if blink {
        let delay = parse_requested_delay_ms(text);
        let main_loop = vec![
            Node::command(on),
            Node::delay(delay),
            Node::command(off),
            Node::delay(delay),
        ];
        return Some(Heuristic {
            program: program(Vec::new(), main_loop),
            explanation: format!(
                "Blinking {color} LED by toggling eyes on/off with a {delay}ms delay."
            ),
        });
    }

    let (token, state) = if switch_off { (off, "off") } else { (on, "on") };
    Some(Heuristic {
        program: program(Vec::new(), vec![Node::command(token)]),
        explanation: format!("Setting {color} LED {state}."),
    })
}

fn program(setup: Vec<Node>, main_loop: Vec<Node>) -> Program {
    Program {
        init_flags: infer_init_flags(&setup, &main_loop),
        setup,
        main_loop,
    }
}
