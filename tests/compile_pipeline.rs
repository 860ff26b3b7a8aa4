//! Integration tests for description compilation and request translation
//!
//! Covers the path from untrusted JSON or free text to a validated script.

use emmi::compiler::{
    FALLBACK_SCRIPT, InitFlag, Node, compile, heuristic_translate, parse_script, sanitize,
    serialize, validate_script,
};
use emmi::config::{ReasonerSettings, TranslatorConfig};
use emmi::error::ReasonerError;
use emmi::pipeline::Translator;
use emmi::reasoner::{ReasonerReply, ReasoningService};
use serde_json::{Value as Json, json};

fn nested_ifs(levels: usize) -> Json {
    let mut body = json!([{ "type": "cmd", "cmd": "ERN" }]);
    for _ in 0..levels {
        body = json!([{
            "type": "if",
            "expr": { "op": "==", "left": "TR", "right": 1 },
            "then": body
        }]);
    }
    body
}

fn depth(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::If {
                then, otherwise, ..
            } => 1 + depth(then).max(depth(otherwise)),
            Node::While { body, .. } | Node::For { body, .. } => 1 + depth(body),
            Node::Switch { cases, default, .. } => {
                1 + cases
                    .iter()
                    .map(|case| depth(&case.body))
                    .max()
                    .unwrap_or(0)
                    .max(depth(default))
            }
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}

fn offline() -> TranslatorConfig {
    TranslatorConfig {
        reasoner: ReasonerSettings::default(),
        offline: true,
        heuristic_fallback: true,
        block_map: None,
    }
}

struct Scripted(Json);

impl ReasoningService for Scripted {
    fn request_program(&self, _message: &str) -> Result<ReasonerReply, ReasonerError> {
        Ok(ReasonerReply::from_payload(self.0.clone()))
    }
}

#[test]
fn test_simple_command() {
    let compiled = compile(&json!({ "loop": [{ "type": "cmd", "cmd": "ern" }] })).unwrap();
    assert_eq!(compiled.program.main_loop, vec![Node::command("ERN")]);
    assert_eq!(compiled.program.init_flags, vec![InitFlag::Eyes]);
    assert_eq!(compiled.script, "|I|E|S||L|ERN|");
    assert!(compiled.warnings.is_empty());
}

#[test]
fn test_delay_clamp() {
    let compiled = compile(&json!({ "loop": [{ "type": "delay", "ms": -5 }] })).unwrap();
    assert_eq!(compiled.program.main_loop, vec![Node::delay(0)]);
    assert_eq!(compiled.script, "|I||S||L|D0|");
    assert_eq!(compiled.warnings.len(), 1);
}

#[test]
fn test_depth_truncation() {
    let sanitized = sanitize(&json!({ "program": { "loop": nested_ifs(10) } }));
    assert_eq!(depth(&sanitized.program.main_loop), 7);
    assert!(
        sanitized
            .warnings
            .iter()
            .any(|warning| warning.contains("maximum nesting depth"))
    );

    let script = serialize(&sanitized.program);
    validate_script(&script).unwrap();
    assert_eq!(parse_script(&script).unwrap().main_loop, sanitized.program.main_loop);
}

#[test]
fn test_init_flags_follow_usage() {
    let compiled = compile(&json!({
        "initFlags": ["V", "M", "R\"EMMI-01\"", "Q"],
        "setup": [{ "type": "cmd", "cmd": "BS" }],
        "loop": [{
            "type": "while",
            "expr": { "op": "<", "left": "AR", "right": 1 },
            "body": [{ "type": "cmd", "cmd": "EGN" }]
        }]
    }))
    .unwrap();

    assert_eq!(
        compiled.program.init_flags,
        vec![
            InitFlag::Eyes,
            InitFlag::Buzzer,
            InitFlag::Audio,
            InitFlag::Pairing("EMMI-01".into())
        ]
    );
    assert!(compiled.script.starts_with("|I|E|B|A|R\"EMMI-01\"|S|BS|L|"));
    assert_eq!(compiled.warnings, vec!["Dropped unsupported init flag: Q"]);
}

#[test]
fn test_pairing_name_with_operator_text() {
    let compiled = compile(&json!({
        "initFlags": ["R\"O=,a,b,c\""],
        "loop": [{ "type": "cmd", "cmd": "ERN" }]
    }))
    .unwrap();

    assert_eq!(compiled.script, "|I|E|R\"O=,a,b,c\"|S||L|ERN|");
    assert!(compiled.warnings.is_empty());
    assert_eq!(parse_script(&compiled.script).unwrap(), compiled.program);
}

#[test]
fn test_heuristic_blink_scenario() {
    let translator = Translator::from_config(&offline()).unwrap();
    let response = translator.translate("blink the red light every 500 ms");

    assert!(!response.fallback);
    assert_eq!(
        response.program.main_loop,
        vec![
            Node::command("ERN"),
            Node::delay(500),
            Node::command("ERF"),
            Node::delay(500),
        ]
    );
    assert_eq!(response.program.init_flags, vec![InitFlag::Eyes]);
    assert_eq!(response.script, "|I|E|S||L|ERN|D500|ERF|D500|");
    assert_eq!(
        heuristic_translate("blink the red light every 500 ms")
            .unwrap()
            .program,
        response.program
    );
}

#[test]
fn test_touch_cycle_scenario() {
    let translator = Translator::from_config(&offline()).unwrap();
    let response =
        translator.translate("Use touch to cycle state I1 between green, red and blue with debounce");

    assert!(!response.fallback);
    assert_eq!(
        response.program.init_flags,
        vec![InitFlag::Eyes, InitFlag::Touch]
    );
    validate_script(&response.script).unwrap();
    assert!(response.script.contains("K(I1,"));
}

#[test]
fn test_unrecognised_request_falls_back() {
    let translator = Translator::from_config(&offline()).unwrap();
    let response = translator.translate("write me a poem");

    assert!(response.fallback);
    assert_eq!(response.script, FALLBACK_SCRIPT);
    assert_eq!(
        response.warnings.last().map(String::as_str),
        Some("Could not generate program automatically.")
    );
}

#[test]
fn test_service_reply_is_repaired() {
    let translator = Translator::new(
        Some(Box::new(Scripted(json!({
            "program": {
                "initFlags": ["E", "M", "T"],
                "setup": [],
                "loop": [
                    { "type": "cmd", "cmd": "mf" },
                    { "type": "delay", "ms": 1200.4 },
                    { "type": "cmd", "cmd": "ms" },
                    { "type": "jump" }
                ]
            },
            "warnings": []
        })))),
        true,
    );
    let response = translator.translate("drive forward for a bit");

    assert!(!response.fallback);
    assert_eq!(response.script, "|I|M|S||L|MF|D1200|MS|");
    assert_eq!(response.explanation, "Program generated successfully.");
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("jump"));
}

#[test]
fn test_json_output_shape() {
    let translator = Translator::from_config(&offline()).unwrap();
    let response = translator.translate("turn the green led on");
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["script"], "|I|E|S||L|EGN|");
    assert_eq!(value["program"]["initFlags"], json!(["E"]));
    assert_eq!(value["program"]["loop"][0], json!({ "type": "cmd", "cmd": "EGN" }));
    assert_eq!(value["fallback"], false);
}
