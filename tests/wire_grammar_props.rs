//! Property tests for the sanitizer and the wire grammar
//!
//! Inputs are arbitrary JSON trees biased towards the program description
//! vocabulary, so most cases exercise real node shapes.

use emmi::compiler::{infer_init_flags, parse_script, sanitize, serialize, validate_script};
use proptest::prelude::*;
use proptest::sample::select;
use serde_json::{Map, Value as Json, json};

const KEYS: &[&str] = &[
    "type", "cmd", "ms", "varType", "index", "op", "value", "expr", "left", "right", "then",
    "else", "body", "start", "end", "step", "cases", "match", "default", "program", "initFlags",
    "setup", "loop",
];

const WORDS: &[&str] = &[
    "cmd", "delay", "set_var", "if", "while", "for", "switch", "break", "ERN", "ern", "EAF", "MF",
    "MS", "BS", "X", "D20", "TR", "AR", "VR", "I1", "F3", "C2", "S5", "B4", "==", "!=", ">=", "<",
    "=", "+", "E", "M", "R\"EMMI\"", "",
];

const COMMANDS: &[&str] = &[
    "ERN", "ERF", "EGN", "EGF", "EBN", "EBF", "EAN", "EAF", "MF", "MB", "ML", "MR", "MS", "BS",
    "bs", "ZZZ", "D05", "X", "E|N", "",
];

const OPERANDS: &[&str] = &["TR", "AR", "VR", "I1", "I5", "F2", "C3", "S4", "B1", "I9", "tr"];

const OPS: &[&str] = &["==", "!=", ">", ">=", "<", "<=", "=>", ""];

const VAR_TYPES: &[&str] = &["I", "F", "C", "S", "B", "Q"];

const ASSIGN_OPS: &[&str] = &["=", "+", "-"];

const FLAGS: &[&str] = &[
    "E", "B", "M", "T", "A", "V", "R\"EMMI\"", "R\"O=,a,b,c\"", "R\"G(I,1)\"", "R\"S'x\"", "W",
];

fn arb_text() -> impl Strategy<Value = String> {
    "[ -~]{0,16}"
}

fn arb_json() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::from),
        any::<i64>().prop_map(Json::from),
        (-1.0e9f64..1.0e9).prop_map(Json::from),
        select(WORDS).prop_map(Json::from),
        arb_text().prop_map(Json::from),
    ];
    leaf.prop_recursive(8, 256, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Json::Array),
            prop::collection::vec((select(KEYS), inner), 0..8).prop_map(|entries| {
                let object: Map<String, Json> = entries
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect();
                Json::Object(object)
            }),
        ]
    })
}

fn arb_scalar() -> impl Strategy<Value = Json> {
    prop_oneof![
        any::<i32>().prop_map(Json::from),
        (-1000.0f64..1000.0).prop_map(Json::from),
        any::<bool>().prop_map(Json::from),
        select(OPERANDS).prop_map(Json::from),
        arb_text().prop_map(Json::from),
    ]
}

fn arb_expr() -> impl Strategy<Value = Json> {
    (select(OPS), arb_scalar(), arb_scalar())
        .prop_map(|(op, left, right)| json!({ "op": op, "left": left, "right": right }))
}

fn arb_node() -> impl Strategy<Value = Json> {
    let leaf = prop_oneof![
        select(COMMANDS).prop_map(|cmd| json!({ "type": "cmd", "cmd": cmd })),
        (-100i64..20_000).prop_map(|ms| json!({ "type": "delay", "ms": ms })),
        (
            select(VAR_TYPES),
            -1i64..8,
            select(ASSIGN_OPS),
            arb_scalar()
        )
            .prop_map(|(var_type, index, op, value)| {
                json!({
                    "type": "set_var",
                    "varType": var_type,
                    "index": index,
                    "op": op,
                    "value": value
                })
            }),
        Just(json!({ "type": "break" })),
    ];
    leaf.prop_recursive(5, 96, 4, |inner| {
        let body = prop::collection::vec(inner, 0..4);
        prop_oneof![
            (arb_expr(), body.clone(), body.clone()).prop_map(|(expr, then, otherwise)| {
                json!({ "type": "if", "expr": expr, "then": then, "else": otherwise })
            }),
            (arb_expr(), body.clone())
                .prop_map(|(expr, body)| json!({ "type": "while", "expr": expr, "body": body })),
            (-5i32..5, -5i32..5, -2i32..3, body.clone()).prop_map(|(start, end, step, body)| {
                json!({ "type": "for", "start": start, "end": end, "step": step, "body": body })
            }),
            (
                arb_scalar(),
                prop::collection::vec((arb_scalar(), body.clone()), 0..3),
                body
            )
                .prop_map(|(value, cases, default)| {
                    let cases: Vec<Json> = cases
                        .into_iter()
                        .map(|(matches, body)| json!({ "match": matches, "body": body }))
                        .collect();
                    json!({ "type": "switch", "value": value, "cases": cases, "default": default })
                }),
        ]
    })
}

fn arb_description() -> impl Strategy<Value = Json> {
    (
        prop::collection::vec(select(FLAGS), 0..4),
        prop::collection::vec(arb_node(), 0..5),
        prop::collection::vec(arb_node(), 0..5),
    )
        .prop_map(|(flags, setup, main_loop)| {
            json!({ "program": { "initFlags": flags, "setup": setup, "loop": main_loop } })
        })
}

fn arb_input() -> impl Strategy<Value = Json> {
    prop_oneof![arb_description(), arb_json()]
}

proptest! {
    #[test]
    fn sanitized_programs_serialize_to_valid_envelopes(raw in arb_input()) {
        let sanitized = sanitize(&raw);
        let script = serialize(&sanitized.program);

        prop_assert!(script.starts_with("|I|"));
        prop_assert!(script.ends_with('|'));
        let setup_at = script.find("|S|").expect("setup marker");
        let loop_at = script.rfind("|L|").expect("loop marker");
        prop_assert!(setup_at < loop_at);
        prop_assert_eq!(validate_script(&script), Ok(()));
    }

    #[test]
    fn resanitizing_is_a_no_op(raw in arb_input()) {
        let first = sanitize(&raw);
        let description = first.program.to_description().expect("description");
        let second = sanitize(&description);

        prop_assert_eq!(&second.program, &first.program);
        prop_assert!(second.warnings.is_empty(), "warnings: {:?}", second.warnings);
    }

    #[test]
    fn serialization_is_deterministic(raw in arb_input()) {
        let first = sanitize(&raw).program;
        let second = sanitize(&raw).program;
        prop_assert_eq!(serialize(&first), serialize(&second));
    }

    #[test]
    fn parsing_reproduces_the_script(raw in arb_input()) {
        let program = sanitize(&raw).program;
        let script = serialize(&program);
        let parsed = parse_script(&script).expect("serialized scripts parse");
        prop_assert_eq!(serialize(&parsed), script);
    }

    #[test]
    fn inferred_flags_ignore_discovery_order(raw in arb_description()) {
        let program = sanitize(&raw).program;
        let mut reversed_setup = program.main_loop.clone();
        reversed_setup.reverse();
        let mut reversed_loop = program.setup.clone();
        reversed_loop.reverse();

        let forward = infer_init_flags(&program.setup, &program.main_loop);
        let backward = infer_init_flags(&reversed_setup, &reversed_loop);
        prop_assert_eq!(forward, backward);
    }
}
