use serde::{Serialize, Serializer};
use std::fmt;

use super::value::{Sensor, Value, VarSlot};

/// Longest command token accepted by the sanitizer.
pub const MAX_COMMAND_LEN: usize = 32;

/// Longest name accepted inside an `R"<name>"` pairing flag.
pub const MAX_PAIRING_NAME_LEN: usize = 32;

/// Comparison operators allowed in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    /// `==`, rendered as `=` on the wire.
    #[serde(rename = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
}

impl CompareOp {
    /// Every operator.
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Gt,
        CompareOp::Ge,
        CompareOp::Lt,
        CompareOp::Le,
    ];

    /// Operator as written in program descriptions.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Operator as written in the wire protocol.
    pub fn wire(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            other => other.symbol(),
        }
    }

    /// Parse a description-format operator.
    pub fn parse(symbol: &str) -> Option<Self> {
        CompareOp::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Parse a wire-format operator.
    pub fn from_wire(symbol: &str) -> Option<Self> {
        CompareOp::ALL.into_iter().find(|op| op.wire() == symbol)
    }

    /// Logical negation of the comparison.
    pub fn inverse(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
        }
    }
}

/// Binary comparison used by `if` and `while`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    /// Comparison operator.
    pub op: CompareOp,
    /// Left operand.
    pub left: Value,
    /// Right operand.
    pub right: Value,
}

impl Expression {
    /// Build a comparison.
    pub fn new(op: CompareOp, left: impl Into<Value>, right: impl Into<Value>) -> Self {
        Self {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    /// `1 == 0`, the replacement for unusable conditions.
    pub fn never() -> Self {
        Self::new(CompareOp::Eq, 1, 0)
    }

    /// The same comparison with its operator negated.
    pub fn inverted(&self) -> Self {
        Self {
            op: self.op.inverse(),
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssignOp {
    /// Overwrite the slot.
    #[serde(rename = "=")]
    Assign,
    /// Add the source value to the slot.
    #[serde(rename = "+")]
    Increment,
}

impl AssignOp {
    /// Operator symbol, identical in both formats.
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Increment => "+",
        }
    }
}

/// Write of a value into a variable slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    /// Destination slot.
    #[serde(flatten)]
    pub target: VarSlot,
    /// Assign or increment.
    pub op: AssignOp,
    /// Source value.
    pub value: Value,
}

/// One `case` arm of a switch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchCase {
    /// Value compared against the discriminant.
    #[serde(rename = "match")]
    pub matches: Value,
    /// Body executed on a match.
    pub body: Vec<Node>,
}

/// One instruction of a program.
///
/// Serializes to the program description format, so a sanitized program can
/// be fed back through the sanitizer unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Node {
    /// Actuator command token such as `ERN` or `MF`.
    #[serde(rename = "cmd")]
    Command {
        /// Upper-case token.
        cmd: String,
    },
    /// Pause in milliseconds.
    #[serde(rename = "delay")]
    Delay {
        /// Duration in milliseconds.
        ms: u32,
    },
    /// Variable assignment or increment.
    #[serde(rename = "set_var")]
    Assign(Assignment),
    /// Conditional with both branches.
    #[serde(rename = "if")]
    If {
        /// Condition.
        expr: Expression,
        /// Body when the condition holds.
        then: Vec<Node>,
        /// Body otherwise.
        #[serde(rename = "else")]
        otherwise: Vec<Node>,
    },
    /// Loop while the condition holds.
    #[serde(rename = "while")]
    While {
        /// Condition.
        expr: Expression,
        /// Loop body.
        body: Vec<Node>,
    },
    /// Counted loop; `step` is never zero.
    #[serde(rename = "for")]
    For {
        /// First counter value.
        start: i32,
        /// Last counter value.
        end: i32,
        /// Counter increment.
        step: i32,
        /// Loop body.
        body: Vec<Node>,
    },
    /// Multi-way branch on a value.
    #[serde(rename = "switch")]
    Switch {
        /// Discriminant.
        value: Value,
        /// Cases in order.
        cases: Vec<SwitchCase>,
        /// Body when no case matches.
        default: Vec<Node>,
    },
    /// Leave the innermost loop.
    #[serde(rename = "break")]
    Break,
}

impl Node {
    /// Command node for `token`.
    pub fn command(token: impl Into<String>) -> Self {
        Node::Command { cmd: token.into() }
    }

    /// Delay node.
    pub fn delay(ms: u32) -> Self {
        Node::Delay { ms }
    }

    /// Assignment node.
    pub fn assign(target: VarSlot, op: AssignOp, value: impl Into<Value>) -> Self {
        Node::Assign(Assignment {
            target,
            op,
            value: value.into(),
        })
    }
}

/// Whether `token` is an acceptable command: `[A-Z][A-Z0-9_]*`, at most 32 chars.
pub fn is_command_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    match bytes.first() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }
    bytes.len() <= MAX_COMMAND_LEN
        && bytes
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_')
}

/// Subsystem initialization markers.
///
/// The declaration order is the canonical wire order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InitFlag {
    /// RGB eyes (`E`).
    Eyes,
    /// Buzzer (`B`).
    Buzzer,
    /// Wheel motors (`M`).
    Motors,
    /// Touch pad (`T`).
    Touch,
    /// Microphone (`A`).
    Audio,
    /// Light sensor (`V`).
    Light,
    /// Bluetooth pairing name passed through verbatim as `R"<name>"`.
    Pairing(String),
}

impl InitFlag {

    /// Parse a flag token, including `R"<name>"` pairing tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "E" => Some(InitFlag::Eyes),
            "B" => Some(InitFlag::Buzzer),
            "M" => Some(InitFlag::Motors),
            "T" => Some(InitFlag::Touch),
            "A" => Some(InitFlag::Audio),
            "V" => Some(InitFlag::Light),
            _ => pairing_name(token).map(|name| InitFlag::Pairing(name.to_string())),
        }
    }

    /// Flag required by a sensor reading.
    pub fn for_sensor(sensor: Sensor) -> Self {
        match sensor {
            Sensor::Touch => InitFlag::Touch,
            Sensor::Audio => InitFlag::Audio,
            Sensor::Light => InitFlag::Light,
        }
    }
}

fn pairing_name(token: &str) -> Option<&str> {
    let name = token.strip_prefix("R\"")?.strip_suffix('"')?;
    let valid = !name.is_empty()
        && name.chars().count() <= MAX_PAIRING_NAME_LEN
        && name
            .chars()
            .all(|c| !c.is_control() && !matches!(c, '"' | '\\' | '|' | '{' | '}' | '(' | ')'));
    valid.then_some(name)
}

impl fmt::Display for InitFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitFlag::Eyes => f.write_str("E"),
            InitFlag::Buzzer => f.write_str("B"),
            InitFlag::Motors => f.write_str("M"),
            InitFlag::Touch => f.write_str("T"),
            InitFlag::Audio => f.write_str("A"),
            InitFlag::Light => f.write_str("V"),
            InitFlag::Pairing(name) => write!(f, "R\"{name}\""),
        }
    }
}

impl Serialize for InitFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Sanitized program: init flags plus setup and loop phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Inferred flags in canonical order, followed by pairing tokens.
    pub init_flags: Vec<InitFlag>,
    /// Nodes run once at power-up.
    pub setup: Vec<Node>,
    /// Nodes run repeatedly.
    #[serde(rename = "loop")]
    pub main_loop: Vec<Node>,
}

impl Program {
    /// True when neither phase holds any node.
    pub fn is_empty(&self) -> bool {
        self.setup.is_empty() && self.main_loop.is_empty()
    }

    /// Render the program in the description format accepted by `sanitize`.
    pub fn to_description(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::value::VarType;
    use serde_json::json;

    #[test]
    fn command_tokens_are_closed() {
        assert!(is_command_token("ERN"));
        assert!(is_command_token("BF440"));
        assert!(is_command_token("X"));
        assert!(!is_command_token("ern"));
        assert!(!is_command_token("1AB"));
        assert!(!is_command_token("E|N"));
        assert!(!is_command_token(&"A".repeat(MAX_COMMAND_LEN + 1)));
    }

    #[test]
    fn pairing_flags_follow_strict_pattern() {
        assert_eq!(
            InitFlag::from_token("R\"EMMI\""),
            Some(InitFlag::Pairing("EMMI".into()))
        );
        assert_eq!(InitFlag::from_token("R\"\""), None);
        assert_eq!(InitFlag::from_token("R\"a|b\""), None);
        assert_eq!(InitFlag::from_token("R\"a\"b\""), None);
        assert_eq!(InitFlag::from_token("Q"), None);
    }

    #[test]
    fn canonical_order_follows_declaration() {
        let mut flags = vec![InitFlag::Light, InitFlag::Eyes, InitFlag::Touch];
        flags.sort();
        assert_eq!(flags, vec![InitFlag::Eyes, InitFlag::Touch, InitFlag::Light]);
    }

    #[test]
    fn description_shape_matches_input_format() {
        let program = Program {
            init_flags: vec![InitFlag::Eyes],
            setup: vec![Node::assign(
                VarSlot::clamped(VarType::Int, 1),
                AssignOp::Assign,
                0,
            )],
            main_loop: vec![
                Node::command("ERN"),
                Node::delay(200),
                Node::Break,
            ],
        };

        let description = program.to_description().unwrap();
        assert_eq!(
            description,
            json!({
                "initFlags": ["E"],
                "setup": [
                    {"type": "set_var", "varType": "I", "index": 1, "op": "=", "value": 0}
                ],
                "loop": [
                    {"type": "cmd", "cmd": "ERN"},
                    {"type": "delay", "ms": 200},
                    {"type": "break"}
                ]
            })
        );
    }

    #[test]
    fn inverse_is_an_involution() {
        for op in CompareOp::ALL {
            assert_eq!(op.inverse().inverse(), op);
        }
    }
}
