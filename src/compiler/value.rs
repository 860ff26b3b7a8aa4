use serde::{Serialize, Serializer};
use std::fmt;

/// Highest variable slot index per type class.
pub const MAX_SLOT: u8 = 5;

/// Variable type classes understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarType {
    /// `I` slots.
    Int,
    /// `F` slots.
    Float,
    /// `C` slots.
    Char,
    /// `S` slots.
    Str,
    /// `B` slots.
    Bool,
}

impl VarType {
    /// Every type class, in wire order.
    pub const ALL: [VarType; 5] = [
        VarType::Int,
        VarType::Float,
        VarType::Char,
        VarType::Str,
        VarType::Bool,
    ];

    /// Single-letter wire code.
    pub fn code(self) -> char {
        match self {
            VarType::Int => 'I',
            VarType::Float => 'F',
            VarType::Char => 'C',
            VarType::Str => 'S',
            VarType::Bool => 'B',
        }
    }

    /// Look up a type class by its wire code.
    pub fn from_code(code: char) -> Option<Self> {
        VarType::ALL.into_iter().find(|ty| ty.code() == code)
    }
}

impl Serialize for VarType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.code())
    }
}

/// One of the five variable slots of a type class (`I1`..`B5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VarSlot {
    #[serde(rename = "varType")]
    var_type: VarType,
    index: u8,
}

impl VarSlot {
    /// Build a slot, rejecting indices outside `1..=5`.
    pub fn new(var_type: VarType, index: u8) -> Option<Self> {
        (1..=MAX_SLOT)
            .contains(&index)
            .then_some(Self { var_type, index })
    }

    /// Build a slot, clamping the index into `1..=5`.
    pub fn clamped(var_type: VarType, index: i64) -> Self {
        let index = index.clamp(1, i64::from(MAX_SLOT)) as u8;
        Self { var_type, index }
    }

    /// Type class of the slot.
    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    /// Slot index, always within `1..=5`.
    pub fn index(&self) -> u8 {
        self.index
    }
}

impl fmt::Display for VarSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.var_type.code(), self.index)
    }
}

/// Live sensor readings the firmware resolves on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// Touch pad (`TR`).
    Touch,
    /// Microphone, active low (`AR`).
    Audio,
    /// Light sensor, inverse scale (`VR`).
    Light,
}

impl Sensor {
    /// Wire token for the reading.
    pub fn token(self) -> &'static str {
        match self {
            Sensor::Touch => "TR",
            Sensor::Audio => "AR",
            Sensor::Light => "VR",
        }
    }
}

/// Symbolic reference resolved by the firmware rather than by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// Variable slot.
    Var(VarSlot),
    /// Sensor reading.
    Sensor(Sensor),
}

impl Symbol {
    /// Recognise `I1`..`B5`, `TR`, `AR` and `VR`. Matching is case-sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "TR" => return Some(Symbol::Sensor(Sensor::Touch)),
            "AR" => return Some(Symbol::Sensor(Sensor::Audio)),
            "VR" => return Some(Symbol::Sensor(Sensor::Light)),
            _ => {}
        }

        let mut chars = token.chars();
        let (Some(code), Some(digit), None) = (chars.next(), chars.next(), chars.next()) else {
            return None;
        };
        let var_type = VarType::from_code(code)?;
        let index = digit.to_digit(10)?;
        VarSlot::new(var_type, index as u8).map(Symbol::Var)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Var(slot) => slot.fmt(f),
            Symbol::Sensor(sensor) => f.write_str(sensor.token()),
        }
    }
}

/// Scalar operand of assignments, comparisons and switch cases.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer literal.
    Integer(i64),
    /// Finite floating-point literal.
    Float(f64),
    /// Boolean literal, rendered as `1`/`0` on the wire.
    Boolean(bool),
    /// Trimmed string of at most 120 characters.
    Text(String),
    /// Variable slot or sensor reading.
    Symbol(Symbol),
}

impl Value {
    /// The safe default every invalid value collapses to.
    pub fn zero() -> Self {
        Value::Integer(0)
    }

    /// Sensor referenced by this value, if any.
    pub fn as_sensor(&self) -> Option<Sensor> {
        match self {
            Value::Symbol(Symbol::Sensor(sensor)) => Some(*sensor),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Symbol> for Value {
    fn from(value: Symbol) -> Self {
        Value::Symbol(value)
    }
}

impl From<Sensor> for Value {
    fn from(value: Sensor) -> Self {
        Value::Symbol(Symbol::Sensor(value))
    }
}

impl From<VarSlot> for Value {
    fn from(value: VarSlot) -> Self {
        Value::Symbol(Symbol::Var(value))
    }
}

// Mirrors the program description format: numbers, booleans and strings.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(num) => serializer.serialize_i64(*num),
            Value::Float(num) => serializer.serialize_f64(*num),
            Value::Boolean(flag) => serializer.serialize_bool(*flag),
            Value::Text(text) => serializer.serialize_str(text),
            Value::Symbol(symbol) => serializer.collect_str(symbol),
        }
    }
}

/// `-?\d+(\.\d+)?`
pub fn is_numeric_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.is_none_or(all_digits)
}

/// Length in bytes of the quoted literal at the start of `text`, including
/// both quotes. Backslash escapes the following character.
pub fn scan_quoted(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = *bytes.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let mut index = 1;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            byte if byte == quote => return Some(index + 1),
            _ => index += 1,
        }
    }
    None
}

/// Whether `text` is exactly one quoted literal, e.g. `"hi"` or `'x'`.
pub fn is_quoted_literal(text: &str) -> bool {
    scan_quoted(text) == Some(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_parse_case_sensitively() {
        assert_eq!(
            Symbol::parse("I1"),
            Some(Symbol::Var(VarSlot::clamped(VarType::Int, 1)))
        );
        assert_eq!(Symbol::parse("TR"), Some(Symbol::Sensor(Sensor::Touch)));
        assert_eq!(Symbol::parse("tr"), None);
        assert_eq!(Symbol::parse("I6"), None);
        assert_eq!(Symbol::parse("I0"), None);
        assert_eq!(Symbol::parse("X1"), None);
        assert_eq!(Symbol::parse("I12"), None);
    }

    #[test]
    fn numeric_literal_shape() {
        assert!(is_numeric_literal("42"));
        assert!(is_numeric_literal("-3.25"));
        assert!(!is_numeric_literal("1."));
        assert!(!is_numeric_literal(".5"));
        assert!(!is_numeric_literal("-"));
        assert!(!is_numeric_literal("1e5"));
    }

    #[test]
    fn quoted_literals_respect_escapes() {
        assert!(is_quoted_literal("\"hi\""));
        assert!(is_quoted_literal("'x'"));
        assert!(is_quoted_literal("\"a\\\"b\""));
        assert!(!is_quoted_literal("\"a\"b\""));
        assert!(!is_quoted_literal("\"a\\\""));
        assert!(!is_quoted_literal("\""));
    }

    #[test]
    fn slot_clamps_index() {
        assert_eq!(VarSlot::clamped(VarType::Float, 9).index(), 5);
        assert_eq!(VarSlot::clamped(VarType::Float, -2).index(), 1);
        assert_eq!(VarSlot::clamped(VarType::Bool, 3).to_string(), "B3");
    }
}
