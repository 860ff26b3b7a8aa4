//! Command-to-block mapping table
//!
//! The table tells the mapper which visual block kinds exist and how each
//! command token expands into blocks. It is plain data: built once from the
//! defaults or a JSON file, then passed by reference to every mapping call.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One block instantiation request with its nested children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// Block kind identifier known to the workspace
    #[serde(rename = "type")]
    pub kind: String,

    /// Field name to field value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,

    /// Value inputs, each holding one child block
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, BlockDescriptor>,

    /// Statement inputs, each holding a chain of child blocks
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statements: BTreeMap<String, Vec<BlockDescriptor>>,
}

impl BlockDescriptor {
    /// Create a descriptor with no fields or children
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            statements: BTreeMap::new(),
        }
    }

    /// Set a field value
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Attach a child block to a value input
    pub fn with_input(mut self, name: impl Into<String>, child: BlockDescriptor) -> Self {
        self.inputs.insert(name.into(), child);
        self
    }

    /// Attach a chain of blocks to a statement input
    ///
    /// Empty chains are not recorded.
    pub fn with_statement(mut self, name: impl Into<String>, chain: Vec<BlockDescriptor>) -> Self {
        if !chain.is_empty() {
            self.statements.insert(name.into(), chain);
        }
        self
    }

    /// Look up a field value
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Table entry for a command token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandEntry {
    /// The command maps to one block
    Single(BlockDescriptor),
    /// The command expands to several blocks placed in order
    Sequence(Vec<BlockDescriptor>),
}

impl CommandEntry {
    /// Descriptors in placement order
    pub fn descriptors(&self) -> &[BlockDescriptor] {
        match self {
            CommandEntry::Single(descriptor) => std::slice::from_ref(descriptor),
            CommandEntry::Sequence(descriptors) => descriptors,
        }
    }
}

/// Root block that holds the setup and loop stacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseBlock {
    /// Block kind of the root
    #[serde(rename = "type")]
    pub kind: String,
    /// Statement input receiving the setup phase
    pub setup_input: String,
    /// Statement input receiving the loop phase
    pub loop_input: String,
}

/// Block kinds for control flow and logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralKinds {
    /// Timed wait
    pub delay: String,
    /// Variable set (`=`)
    pub set_var: String,
    /// Variable change (`+`)
    pub change_var: String,
    /// Conditional
    #[serde(rename = "if")]
    pub if_block: String,
    /// While loop
    #[serde(rename = "while")]
    pub while_block: String,
    /// Counted loop
    #[serde(rename = "for")]
    pub for_block: String,
    /// Loop exit
    #[serde(rename = "break")]
    pub break_block: String,
    /// Binary comparison
    pub logic_compare: String,
    /// Logical conjunction
    pub logic_and: String,
    /// Counter variable name used by counted loops
    pub for_var_name: String,
}

/// Block kinds for operands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueKinds {
    /// Number literal
    pub number: String,
    /// Text literal
    pub text: String,
    /// Variable read
    pub variable: String,
    /// Touch sensor read
    pub touch: String,
    /// Microphone read
    pub mic: String,
    /// Light sensor read
    pub light: String,
}

/// Complete mapping configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockMap {
    /// Root block
    pub base: BaseBlock,
    /// Structural block kinds
    pub blocks: StructuralKinds,
    /// Operand block kinds
    pub value: ValueKinds,
    /// Command token to block expansion
    pub command_map: BTreeMap<String, CommandEntry>,
}

impl BlockMap {
    /// Descriptors for a command token, if the table knows it
    pub fn command(&self, token: &str) -> Option<&[BlockDescriptor]> {
        self.command_map.get(token).map(CommandEntry::descriptors)
    }

    /// Parse a table from JSON text; missing sections take the defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to deserialize block map")
    }

    /// Load a table from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read block map: {:?}", path))?;
        Self::from_json_str(&text)
    }
}

impl Default for BlockMap {
    fn default() -> Self {
        let eye = |pin: &str, state: &str| {
            BlockDescriptor::new("emmi_eyes_digital")
                .with_field("PIN", pin)
                .with_field("STATE", state)
        };
        let all_eyes = |state: &str| {
            CommandEntry::Sequence(
                ["PIN_EYE_RED", "PIN_EYE_GREEN", "PIN_EYE_BLUE"]
                    .into_iter()
                    .map(|pin| eye(pin, state))
                    .collect(),
            )
        };
        let wheels = |direction: &str| {
            CommandEntry::Single(
                BlockDescriptor::new("emmi_wheels_simple")
                    .with_field("DIRECTION", direction)
                    .with_field("SPEED", "180")
                    .with_field("STEP", "1"),
            )
        };

        let mut command_map = BTreeMap::new();
        for (token, pin, state) in [
            ("ERN", "PIN_EYE_RED", "HIGH"),
            ("ERF", "PIN_EYE_RED", "LOW"),
            ("EGN", "PIN_EYE_GREEN", "HIGH"),
            ("EGF", "PIN_EYE_GREEN", "LOW"),
            ("EBN", "PIN_EYE_BLUE", "HIGH"),
            ("EBF", "PIN_EYE_BLUE", "LOW"),
        ] {
            command_map.insert(token.to_string(), CommandEntry::Single(eye(pin, state)));
        }
        command_map.insert("EAN".to_string(), all_eyes("HIGH"));
        command_map.insert("EAF".to_string(), all_eyes("LOW"));
        for (token, direction) in [
            ("MF", "FORWARD"),
            ("MB", "BACKWARD"),
            ("ML", "LEFT"),
            ("MR", "RIGHT"),
        ] {
            command_map.insert(token.to_string(), wheels(direction));
        }
        command_map.insert(
            "BS".to_string(),
            CommandEntry::Single(
                BlockDescriptor::new("emmi_buzzer_stop").with_field("PIN", "PIN_BUZZER"),
            ),
        );
        command_map.insert(
            "X".to_string(),
            CommandEntry::Single(
                BlockDescriptor::new("custom_flow_statements").with_field("FLOW", "BREAK"),
            ),
        );

        Self {
            base: BaseBlock {
                kind: "base_setup_loop".to_string(),
                setup_input: "SETUP".to_string(),
                loop_input: "LOOP".to_string(),
            },
            blocks: StructuralKinds {
                delay: "custom_wait".to_string(),
                set_var: "custom_variable_set".to_string(),
                change_var: "custom_variable_change".to_string(),
                if_block: "custom_controls_if".to_string(),
                while_block: "custom_controls_whileUntil".to_string(),
                for_block: "custom_controls_for".to_string(),
                break_block: "custom_flow_statements".to_string(),
                logic_compare: "logic_compare".to_string(),
                logic_and: "custom_logic_and".to_string(),
                for_var_name: "i".to_string(),
            },
            value: ValueKinds {
                number: "math_number".to_string(),
                text: "custom_text_value".to_string(),
                variable: "custom_variable_get".to_string(),
                touch: "emmi_touch_read".to_string(),
                mic: "emmi_mic_read".to_string(),
                light: "emmi_light_read".to_string(),
            },
            command_map,
        }
    }
}
