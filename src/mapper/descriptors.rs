//! Program to block-descriptor translation
//!
//! The visual block set has no else branch and no switch, so both are
//! expressed with extra `if` blocks over inverted or conjoined comparisons.

use serde::Serialize;

use super::table::{BlockDescriptor, BlockMap};
use crate::compiler::ast::{AssignOp, CompareOp, Expression, Node, Program, SwitchCase};
use crate::compiler::value::{Sensor, Symbol, Value, is_numeric_literal, is_quoted_literal};

/// Descriptor form of a program, ready for instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklyProgram {
    /// Init flags as wire tokens
    pub init_flags: Vec<String>,
    /// Setup stack
    pub setup: Vec<BlockDescriptor>,
    /// Loop stack
    #[serde(rename = "loop")]
    pub main_loop: Vec<BlockDescriptor>,
    /// Nodes that could not be represented
    pub warnings: Vec<String>,
}

/// Build descriptors for both phases of a program.
pub fn program_to_descriptors(program: &Program, map: &BlockMap) -> BlocklyProgram {
    let mut builder = DescriptorBuilder::new(map);
    let setup = builder.node_list(&program.setup);
    let main_loop = builder.node_list(&program.main_loop);
    BlocklyProgram {
        init_flags: program.init_flags.iter().map(ToString::to_string).collect(),
        setup,
        main_loop,
        warnings: builder.warnings,
    }
}

pub(super) struct DescriptorBuilder<'a> {
    map: &'a BlockMap,
    pub(super) warnings: Vec<String>,
}

impl<'a> DescriptorBuilder<'a> {
    pub(super) fn new(map: &'a BlockMap) -> Self {
        Self {
            map,
            warnings: Vec::new(),
        }
    }

    pub(super) fn node_list(&mut self, nodes: &[Node]) -> Vec<BlockDescriptor> {
        let mut out = Vec::new();
        for node in nodes {
            self.node(node, &mut out);
        }
        out
    }

    pub(super) fn command(&mut self, token: &str) -> Vec<BlockDescriptor> {
        match self.map.command(token) {
            Some(descriptors) => descriptors.to_vec(),
            None => {
                self.warnings
                    .push(format!("Command \"{token}\" is not mapped to a block."));
                Vec::new()
            }
        }
    }

    fn node(&mut self, node: &Node, out: &mut Vec<BlockDescriptor>) {
        let map = self.map;
        let kinds = &map.blocks;
        match node {
            Node::Command { cmd } => out.extend(self.command(cmd)),
            Node::Delay { ms } => out.push(
                BlockDescriptor::new(&kinds.delay)
                    .with_field("UNIT", "MILLISECONDS")
                    .with_input("DELAY", self.number(ms.to_string())),
            ),
            Node::Assign(assignment) => {
                let kind = match assignment.op {
                    AssignOp::Assign => &kinds.set_var,
                    AssignOp::Increment => &kinds.change_var,
                };
                out.push(
                    BlockDescriptor::new(kind)
                        .with_field("VAR", assignment.target.to_string())
                        .with_input("VALUE", self.value(&assignment.value)),
                );
            }
            Node::If {
                expr,
                then,
                otherwise,
            } => {
                out.push(self.guarded(self.compare(expr), then));
                if !otherwise.is_empty() {
                    out.push(self.guarded(self.compare(&expr.inverted()), otherwise));
                }
            }
            Node::While { expr, body } => {
                let body = self.node_list(body);
                out.push(
                    BlockDescriptor::new(&kinds.while_block)
                        .with_field("MODE", "WHILE")
                        .with_input("BOOL", self.compare(expr))
                        .with_statement("DO", body),
                );
            }
            Node::For {
                start,
                end,
                step,
                body,
            } => {
                let body = self.node_list(body);
                out.push(
                    BlockDescriptor::new(&kinds.for_block)
                        .with_field("VAR", &kinds.for_var_name)
                        .with_input("FROM", self.number(start.to_string()))
                        .with_input("TO", self.number(end.to_string()))
                        .with_input("BY", self.number(step.to_string()))
                        .with_statement("DO", body),
                );
            }
            Node::Switch {
                value,
                cases,
                default,
            } => self.switch(value, cases, default, out),
            Node::Break => {
                out.push(BlockDescriptor::new(&kinds.break_block).with_field("FLOW", "BREAK"))
            }
        }
    }

    fn switch(
        &mut self,
        value: &Value,
        cases: &[SwitchCase],
        default: &[Node],
        out: &mut Vec<BlockDescriptor>,
    ) {
        for case in cases {
            let condition = Expression {
                op: CompareOp::Eq,
                left: value.clone(),
                right: case.matches.clone(),
            };
            out.push(self.guarded(self.compare(&condition), &case.body));
        }
        if default.is_empty() {
            return;
        }
        if cases.is_empty() {
            // Nothing to compare against, so the default always runs.
            for node in default {
                self.node(node, out);
            }
            return;
        }

        let mut condition: Option<BlockDescriptor> = None;
        for case in cases {
            let differs = self.compare(&Expression {
                op: CompareOp::Ne,
                left: value.clone(),
                right: case.matches.clone(),
            });
            condition = Some(match condition {
                None => differs,
                Some(previous) => BlockDescriptor::new(&self.map.blocks.logic_and)
                    .with_field("OP", "AND")
                    .with_input("A", previous)
                    .with_input("B", differs),
            });
        }
        if let Some(condition) = condition {
            out.push(self.guarded(condition, default));
        }
    }

    fn guarded(&mut self, condition: BlockDescriptor, body: &[Node]) -> BlockDescriptor {
        let body = self.node_list(body);
        BlockDescriptor::new(&self.map.blocks.if_block)
            .with_input("IF0", condition)
            .with_statement("DO0", body)
    }

    fn compare(&self, expr: &Expression) -> BlockDescriptor {
        let op = match expr.op {
            CompareOp::Eq => "EQ",
            CompareOp::Ne => "NEQ",
            CompareOp::Gt => "GT",
            CompareOp::Ge => "GTE",
            CompareOp::Lt => "LT",
            CompareOp::Le => "LTE",
        };
        BlockDescriptor::new(&self.map.blocks.logic_compare)
            .with_field("OP", op)
            .with_input("A", self.value(&expr.left))
            .with_input("B", self.value(&expr.right))
    }

    fn number(&self, text: String) -> BlockDescriptor {
        BlockDescriptor::new(&self.map.value.number).with_field("NUM", text)
    }

    fn value(&self, value: &Value) -> BlockDescriptor {
        let kinds = &self.map.value;
        match value {
            Value::Integer(num) => self.number(num.to_string()),
            Value::Float(num) => self.number(num.to_string()),
            Value::Boolean(flag) => self.number(u8::from(*flag).to_string()),
            Value::Symbol(Symbol::Var(slot)) => {
                BlockDescriptor::new(&kinds.variable).with_field("VAR", slot.to_string())
            }
            Value::Symbol(Symbol::Sensor(Sensor::Touch)) => BlockDescriptor::new(&kinds.touch)
                .with_field("PIN", "PIN_TOUCH")
                .with_field("MODE", "INPUT_PULLUP"),
            Value::Symbol(Symbol::Sensor(Sensor::Audio)) => BlockDescriptor::new(&kinds.mic)
                .with_field("PIN", "PIN_MIC")
                .with_field("MODE", "INPUT_PULLUP"),
            Value::Symbol(Symbol::Sensor(Sensor::Light)) => {
                BlockDescriptor::new(&kinds.light).with_field("PIN", "PIN_LIGHT")
            }
            Value::Text(text) => {
                let token = text.trim();
                if is_numeric_literal(token) {
                    return self.number(token.to_string());
                }
                let inner = if is_quoted_literal(token) {
                    &token[1..token.len() - 1]
                } else {
                    token
                };
                BlockDescriptor::new(&kinds.text).with_field("TEXT", inner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::value::{VarSlot, VarType};

    fn loop_program(main_loop: Vec<Node>) -> Program {
        Program {
            init_flags: vec![],
            setup: vec![],
            main_loop,
        }
    }

    #[test]
    fn delay_and_assignments() {
        let slot = VarSlot::clamped(VarType::Float, 2);
        let program = loop_program(vec![
            Node::delay(250),
            Node::assign(slot, AssignOp::Assign, Value::Float(1.5)),
            Node::assign(slot, AssignOp::Increment, Sensor::Light),
        ]);
        let blocks = program_to_descriptors(&program, &BlockMap::default()).main_loop;

        assert_eq!(blocks[0].kind, "custom_wait");
        assert_eq!(blocks[0].field("UNIT"), Some("MILLISECONDS"));
        assert_eq!(blocks[0].inputs["DELAY"].field("NUM"), Some("250"));
        assert_eq!(blocks[1].kind, "custom_variable_set");
        assert_eq!(blocks[1].field("VAR"), Some("F2"));
        assert_eq!(blocks[2].kind, "custom_variable_change");
        assert_eq!(blocks[2].inputs["VALUE"].kind, "emmi_light_read");
    }

    #[test]
    fn else_becomes_inverted_if() {
        let program = loop_program(vec![Node::If {
            expr: Expression::new(CompareOp::Gt, Sensor::Audio, 10),
            then: vec![Node::command("ERN")],
            otherwise: vec![Node::command("ERF")],
        }]);
        let blocks = program_to_descriptors(&program, &BlockMap::default()).main_loop;

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].inputs["IF0"].field("OP"), Some("GT"));
        assert_eq!(blocks[1].inputs["IF0"].field("OP"), Some("LTE"));
        assert_eq!(blocks[1].statements["DO0"][0].field("STATE"), Some("LOW"));
        assert_eq!(
            blocks[0].inputs["IF0"].inputs["A"].field("PIN"),
            Some("PIN_MIC")
        );
    }

    #[test]
    fn switch_default_requires_every_case_to_differ() {
        let state = VarSlot::clamped(VarType::Int, 1);
        let program = loop_program(vec![Node::Switch {
            value: Value::from(state),
            cases: vec![
                SwitchCase {
                    matches: Value::from(0),
                    body: vec![Node::command("EGN")],
                },
                SwitchCase {
                    matches: Value::from(1),
                    body: vec![Node::command("ERN")],
                },
            ],
            default: vec![Node::command("EBN")],
        }]);
        let blocks = program_to_descriptors(&program, &BlockMap::default()).main_loop;

        assert_eq!(blocks.len(), 3);
        let condition = &blocks[2].inputs["IF0"];
        assert_eq!(condition.kind, "custom_logic_and");
        assert_eq!(condition.inputs["A"].field("OP"), Some("NEQ"));
        assert_eq!(condition.inputs["B"].inputs["B"].field("NUM"), Some("1"));
    }

    #[test]
    fn caseless_switch_runs_default_inline() {
        let program = loop_program(vec![Node::Switch {
            value: Value::from(0),
            cases: vec![],
            default: vec![Node::Break],
        }]);
        let blocks = program_to_descriptors(&program, &BlockMap::default()).main_loop;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].field("FLOW"), Some("BREAK"));
    }

    #[test]
    fn loops_and_values() {
        let program = loop_program(vec![
            Node::For {
                start: 1,
                end: 5,
                step: 2,
                body: vec![Node::command("MF")],
            },
            Node::While {
                expr: Expression::new(CompareOp::Eq, Value::Text("'hi'".into()), Value::Boolean(true)),
                body: vec![],
            },
        ]);
        let blocks = program_to_descriptors(&program, &BlockMap::default()).main_loop;

        assert_eq!(blocks[0].field("VAR"), Some("i"));
        assert_eq!(blocks[0].inputs["BY"].field("NUM"), Some("2"));
        assert_eq!(blocks[0].statements["DO"][0].field("DIRECTION"), Some("FORWARD"));
        let condition = &blocks[1].inputs["BOOL"];
        assert_eq!(condition.inputs["A"].field("TEXT"), Some("hi"));
        assert_eq!(condition.inputs["B"].field("NUM"), Some("1"));
        assert!(blocks[1].statements.is_empty());
    }

    #[test]
    fn unmapped_command_warns_once() {
        let program = loop_program(vec![Node::command("ZZZ"), Node::command("ERN")]);
        let payload = program_to_descriptors(&program, &BlockMap::default());
        assert_eq!(payload.main_loop.len(), 1);
        assert_eq!(payload.warnings, vec!["Command \"ZZZ\" is not mapped to a block."]);
    }
}
