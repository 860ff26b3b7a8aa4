//! Mapping between programs and visual block graphs
//!
//! Programs are first lowered to [`BlockDescriptor`] trees, then each
//! descriptor is instantiated through the [`Workspace`] trait. The mapper is
//! purely additive: it never inspects or replaces what the workspace already
//! holds.

/// Program to block-descriptor translation
pub mod descriptors;
/// Command-to-block mapping table
pub mod table;
/// Workspace collaborator trait and in-memory implementation
pub mod workspace;

pub use descriptors::{BlocklyProgram, program_to_descriptors};
pub use table::{BaseBlock, BlockDescriptor, BlockMap, CommandEntry, StructuralKinds, ValueKinds};
pub use workspace::{Attachment, BlockId, BlockRequest, MemoryWorkspace, PlacedBlock, Workspace};

use serde::Serialize;
use tracing::debug;

use crate::compiler::ast::Program;
use crate::compiler::parser::{parse_script, parse_token_list};
use crate::error::CompileResult;
use descriptors::DescriptorBuilder;

/// Outcome of a mapping call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MapReport {
    /// Root block holding the setup and loop stacks, when one was created
    pub base: Option<BlockId>,
    /// Program blocks created, not counting the root
    pub instantiated: usize,
    /// Everything that could not be mapped
    pub warnings: Vec<String>,
}

/// Instantiate a program under a fresh root block.
pub fn map_program_to_blocks<W>(workspace: &mut W, program: &Program, map: &BlockMap) -> MapReport
where
    W: Workspace + ?Sized,
{
    let payload = program_to_descriptors(program, map);
    let mut placer = Placer::new(workspace, payload.warnings);

    let root = BlockRequest {
        kind: map.base.kind.clone(),
        fields: Default::default(),
        attach: Attachment::Root,
    };
    let base = match placer.workspace.instantiate(root) {
        Ok(id) => id,
        Err(err) => {
            placer
                .warnings
                .push(format!("Base block type not found: {} ({err})", map.base.kind));
            return placer.finish(None);
        }
    };

    placer.chain(
        &payload.setup,
        Attachment::Statement {
            parent: base,
            name: map.base.setup_input.clone(),
        },
    );
    placer.chain(
        &payload.main_loop,
        Attachment::Statement {
            parent: base,
            name: map.base.loop_input.clone(),
        },
    );
    placer.finish(Some(base))
}

/// Instantiate the blocks for a single command token as a free-standing stack.
pub fn map_command_token<W>(workspace: &mut W, token: &str, map: &BlockMap) -> MapReport
where
    W: Workspace + ?Sized,
{
    let mut builder = DescriptorBuilder::new(map);
    let descriptors = builder.command(token.trim());
    let mut placer = Placer::new(workspace, builder.warnings);
    placer.chain(&descriptors, Attachment::Root);
    placer.finish(None)
}

/// Parse wire text and instantiate it.
///
/// A full `|I|..|S|..|L|..|` script is mapped under a root block; a bare token
/// stream such as `ERN|D200` becomes one free-standing stack.
pub fn map_script_to_blocks<W>(workspace: &mut W, text: &str, map: &BlockMap) -> CompileResult<MapReport>
where
    W: Workspace + ?Sized,
{
    let trimmed = text.trim();
    if trimmed.starts_with("|I|") {
        let program = parse_script(trimmed)?;
        return Ok(map_program_to_blocks(workspace, &program, map));
    }

    let nodes = parse_token_list(trimmed)?;
    let mut builder = DescriptorBuilder::new(map);
    let descriptors = builder.node_list(&nodes);
    let mut placer = Placer::new(workspace, builder.warnings);
    placer.chain(&descriptors, Attachment::Root);
    Ok(placer.finish(None))
}

struct Placer<'w, W: ?Sized> {
    workspace: &'w mut W,
    instantiated: usize,
    warnings: Vec<String>,
}

impl<'w, W: Workspace + ?Sized> Placer<'w, W> {
    fn new(workspace: &'w mut W, warnings: Vec<String>) -> Self {
        Self {
            workspace,
            instantiated: 0,
            warnings,
        }
    }

    fn chain(&mut self, descriptors: &[BlockDescriptor], head: Attachment) {
        let mut previous = None;
        for descriptor in descriptors {
            let attach = match previous {
                Some(previous) => Attachment::Next { previous },
                None => head.clone(),
            };
            if let Some(id) = self.place(descriptor, attach) {
                previous = Some(id);
            }
        }
    }

    // A rejected block takes its children with it.
    fn place(&mut self, descriptor: &BlockDescriptor, attach: Attachment) -> Option<BlockId> {
        let request = BlockRequest {
            kind: descriptor.kind.clone(),
            fields: descriptor.fields.clone(),
            attach,
        };
        let id = match self.workspace.instantiate(request) {
            Ok(id) => id,
            Err(err) => {
                self.warnings.push(err.to_string());
                return None;
            }
        };
        self.instantiated += 1;

        for (name, child) in &descriptor.inputs {
            self.place(
                child,
                Attachment::Input {
                    parent: id,
                    name: name.clone(),
                },
            );
        }
        for (name, chain) in &descriptor.statements {
            self.chain(
                chain,
                Attachment::Statement {
                    parent: id,
                    name: name.clone(),
                },
            );
        }
        Some(id)
    }

    fn finish(self, base: Option<BlockId>) -> MapReport {
        debug!(
            instantiated = self.instantiated,
            warnings = self.warnings.len(),
            "mapped program to blocks"
        );
        MapReport {
            base,
            instantiated: self.instantiated,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::Node;

    #[test]
    fn setup_and_loop_hang_off_the_root() {
        let program = Program {
            init_flags: vec![],
            setup: vec![Node::command("BS")],
            main_loop: vec![Node::command("ERN"), Node::delay(100)],
        };
        let mut workspace = MemoryWorkspace::new();
        let report = map_program_to_blocks(&mut workspace, &program, &BlockMap::default());

        let base = report.base.expect("root block");
        assert_eq!(report.instantiated, 4);
        assert!(report.warnings.is_empty());
        let setup: Vec<_> = workspace.children(base, "SETUP").iter().map(|b| b.kind.clone()).collect();
        assert_eq!(setup, vec!["emmi_buzzer_stop"]);
        let main_loop: Vec<_> = workspace.children(base, "LOOP").iter().map(|b| b.kind.clone()).collect();
        assert_eq!(main_loop, vec!["emmi_eyes_digital", "custom_wait"]);
    }

    #[test]
    fn missing_kinds_become_warnings() {
        let map = BlockMap::default();
        let mut workspace = MemoryWorkspace::with_known_kinds(["base_setup_loop", "custom_controls_if"]);
        let program = Program {
            init_flags: vec![],
            setup: vec![],
            main_loop: vec![Node::If {
                expr: crate::compiler::ast::Expression::never(),
                then: vec![Node::Break],
                otherwise: vec![],
            }],
        };
        let report = map_program_to_blocks(&mut workspace, &program, &map);

        assert_eq!(report.instantiated, 1);
        assert!(report.warnings.contains(&"Missing block type: logic_compare".to_string()));
        assert!(report.warnings.contains(&"Missing block type: custom_flow_statements".to_string()));
    }

    #[test]
    fn missing_base_stops_mapping() {
        let mut workspace = MemoryWorkspace::with_known_kinds(["emmi_eyes_digital"]);
        let program = Program {
            init_flags: vec![],
            setup: vec![],
            main_loop: vec![Node::command("ERN")],
        };
        let report = map_program_to_blocks(&mut workspace, &program, &BlockMap::default());
        assert_eq!(report.base, None);
        assert_eq!(report.instantiated, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(workspace.is_empty());
    }

    #[test]
    fn token_streams_map_without_root() {
        let mut workspace = MemoryWorkspace::new();
        let report =
            map_script_to_blocks(&mut workspace, "EAN|D200|EAF", &BlockMap::default()).unwrap();
        assert_eq!(report.base, None);
        assert_eq!(report.instantiated, 8);
        assert!(map_script_to_blocks(&mut workspace, "ERN|(", &BlockMap::default()).is_err());
    }
}
