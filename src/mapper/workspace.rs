//! Visual workspace collaborator
//!
//! The mapper only ever asks a workspace to create blocks and to report what
//! it holds. Rendering, undo, and editing stay on the other side of the trait.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::WorkspaceError;

/// Identifier assigned to a block by the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a new block is connected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    /// Free-standing top-level block
    Root,
    /// Output plugged into a value input of `parent`
    Input {
        /// Owning block
        parent: BlockId,
        /// Input name, e.g. `IF0`
        name: String,
    },
    /// First block of a statement input of `parent`
    Statement {
        /// Owning block
        parent: BlockId,
        /// Input name, e.g. `DO0`
        name: String,
    },
    /// Chained after `previous` in the same stack
    Next {
        /// Preceding block
        previous: BlockId,
    },
}

impl Attachment {
    /// Block this attachment refers to, if any
    pub fn anchor(&self) -> Option<BlockId> {
        match self {
            Attachment::Root => None,
            Attachment::Input { parent, .. } | Attachment::Statement { parent, .. } => {
                Some(*parent)
            }
            Attachment::Next { previous } => Some(*previous),
        }
    }
}

/// Request to instantiate one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRequest {
    /// Block kind identifier
    pub kind: String,
    /// Pre-filled field values
    pub fields: BTreeMap<String, String>,
    /// Connection point
    pub attach: Attachment,
}

/// A block as held by a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedBlock {
    /// Identifier assigned at instantiation
    pub id: BlockId,
    /// Block kind identifier
    pub kind: String,
    /// Field values
    pub fields: BTreeMap<String, String>,
    /// Connection point
    pub attach: Attachment,
}

/// Handle to a visual block workspace
pub trait Workspace {
    /// Instantiate a block of kind `request.kind` with the given fields
    fn instantiate(&mut self, request: BlockRequest) -> Result<BlockId, WorkspaceError>;

    /// Snapshot of every block in creation order
    fn graph(&self) -> Vec<PlacedBlock>;
}

/// In-memory workspace, optionally restricted to a set of known block kinds
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkspace {
    known_kinds: Option<BTreeSet<String>>,
    blocks: Vec<PlacedBlock>,
}

impl MemoryWorkspace {
    /// Workspace that accepts every block kind
    pub fn new() -> Self {
        Self::default()
    }

    /// Workspace that rejects kinds outside `kinds`
    pub fn with_known_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_kinds: Some(kinds.into_iter().map(Into::into).collect()),
            blocks: Vec::new(),
        }
    }

    /// Blocks in creation order
    pub fn blocks(&self) -> &[PlacedBlock] {
        &self.blocks
    }

    /// Look up a block by id
    pub fn block(&self, id: BlockId) -> Option<&PlacedBlock> {
        self.blocks.get(id.0)
    }

    /// Number of blocks held
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the workspace holds no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks attached directly to a statement or value input of `parent`
    pub fn children(&self, parent: BlockId, input: &str) -> Vec<&PlacedBlock> {
        let mut chain = Vec::new();
        let head = self.blocks.iter().find(|block| match &block.attach {
            Attachment::Statement { parent: p, name } | Attachment::Input { parent: p, name } => {
                *p == parent && name == input
            }
            _ => false,
        });
        let mut current = head;
        while let Some(block) = current {
            chain.push(block);
            current = self
                .blocks
                .iter()
                .find(|next| next.attach == Attachment::Next { previous: block.id });
        }
        chain
    }
}

impl Workspace for MemoryWorkspace {
    fn instantiate(&mut self, request: BlockRequest) -> Result<BlockId, WorkspaceError> {
        if let Some(known) = &self.known_kinds {
            if !known.contains(&request.kind) {
                return Err(WorkspaceError::UnknownKind(request.kind));
            }
        }
        if let Some(anchor) = request.attach.anchor() {
            if self.block(anchor).is_none() {
                return Err(WorkspaceError::UnknownBlock(anchor));
            }
        }

        let id = BlockId(self.blocks.len());
        self.blocks.push(PlacedBlock {
            id,
            kind: request.kind,
            fields: request.fields,
            attach: request.attach,
        });
        Ok(id)
    }

    fn graph(&self) -> Vec<PlacedBlock> {
        self.blocks.clone()
    }
}
