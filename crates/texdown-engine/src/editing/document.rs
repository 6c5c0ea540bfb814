use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::marker::{self, MarkerToken};
use crate::template::{ArgSpec, CommandCatalog, CommandDescriptor, Pairing, parse_arg_schema};

/// Stable identity of one top-level node. Ids survive argument edits and
/// sibling insertions/removals, so selection bookkeeping can reference a node
/// across tree mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// One named argument of a magic block, holding the full stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgValue {
    pub name: String,
    pub value: String,
}

impl ArgValue {
    /// Compact on-surface label for this argument: newlines collapsed to
    /// spaces, long values truncated with an ellipsis. The full value stays
    /// untouched for serialization and for re-opening the edit view.
    pub fn display(&self) -> String {
        let flat = self.value.replace('\n', " ");
        if flat.chars().count() > 15 {
            let head: String = flat.chars().take(12).collect();
            format!("{head}...")
        } else {
            flat
        }
    }
}

/// An atomic, non-subdivisible node representing one instance of a templated
/// command. Opaque to the serializer and to editing operations: it is created,
/// mutated in place and destroyed only as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagicBlock {
    pub id: NodeId,
    pub label: String,
    pub args: Vec<ArgValue>,
    /// Schema the template declared for this command. Empty on blocks
    /// hydrated from markup alone, since markup carries no schema.
    #[serde(default)]
    pub schema: Vec<ArgSpec>,
    #[serde(default)]
    pub pairing: Option<Pairing>,
    #[serde(default)]
    pub group: Option<String>,
}

impl MagicBlock {
    /// Build a block from a catalog descriptor, taking argument values from
    /// `overrides` where present and from the schema defaults otherwise.
    pub fn from_descriptor(
        descriptor: &CommandDescriptor,
        overrides: &HashMap<String, String>,
    ) -> Self {
        let schema = parse_arg_schema(&descriptor.args);
        let args = schema
            .iter()
            .map(|spec| ArgValue {
                name: spec.name.clone(),
                value: overrides
                    .get(&spec.name)
                    .cloned()
                    .unwrap_or_else(|| spec.default.clone()),
            })
            .collect();

        Self {
            id: NodeId::new(),
            label: descriptor.label.clone(),
            args,
            schema,
            pairing: descriptor.pairing,
            group: descriptor.group.clone(),
        }
    }

    /// Rebuild a block from a parsed marker token, resolving pairing metadata
    /// and schema from the catalog when the label is known there.
    pub fn from_token(token: MarkerToken, catalog: &CommandCatalog) -> Self {
        let descriptor = catalog.find(&token.label);
        Self {
            id: NodeId::new(),
            label: token.label,
            args: token
                .args
                .into_iter()
                .map(|(name, value)| ArgValue { name, value })
                .collect(),
            schema: descriptor
                .map(|d| parse_arg_schema(&d.args))
                .unwrap_or_default(),
            pairing: descriptor.and_then(|d| d.pairing),
            group: descriptor.and_then(|d| d.group.clone()),
        }
    }

    pub fn arg(&self, name: &str) -> Option<&ArgValue> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// The block's marker token text.
    pub fn marker(&self) -> Result<String, marker::MarkerError> {
        let pairs: Vec<(String, String)> = self
            .args
            .iter()
            .map(|arg| (arg.name.clone(), arg.value.clone()))
            .collect();
        marker::serialize_token(&self.label, &pairs)
    }
}

/// A block-level container holding one logical line of text. An empty
/// paragraph is the blank-line placeholder that keeps a valid insertion point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: NodeId,
    pub text: String,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            text: text.into(),
        }
    }

    pub fn blank() -> Self {
        Self::new("")
    }
}

/// One top-level node of the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Paragraph(Paragraph),
    Magic(MagicBlock),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Paragraph(p) => p.id,
            Node::Magic(b) => b.id,
        }
    }

    pub fn as_magic(&self) -> Option<&MagicBlock> {
        match self {
            Node::Magic(block) => Some(block),
            Node::Paragraph(_) => None,
        }
    }

    pub fn as_magic_mut(&mut self) -> Option<&mut MagicBlock> {
        match self {
            Node::Magic(block) => Some(block),
            Node::Paragraph(_) => None,
        }
    }

    pub fn is_blank_paragraph(&self) -> bool {
        matches!(self, Node::Paragraph(p) if p.text.trim().is_empty())
    }
}

/// The document tree: an ordered sequence of paragraphs and atomic magic
/// blocks. The serde form of this type is the "raw tree snapshot" the
/// persistence boundary may store and feed back, preserving schema metadata
/// that markup alone cannot carry.
///
/// Invariant: the tree is never empty. Even after every node is deleted it
/// holds one empty paragraph, so typing always has a valid insertion point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub(crate) nodes: Vec<Node>,
    pub(crate) version: u64,
}

// Hand-rolled so a snapshot with an empty node list cannot smuggle in an
// empty tree; the invariant is restored on the way in.
impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Snapshot {
            nodes: Vec<Node>,
            #[serde(default)]
            version: u64,
        }

        let snapshot = Snapshot::deserialize(deserializer)?;
        let mut doc = Document {
            nodes: snapshot.nodes,
            version: snapshot.version,
        };
        doc.ensure_non_empty();
        Ok(doc)
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Paragraph(Paragraph::blank())],
            version: 0,
        }
    }

    /// Hydrate a tree from stored markup.
    ///
    /// Line-oriented: each line either full-line-matches the marker grammar
    /// and becomes a magic block, or becomes a paragraph. A line that merely
    /// resembles a marker is kept as prose; hydration never rejects input.
    pub fn from_markup(text: &str, catalog: &CommandCatalog) -> Self {
        if text.is_empty() {
            return Self::new();
        }

        let mut nodes = Vec::new();
        for line in text.split('\n') {
            let trimmed = line.trim();
            if let Some(token) = marker::parse_token(trimmed) {
                nodes.push(Node::Magic(MagicBlock::from_token(token, catalog)));
            } else if trimmed.is_empty() {
                nodes.push(Node::Paragraph(Paragraph::blank()));
            } else {
                nodes.push(Node::Paragraph(Paragraph::new(line)));
            }
        }

        if nodes.is_empty() {
            nodes.push(Node::Paragraph(Paragraph::blank()));
        }

        Self { nodes, version: 0 }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.id() == id)
    }

    /// Id of the last node; the default caret target when no selection has
    /// been recorded yet.
    pub fn last_node_id(&self) -> NodeId {
        // Never-empty invariant: there is always at least one node.
        self.nodes[self.nodes.len() - 1].id()
    }

    /// Caret at the very end of the document.
    pub fn end_caret(&self) -> crate::editing::Caret {
        let last = &self.nodes[self.nodes.len() - 1];
        let offset = match last {
            Node::Paragraph(p) => p.text.chars().count(),
            Node::Magic(_) => 0,
        };
        crate::editing::Caret {
            node: last.id(),
            offset,
        }
    }

    /// Restore the never-empty invariant after removals.
    pub(crate) fn ensure_non_empty(&mut self) {
        if self.nodes.is_empty() {
            self.nodes.push(Node::Paragraph(Paragraph::blank()));
        }
    }

    /// Apply an editing command, returning the node-level patch.
    pub fn apply(
        &mut self,
        catalog: &CommandCatalog,
        cmd: crate::editing::Cmd,
    ) -> crate::editing::Patch {
        crate::editing::commands::apply(self, catalog, cmd)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
