//! Command-based editing. All tree mutations flow through [`Cmd`] so that
//! every operation is applied atomically, returns a node-level [`Patch`] and
//! leaves the caret in a well-defined position.

use std::collections::HashMap;

use crate::editing::document::{Document, MagicBlock, Node, NodeId, Paragraph};
use crate::editing::{Caret, Patch};
use crate::template::{CommandCatalog, CommandDescriptor, Pairing};

/// One editing operation on the document tree.
///
/// Plain in-paragraph typing belongs to the host's editable surface; the
/// command set covers the operations that involve atomic blocks, plus
/// [`Cmd::ReplaceText`] for hosts that resync a paragraph wholesale.
#[derive(Debug, Clone)]
pub enum Cmd {
    /// Instantiate a command from the catalog at the caret. A `begin`
    /// descriptor whose group has an `end` partner inserts both blocks with
    /// an editable blank line between them, as a single operation.
    InsertBlock {
        at: Caret,
        descriptor: CommandDescriptor,
        overrides: HashMap<String, String>,
    },
    /// Update one stored argument value of a block. Never touches the label,
    /// pairing or group.
    EditArg {
        node: NodeId,
        name: String,
        value: String,
    },
    /// Remove a block as one atomic unit, together with its pairing partner
    /// when it has one.
    DeleteBlock { node: NodeId },
    /// Backspace with the caret at the start of a node: removes the adjacent
    /// preceding block, if any. Otherwise a no-op.
    DeleteBackward { at: Caret },
    /// Forward-delete with the caret at the end of a node: removes the
    /// adjacent following block, if any. Otherwise a no-op.
    DeleteForward { at: Caret },
    /// Replace a paragraph's text. Embedded newlines split the paragraph
    /// into siblings.
    ReplaceText { node: NodeId, text: String },
}

pub(crate) fn apply(doc: &mut Document, catalog: &CommandCatalog, cmd: Cmd) -> Patch {
    let mut patch = Patch {
        removed: Vec::new(),
        inserted: Vec::new(),
        caret: None,
        version: 0,
    };

    match cmd {
        Cmd::InsertBlock {
            at,
            descriptor,
            overrides,
        } => insert_block(doc, catalog, at, &descriptor, &overrides, &mut patch),
        Cmd::EditArg { node, name, value } => edit_arg(doc, node, &name, value),
        Cmd::DeleteBlock { node } => delete_block(doc, node, &mut patch),
        Cmd::DeleteBackward { at } => delete_backward(doc, at, &mut patch),
        Cmd::DeleteForward { at } => delete_forward(doc, at, &mut patch),
        Cmd::ReplaceText { node, text } => replace_text(doc, node, &text, &mut patch),
    }

    doc.ensure_non_empty();
    doc.version += 1;
    patch.version = doc.version;
    patch
}

fn insert_block(
    doc: &mut Document,
    catalog: &CommandCatalog,
    at: Caret,
    descriptor: &CommandDescriptor,
    overrides: &HashMap<String, String>,
    patch: &mut Patch,
) {
    let block = MagicBlock::from_descriptor(descriptor, overrides);

    // Auto-pairing: a begin command with a declared end partner inserts the
    // whole balanced pair so the user never has to match them by hand.
    let mut sequence: Vec<Node> = Vec::new();
    let caret_target;

    let partner = match (descriptor.pairing, descriptor.group.as_deref()) {
        (Some(Pairing::Begin), Some(group)) => catalog.end_partner(group),
        _ => None,
    };

    if let Some(partner) = partner {
        let end_block = MagicBlock::from_descriptor(partner, &HashMap::new());
        let content_line = Paragraph::blank();
        caret_target = content_line.id;

        sequence.push(Node::Paragraph(Paragraph::blank()));
        sequence.push(Node::Magic(block));
        sequence.push(Node::Paragraph(content_line));
        sequence.push(Node::Magic(end_block));
        sequence.push(Node::Paragraph(Paragraph::blank()));
    } else {
        let landing = Paragraph::blank();
        caret_target = landing.id;

        sequence.push(Node::Paragraph(Paragraph::blank()));
        sequence.push(Node::Paragraph(Paragraph::blank()));
        sequence.push(Node::Magic(block));
        sequence.push(Node::Paragraph(landing));
        sequence.push(Node::Paragraph(Paragraph::blank()));
    }

    patch.inserted = sequence.iter().map(Node::id).collect();
    patch.caret = Some(Caret {
        node: caret_target,
        offset: 0,
    });

    let Some(index) = doc.index_of(at.node) else {
        // Stale caret: fail open by appending at the end of the tree.
        log::warn!("insert target {:?} not in tree, appending at end", at.node);
        doc.nodes.extend(sequence);
        return;
    };

    let node = &doc.nodes[index];
    let next_is_magic = doc
        .nodes
        .get(index + 1)
        .is_some_and(|next| next.as_magic().is_some());

    // An empty, non-atomic paragraph with no adjacent block is replaced
    // rather than split, so insertions don't accumulate stray blank lines.
    if node.is_blank_paragraph() && !next_is_magic {
        doc.nodes.splice(index..index + 1, sequence);
        patch.removed.push(at.node);
        return;
    }

    if let Node::Paragraph(para) = node {
        let char_count = para.text.chars().count();
        if at.offset > 0 && at.offset < char_count {
            // Mid-paragraph caret: split the paragraph around the insertion.
            let split_at: usize = para
                .text
                .char_indices()
                .nth(at.offset)
                .map(|(byte, _)| byte)
                .unwrap_or(para.text.len());
            let tail = para.text[split_at..].to_string();

            if let Node::Paragraph(para) = &mut doc.nodes[index] {
                para.text.truncate(split_at);
            }
            let tail_node = Node::Paragraph(Paragraph::new(tail));
            patch.inserted.push(tail_node.id());
            sequence.push(tail_node);
            doc.nodes.splice(index + 1..index + 1, sequence);
            return;
        }

        if at.offset == 0 && char_count > 0 {
            doc.nodes.splice(index..index, sequence);
            return;
        }
    }

    // Caret at the end of a paragraph, or on an atomic node: insert after.
    doc.nodes.splice(index + 1..index + 1, sequence);
}

fn edit_arg(doc: &mut Document, node: NodeId, name: &str, value: String) {
    let Some(block) = doc
        .nodes
        .iter_mut()
        .find(|n| n.id() == node)
        .and_then(Node::as_magic_mut)
    else {
        log::warn!("argument edit on unknown block {node:?} ignored");
        return;
    };

    match block.args.iter_mut().find(|arg| arg.name == name) {
        Some(arg) => arg.value = value,
        None => log::warn!(
            "argument {name:?} not present on block {:?}, edit ignored",
            block.label
        ),
    }
}

fn delete_block(doc: &mut Document, node: NodeId, patch: &mut Patch) {
    let Some(index) = doc.index_of(node) else {
        log::warn!("delete of unknown node {node:?} ignored");
        return;
    };
    let Some(block) = doc.nodes[index].as_magic() else {
        log::warn!("delete target {node:?} is not an atomic block, ignored");
        return;
    };

    let partner_index = match (block.pairing, block.group.clone()) {
        (Some(Pairing::Begin), Some(group)) => find_partner_forward(doc, index, &group),
        (Some(Pairing::End), Some(group)) => find_partner_backward(doc, index, &group),
        _ => None,
    };

    // Remove the higher index first so the lower one stays valid.
    let mut indices = vec![index];
    if let Some(partner) = partner_index {
        indices.push(partner);
    }
    indices.sort_unstable();

    for &i in indices.iter().rev() {
        patch.removed.push(doc.nodes[i].id());
        doc.nodes.remove(i);
    }

    doc.ensure_non_empty();
    let landing = indices[0].min(doc.nodes.len() - 1);
    patch.caret = Some(Caret {
        node: doc.nodes[landing].id(),
        offset: 0,
    });
}

/// Scan forward from a `begin` block for its matching `end`, tracking nesting
/// depth so nested pairs of the same group are skipped.
fn find_partner_forward(doc: &Document, from: usize, group: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, node) in doc.nodes.iter().enumerate().skip(from + 1) {
        let Some(block) = node.as_magic() else { continue };
        if block.group.as_deref() != Some(group) {
            continue;
        }
        match block.pairing {
            Some(Pairing::Begin) => depth += 1,
            Some(Pairing::End) => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            None => {}
        }
    }
    None
}

/// Mirror image of [`find_partner_forward`] for deleting an `end` block.
fn find_partner_backward(doc: &Document, from: usize, group: &str) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..from).rev() {
        let Some(block) = doc.nodes[i].as_magic() else { continue };
        if block.group.as_deref() != Some(group) {
            continue;
        }
        match block.pairing {
            Some(Pairing::End) => depth += 1,
            Some(Pairing::Begin) => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            None => {}
        }
    }
    None
}

fn delete_backward(doc: &mut Document, at: Caret, patch: &mut Patch) {
    if at.offset != 0 {
        return;
    }
    let Some(index) = doc.index_of(at.node) else { return };
    if index == 0 {
        return;
    }
    let preceding = doc.nodes[index - 1].as_magic().map(|block| block.id);
    if let Some(id) = preceding {
        delete_block(doc, id, patch);
    }
}

fn delete_forward(doc: &mut Document, at: Caret, patch: &mut Patch) {
    let Some(index) = doc.index_of(at.node) else { return };

    let at_end = match &doc.nodes[index] {
        Node::Paragraph(para) => at.offset >= para.text.chars().count(),
        Node::Magic(_) => true,
    };
    if !at_end {
        return;
    }

    let following = doc
        .nodes
        .get(index + 1)
        .and_then(Node::as_magic)
        .map(|block| block.id);
    if let Some(id) = following {
        delete_block(doc, id, patch);
    }
}

fn replace_text(doc: &mut Document, node: NodeId, text: &str, patch: &mut Patch) {
    let Some(index) = doc.index_of(node) else {
        log::warn!("text replacement on unknown node {node:?} ignored");
        return;
    };
    if doc.nodes[index].as_magic().is_some() {
        log::warn!("text replacement on atomic block {node:?} ignored");
        return;
    }

    let mut lines = text.split('\n');
    let first = lines.next().unwrap_or_default().to_string();
    let first_len = first.chars().count();
    if let Node::Paragraph(para) = &mut doc.nodes[index] {
        para.text = first;
    }

    let extra: Vec<Node> = lines
        .map(|line| Node::Paragraph(Paragraph::new(line)))
        .collect();

    let caret = match extra.last() {
        Some(last) => Caret {
            node: last.id(),
            offset: text
                .rsplit('\n')
                .next()
                .map(|l| l.chars().count())
                .unwrap_or(0),
        },
        None => Caret {
            node,
            offset: first_len,
        },
    };

    patch.inserted = extra.iter().map(Node::id).collect();
    doc.nodes.splice(index + 1..index + 1, extra);
    patch.caret = Some(caret);
}

/// Whether the tree before `before` contains an unmatched `begin` of `group`.
///
/// Used to warn before inserting a lone `end` command that has no open
/// `begin` above the caret. Same depth discipline as partner matching.
pub fn has_unmatched_begin(doc: &Document, before: NodeId, group: &str) -> bool {
    let mut depth = 0usize;
    for node in doc.nodes() {
        if node.id() == before {
            break;
        }
        let Some(block) = node.as_magic() else { continue };
        if block.group.as_deref() != Some(group) {
            continue;
        }
        match block.pairing {
            Some(Pairing::Begin) => depth += 1,
            Some(Pairing::End) => depth = depth.saturating_sub(1),
            None => {}
        }
    }
    depth > 0
}
