//! The per-surface editor controller.
//!
//! One `EditorSession` is created when an editor surface is mounted and
//! dropped when it unmounts; it owns the document tree, the command catalog
//! of the loaded template, the selection tracker and the sync debounce.
//! Hosts drive it from their event loop and query it for markup and line
//! numbers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::editing::document::{Document, Node};
use crate::editing::selection::{
    Debounce, RestorePlan, RestoreToken, SelectionSnapshot, SelectionTracker, caret_line,
};
use crate::editing::{Cmd, Patch, commands, serialize};
use crate::host::ProjectRecord;
use crate::template::{CommandCatalog, CommandDescriptor, Pairing};

pub struct EditorSession {
    doc: Document,
    catalog: CommandCatalog,
    tracker: SelectionTracker,
    sync_debounce: Debounce,
    dirty: bool,
}

impl EditorSession {
    pub fn new(catalog: CommandCatalog) -> Self {
        Self {
            doc: Document::new(),
            catalog,
            tracker: SelectionTracker::new(),
            sync_debounce: Debounce::default(),
            dirty: false,
        }
    }

    pub fn from_markup(markup: &str, catalog: CommandCatalog) -> Self {
        let mut session = Self::new(catalog);
        session.doc = Document::from_markup(markup, &session.catalog);
        session
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    /// Replace the tree from stored markup, resetting selection and dirt.
    pub fn load_markup(&mut self, markup: &str) {
        self.doc = Document::from_markup(markup, &self.catalog);
        self.tracker = SelectionTracker::new();
        self.dirty = false;
    }

    /// Load a persisted project record. The raw tree snapshot is preferred
    /// over markup when both are present, since it preserves block schema
    /// metadata that markup cannot carry.
    pub fn load_record(&mut self, record: &ProjectRecord) {
        match (&record.tree, &record.markup) {
            (Some(tree), _) => {
                self.doc = tree.clone();
                self.doc.ensure_non_empty();
                self.tracker = SelectionTracker::new();
                self.dirty = false;
            }
            (None, Some(markup)) => self.load_markup(markup),
            (None, None) => self.load_markup(""),
        }
    }

    /// Current canonical markup, as persisted and compiled.
    pub fn markup(&self) -> String {
        serialize::serialize(&self.doc)
    }

    /// Apply an editing command; bookkeeping for dirt and caret included.
    pub fn apply(&mut self, cmd: Cmd) -> Patch {
        let patch = self.doc.apply(&self.catalog, cmd);
        self.tracker.forget_nodes(&patch.removed, patch.caret);
        if let Some(caret) = patch.caret {
            self.tracker.set_caret(caret);
        }
        self.dirty = true;
        patch
    }

    /// Insert a command at the saved caret, falling back to the end of the
    /// document when no selection has been recorded yet.
    pub fn insert_at_caret(
        &mut self,
        descriptor: CommandDescriptor,
        overrides: HashMap<String, String>,
    ) -> Patch {
        let at = self
            .tracker
            .saved()
            .map(|sel| sel.start)
            .unwrap_or_else(|| self.doc.end_caret());
        self.apply(Cmd::InsertBlock {
            at,
            descriptor,
            overrides,
        })
    }

    /// Whether inserting this descriptor warrants a "lone end" confirmation:
    /// an `end` command whose group has no unmatched `begin` above the caret.
    pub fn needs_lone_end_confirmation(&self, descriptor: &CommandDescriptor) -> bool {
        let (Some(Pairing::End), Some(group)) = (descriptor.pairing, descriptor.group.as_deref())
        else {
            return false;
        };
        let Some(selection) = self.tracker.saved() else {
            return true;
        };
        if self.doc.index_of(selection.start.node).is_none() {
            return true;
        }
        !commands::has_unmatched_begin(&self.doc, selection.start.node, group)
    }

    // --- selection plumbing -------------------------------------------------

    pub fn note_selection(&mut self, selection: SelectionSnapshot) {
        self.tracker.note_selection(selection);
    }

    pub fn begin_restore(&mut self, scroll_top: f64) -> Option<RestorePlan> {
        self.tracker.begin_restore(scroll_top)
    }

    pub fn complete_restore(&mut self, token: RestoreToken) -> bool {
        self.tracker.complete_restore(token)
    }

    pub fn selection(&self) -> Option<&SelectionSnapshot> {
        self.tracker.saved()
    }

    /// 1-based serialized line of the caret; line 1 when nothing is known.
    pub fn caret_line(&self) -> usize {
        caret_line(&self.doc, &self.tracker)
    }

    // --- sync debounce ------------------------------------------------------

    /// Override the quiet period before forward sync fires. Hosts take the
    /// delay from their config; the default is [`Debounce::DEFAULT_DELAY`].
    pub fn set_sync_debounce(&mut self, delay: Duration) {
        self.sync_debounce = Debounce::new(delay);
    }

    /// Feed a qualifying caret/edit event into the sync debounce.
    pub fn note_sync_activity(&mut self, now: Instant) {
        self.sync_debounce.bump(now);
    }

    /// Poll the debounce; yields the caret line at most once per quiet
    /// period, the value to hand to the forward-sync boundary.
    pub fn poll_sync(&mut self, now: Instant) -> Option<usize> {
        self.sync_debounce.fire(now).then(|| self.caret_line())
    }

    // --- autosave discipline ------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Check-and-clear for the host's autosave timer: redundant saves are
    /// suppressed by the flag itself.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Find a magic block by label, first match in tree order. Convenience
    /// for hosts wiring edit dialogs.
    pub fn find_block(&self, label: &str) -> Option<&crate::editing::MagicBlock> {
        self.doc
            .nodes()
            .iter()
            .filter_map(Node::as_magic)
            .find(|block| block.label == label)
    }
}
