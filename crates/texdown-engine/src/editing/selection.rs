//! Caret/selection bookkeeping and the caret-to-line computation.
//!
//! The tracker keeps the last known selection alive across focus loss so
//! toolbar actions and dialog-driven edits can act "as if" the editor still
//! had focus, then restore the caret afterwards. A restore is modeled as an
//! explicit Idle → AwaitingRestore transition guarded by a token, not as an
//! incidental ordering of UI events.

use std::time::{Duration, Instant};

use crate::editing::document::Document;
use crate::editing::{Caret, NodeId, serialize};

/// A saved selection range within the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub start: Caret,
    pub end: Caret,
}

impl SelectionSnapshot {
    pub fn collapsed(caret: Caret) -> Self {
        Self {
            start: caret,
            end: caret,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Token identifying one in-flight restore operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreToken(u64);

/// Everything the host needs to re-focus the surface and reinstall the caret:
/// the selection to reinstall (if any was ever saved) and the scroll offset
/// to re-apply, since refocusing a scrollable surface resets scroll as a side
/// effect.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePlan {
    pub token: RestoreToken,
    pub selection: Option<SelectionSnapshot>,
    pub scroll_top: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreState {
    Idle,
    AwaitingRestore { token: RestoreToken },
}

/// Durable caret record for one editor surface.
#[derive(Debug)]
pub struct SelectionTracker {
    saved: Option<SelectionSnapshot>,
    state: RestoreState,
    next_token: u64,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self {
            saved: None,
            state: RestoreState::Idle,
            next_token: 0,
        }
    }

    /// Record the current selection. Suppressed while a restore is in
    /// flight, so selection churn caused by the restore itself cannot
    /// clobber the snapshot being restored.
    pub fn note_selection(&mut self, selection: SelectionSnapshot) {
        if let RestoreState::AwaitingRestore { .. } = self.state {
            log::debug!("selection change during restore suppressed");
            return;
        }
        self.saved = Some(selection);
    }

    pub fn saved(&self) -> Option<&SelectionSnapshot> {
        self.saved.as_ref()
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self.state, RestoreState::AwaitingRestore { .. })
    }

    /// Begin a programmatic focus-and-restore. Returns `None` if a restore
    /// is already in flight; the newer request is simply dropped, the lock
    /// window being short and bounded.
    pub fn begin_restore(&mut self, scroll_top: f64) -> Option<RestorePlan> {
        if self.is_restoring() {
            return None;
        }
        let token = RestoreToken(self.next_token);
        self.next_token += 1;
        self.state = RestoreState::AwaitingRestore { token };
        Some(RestorePlan {
            token,
            selection: self.saved,
            scroll_top,
        })
    }

    /// Finish the restore identified by `token`. A stale token is ignored.
    pub fn complete_restore(&mut self, token: RestoreToken) -> bool {
        match self.state {
            RestoreState::AwaitingRestore { token: current } if current == token => {
                self.state = RestoreState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Move the saved caret after a programmatic edit. Unlike
    /// [`note_selection`](Self::note_selection) this is not suppressed
    /// during a restore: the edit that moved the caret is authoritative.
    pub fn set_caret(&mut self, caret: Caret) {
        self.saved = Some(SelectionSnapshot::collapsed(caret));
    }

    /// Drop or redirect the snapshot when nodes it references are removed.
    pub fn forget_nodes(&mut self, removed: &[NodeId], fallback: Option<Caret>) {
        let Some(saved) = self.saved else { return };
        if removed.contains(&saved.start.node) || removed.contains(&saved.end.node) {
            self.saved = fallback.map(SelectionSnapshot::collapsed);
        }
    }
}

impl Default for SelectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// 1-based line in the serialized markup for the tracker's caret.
///
/// The caret's node must still be a top-level node of the tree; no selection
/// yet, or a stale node, falls back to line 1 rather than failing.
pub fn caret_line(doc: &Document, tracker: &SelectionTracker) -> usize {
    let Some(selection) = tracker.saved() else {
        return 1;
    };
    let node = selection.start.node;
    if doc.index_of(node).is_none() {
        return 1;
    }
    serialize::line_of(doc, node)
}

/// Settle-then-act timer: each qualifying event reschedules the deadline, and
/// the timer fires at most once per quiet period. Time is injected so the
/// scheduling is testable and host-agnostic.
#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Cancel any pending deadline and schedule a fresh one.
    pub fn bump(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True exactly once after a quiet period has elapsed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}
