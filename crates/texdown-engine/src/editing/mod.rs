/*!
 * # Editing Core Module
 *
 * The document tree is the single source of truth for a project's content;
 * everything in this module exists to keep that tree, its serialized markup
 * form and the user's caret in agreement.
 *
 * ## Architecture Overview
 *
 * ### 1. Linear document model
 * - The tree is an ordered sequence of top-level nodes: paragraph containers
 *   (one logical line each) and atomic **magic blocks** standing in for
 *   templated commands.
 * - Magic blocks are opaque units: the serializer never descends into them
 *   and editing operations create, mutate and destroy them only as a whole,
 *   so no partial block state is ever observable.
 *
 * ### 2. Command-based editing
 * - Structural edits flow through the [`Cmd`] enum and
 *   [`Document::apply`](document::Document::apply), each application
 *   returning a node-level [`Patch`] with the removed/inserted ids and the
 *   caret's landing position.
 * - Paired begin/end commands are inserted and deleted together as single
 *   operations, with a nesting-depth scan to match partners.
 *
 * ### 3. Reversible serialization
 * - [`serialize`](serialize::serialize) walks the tree to canonical markup;
 *   [`Document::from_markup`](document::Document::from_markup) hydrates the
 *   inverse. `hydrate(serialize(t))` re-serializes byte-identically.
 * - A "stop before node" walk produces the prefix that maps a caret to its
 *   1-based line in the serialized markup, the currency of forward/reverse
 *   sync with compiled output.
 *
 * ### 4. Durable selection
 * - [`SelectionTracker`](selection::SelectionTracker) snapshots the caret
 *   across focus loss and guards programmatic restores with an explicit
 *   Idle/AwaitingRestore state machine, so transient selection events during
 *   a restore cannot clobber the snapshot being restored.
 * - [`EditorSession`](session::EditorSession) is the controller owning the
 *   tree, the catalog, the tracker and the sync debounce; hosts hold one per
 *   mounted editor surface. No process-wide state.
 */

pub mod commands;
pub mod document;
pub mod selection;
pub mod serialize;
pub mod session;

pub use commands::{Cmd, has_unmatched_begin};
pub use document::{ArgValue, Document, MagicBlock, Node, NodeId, Paragraph};
pub use selection::{Debounce, RestorePlan, RestoreToken, SelectionSnapshot, SelectionTracker};
pub use serialize::{line_of, normalize, serialize, serialize_until};
pub use session::EditorSession;

/// A caret position: a top-level node plus a character offset within it.
/// Offsets into atomic blocks are meaningless and treated as the block
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub node: NodeId,
    pub offset: usize,
}

/// Result of applying a command to the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Ids removed from the tree, in removal order.
    pub removed: Vec<NodeId>,
    /// Ids inserted into the tree.
    pub inserted: Vec<NodeId>,
    /// Where the caret lands after the edit, when the edit moves it.
    pub caret: Option<Caret>,
    /// Document version after the edit.
    pub version: u64,
}
