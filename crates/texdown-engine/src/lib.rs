//! texdown-engine: the editing core of texdown.
//!
//! A document is an ordered tree of paragraph lines and atomic
//! template-command blocks ("magic blocks"). The engine owns the reversible
//! translation between that tree and the plain-text markup the compiler
//! consumes, the marker protocol that encodes a block on a single line, and
//! the selection/line-mapping bookkeeping that ties an editing position to a
//! line in the serialized markup for forward/reverse sync.

pub mod editing;
pub mod host;
pub mod marker;
pub mod template;

pub use editing::{
    Caret, Cmd, Debounce, Document, EditorSession, MagicBlock, Node, NodeId, Paragraph, Patch,
    RestorePlan, RestoreToken, SelectionSnapshot, SelectionTracker, has_unmatched_begin, line_of,
    normalize, serialize, serialize_until,
};
pub use host::{HostError, ProjectRecord, SaveReceipt, SaveRequest};
pub use marker::{MARKER_END, MARKER_START, MarkerError, MarkerToken, parse_token, serialize_token};
pub use template::{
    ArgKind, ArgSpec, CommandCatalog, CommandDescriptor, Pairing, TemplateMeta, VariableField,
    parse_arg_schema,
};
