//! Boundary contracts with the excluded host collaborators: persistence,
//! compilation, position sync and image upload. Only the shapes the engine
//! depends on live here; transport, storage layout and rendering are the
//! host's business.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::editing::Document;

/// Errors surfaced by host collaborators. These are the only errors that
/// cross the engine/host boundary; the engine core itself resolves its own
/// failure modes with defined fallbacks instead of erroring.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host service unavailable: {0}")]
    Unavailable(String),
    #[error("host rejected the request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the engine hands over on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub title: String,
    pub markup: String,
    pub template: String,
    pub variables: HashMap<String, String>,
    /// Raw tree snapshot; optional because legacy projects may only ever
    /// have stored markup.
    #[serde(default)]
    pub tree: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub id: String,
}

/// A persisted project as loaded from the host. Hydration accepts either
/// representation and prefers the tree snapshot when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub title: String,
    #[serde(default)]
    pub markup: Option<String>,
    #[serde(default)]
    pub tree: Option<Document>,
    pub template: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

pub trait ProjectStore {
    fn save(&mut self, request: SaveRequest) -> Result<SaveReceipt, HostError>;
    fn load(&self, id: &str) -> Result<ProjectRecord, HostError>;
}

pub trait Compiler {
    /// Compile markup to the output artifact (a PDF, in the reference host).
    fn compile(
        &self,
        markup: &str,
        template: &str,
        variables: &HashMap<String, String>,
        title: &str,
    ) -> Result<Vec<u8>, HostError>;
}

/// Bidirectional mapping between serialized-markup lines and output pages.
pub trait PositionSync {
    fn forward(&self, project: &str, line: usize) -> Result<u32, HostError>;
    fn reverse(&self, project: &str, page: u32) -> Result<usize, HostError>;
}

pub trait ImageStore {
    /// Store an uploaded image; the returned path becomes the value of an
    /// image-typed block argument.
    fn upload(&mut self, project: &str, bytes: &[u8]) -> Result<String, HostError>;
}
