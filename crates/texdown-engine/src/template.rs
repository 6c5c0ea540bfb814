//! Template catalog types as supplied by the host for one document template:
//! variable-field declarations for the outer document, and the command
//! descriptors the editor can instantiate as magic blocks.

use serde::{Deserialize, Serialize};

/// Pairing role of a block-structured command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pairing {
    Begin,
    End,
}

/// One command the template offers, as declared in template metadata.
///
/// `args` is the raw schema string `"name:type:default|name:type:default|..."`;
/// use [`parse_arg_schema`] to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub label: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub tab: String,
    #[serde(default)]
    pub pairing: Option<Pairing>,
    #[serde(default)]
    pub group: Option<String>,
}

/// Editing affordance for one command argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgKind {
    /// Single-line free text.
    Text,
    /// Multi-line free text.
    Multiline,
    /// Single choice from a fixed option list.
    Select(Vec<String>),
    /// Reference to an uploaded image path.
    Image,
}

/// One decoded entry of a command's argument schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    pub default: String,
}

/// Decode a schema string into its ordered argument specs.
///
/// Entries are `name:type:default`, separated by `|`. Missing type defaults
/// to free text; a `select` type carries its options comma-separated after
/// the keyword (`"select,left,center,right"`). Empty entries are skipped.
pub fn parse_arg_schema(schema: &str) -> Vec<ArgSpec> {
    schema
        .split('|')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            let name = parts[0].trim().to_string();
            let type_def = parts.get(1).map(|t| t.trim()).unwrap_or("text");
            let default = parts.get(2).map(|d| d.to_string()).unwrap_or_default();

            let kind = if type_def.starts_with("select") {
                let options = type_def
                    .split(',')
                    .skip(1)
                    .map(|opt| opt.trim().to_string())
                    .filter(|opt| !opt.is_empty())
                    .collect();
                ArgKind::Select(options)
            } else if type_def == "textarea" {
                ArgKind::Multiline
            } else if type_def == "image" {
                ArgKind::Image
            } else {
                ArgKind::Text
            };

            ArgSpec { name, kind, default }
        })
        .collect()
}

/// A variable field of the outer document (title page data, margins and the
/// like). Opaque to the engine; carried so hosts can round-trip template
/// metadata through one record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableField {
    #[serde(default)]
    pub tab: String,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub default: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Template metadata record as fetched from the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(default)]
    pub variables: Vec<VariableField>,
    #[serde(default)]
    pub magic_commands: Vec<CommandDescriptor>,
}

/// The command catalog of the currently loaded template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandCatalog {
    commands: Vec<CommandDescriptor>,
}

impl CommandCatalog {
    pub fn new(commands: Vec<CommandDescriptor>) -> Self {
        Self { commands }
    }

    /// Empty catalog, for hosts that hydrate markup without template metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_meta(meta: &TemplateMeta) -> Self {
        Self::new(meta.magic_commands.clone())
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    pub fn find(&self, label: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|cmd| cmd.label == label)
    }

    /// The `end` command of a pairing group, if the template declares one.
    pub fn end_partner(&self, group: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|cmd| {
            cmd.pairing == Some(Pairing::End) && cmd.group.as_deref() == Some(group)
        })
    }

    /// The `begin` command of a pairing group, if the template declares one.
    pub fn begin_partner(&self, group: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|cmd| {
            cmd.pairing == Some(Pairing::Begin) && cmd.group.as_deref() == Some(group)
        })
    }
}
