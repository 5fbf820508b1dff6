use serde::{Deserialize, Serialize};

use crate::core::Editor;
use crate::error::ValueError;
use crate::plugin::PluginRegistry;
use crate::tree::Document;

pub const DOCUMENT_SCHEMA: &str = "plate-table";
pub const DOCUMENT_VERSION: u32 = 1;

/// Persisted form of a document: the interchange tree tagged with the schema
/// and format version it was written with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    pub schema: String,
    pub version: u32,
    pub document: Document,
}

impl DocumentValue {
    pub fn from_editor(editor: &Editor) -> Self {
        Self {
            schema: DOCUMENT_SCHEMA.to_string(),
            version: DOCUMENT_VERSION,
            document: editor.to_document(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ValueError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and checks the envelope. Other schemas and versions newer than
    /// this build understands are refused; older versions load as-is.
    pub fn from_json_str(s: &str) -> Result<Self, ValueError> {
        let value: Self = serde_json::from_str(s)?;
        if value.schema != DOCUMENT_SCHEMA {
            return Err(ValueError::Schema(value.schema));
        }
        if value.version > DOCUMENT_VERSION {
            return Err(ValueError::Version {
                found: value.version,
                supported: DOCUMENT_VERSION,
            });
        }
        Ok(value)
    }

    /// Loads the document into an editor. Normalization runs on load, so
    /// hand-written or damaged tables come back repaired.
    pub fn into_editor(self, registry: PluginRegistry) -> Editor {
        tracing::debug!(
            version = self.version,
            blocks = self.document.children.len(),
            "document loaded"
        );
        Editor::from_document(&self.document, registry)
    }
}
