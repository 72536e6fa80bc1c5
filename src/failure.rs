//! Structured, user-facing failure descriptions.

use mindnet_core::MemoryError;
use serde::Serialize;

/// What the CLI prints instead of a raw error chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: String,
    pub message: String,
    /// The offending mindmap text, for parse failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl Failure {
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.chain().find_map(|cause| cause.downcast_ref::<MemoryError>()) {
            Some(memory) => Self {
                kind: memory.kind().as_str().to_string(),
                message: memory.to_string(),
                fragment: memory.fragment().map(str::to_string),
            },
            None => Self {
                kind: "internal".to_string(),
                message: format!("{err:#}"),
                fragment: None,
            },
        }
    }

    pub fn render(&self, json: bool) -> String {
        if json {
            serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
        } else {
            format!("error [{}]: {}", self.kind, self.message)
        }
    }
}

impl From<&anyhow::Error> for Failure {
    fn from(err: &anyhow::Error) -> Self {
        Self::from_error(err)
    }
}
