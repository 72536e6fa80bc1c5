//! Memory traces attached to graph nodes.

use crate::mindmap::keywords_mindmap;
use crate::node::clamp_unit;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// What kind of observation an engram records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngramType {
    /// A single fact or event.
    #[default]
    Atomic,
    /// A relation between existing concepts.
    Link,
    /// A recurring pattern or procedure.
    Pattern,
}

impl EngramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngramType::Atomic => "ATOMIC",
            EngramType::Link => "LINK",
            EngramType::Pattern => "PATTERN",
        }
    }
}

impl fmt::Display for EngramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngramType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atomic" => Ok(EngramType::Atomic),
            "link" => Ok(EngramType::Link),
            "pattern" => Ok(EngramType::Pattern),
            other => Err(format!("unknown engram type: {other}")),
        }
    }
}

/// Free-text content plus its structured mindmap fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engram {
    pub id: String,
    pub content: String,
    /// Mindmap text describing the event's structure. May be blank.
    pub schema: String,
    #[serde(rename = "type")]
    pub engram_type: EngramType,
    pub strength: f64,
    /// Unix time in milliseconds.
    pub created_at: i64,
    /// SHA-256 of the normalized content.
    pub digest: String,
}

impl Engram {
    pub const DEFAULT_STRENGTH: f64 = 0.8;

    pub fn new(content: impl Into<String>, schema: impl Into<String>, engram_type: EngramType) -> Self {
        let content = content.into();
        let created_at = chrono::Utc::now().timestamp_millis();
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{created_at}_{}_{sequence}", std::process::id()),
            digest: content_digest(&content),
            content,
            schema: schema.into(),
            engram_type,
            strength: Self::DEFAULT_STRENGTH,
            created_at,
        }
    }

    /// An engram whose schema is the mindmap built from `keywords`.
    pub fn from_keywords(content: impl Into<String>, keywords: &[String], engram_type: EngramType) -> Self {
        Self::new(content, keywords_mindmap(keywords), engram_type)
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = clamp_unit(strength);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Digest of content with case and whitespace differences removed.
pub fn content_digest(content: &str) -> String {
    let normalized = content
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}
