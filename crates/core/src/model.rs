//! Core record types: `Library`, `Document`, `Chunk`.
//!
//! A library owns documents, a document owns chunks. Every chunk carries a
//! copy of its library id so that scoping a search never has to walk the
//! document table. Records are plain data; the [`Store`](crate::storage::Store)
//! is the only place that creates or mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Id prefix for libraries.
pub const LIBRARY_PREFIX: &str = "lib";
/// Id prefix for documents.
pub const DOCUMENT_PREFIX: &str = "doc";
/// Id prefix for chunks.
pub const CHUNK_PREFIX: &str = "chunk";

/// A typed metadata value.
///
/// Serialized untagged so that snapshot metadata reads as plain JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Boolean(v)
    }
}

/// String-keyed metadata attached to every record.
pub type Metadata = HashMap<String, MetadataValue>;

/// Generate an opaque, type-prefixed id from 128 random bits.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// A named collection of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// A document inside a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub library_id: String,
    pub title: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// A piece of text with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub library_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// A document together with copies of its chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWithChunks {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

/// A library together with copies of its documents and their chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryWithDocuments {
    pub library: Library,
    pub documents: Vec<DocumentWithChunks>,
}

/// Partial update for a library. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct LibraryUpdate {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Partial update for a document.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Partial update for a chunk. A new embedding or content re-indexes the chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkUpdate {
    pub content: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Option<Metadata>,
}

/// Snapshot timestamps: RFC 3339, or an offset-less ISO-8601 value read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
            return Some(ts);
        }
        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())?;
        tracing::debug!("Timestamp '{}' has no offset, reading it as UTC", raw);
        Some(naive.and_utc())
    }
}
