//! Chunk types.
//!
//! A chunk is the atomic unit of indexed text: a stable identifier, the
//! original text preserved verbatim, and provenance metadata. Chunks arrive
//! at the engine already embedded; the engine never re-embeds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance and plugin-defined metadata attached to every chunk.
///
/// The typed fields are the provenance contract every pipeline fills in;
/// `extra` carries arbitrary plugin-defined keys and is flattened into the
/// same JSON object, so filters address both uniformly by dotted path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The source plugin that produced the originating document.
    pub source_plugin: String,
    /// Stable identifier of the originating document within its source.
    pub source_id: String,
    /// Human-readable origin URL, when the source has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// ISO 8601 creation timestamp of the originating document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// ISO 8601 last-update timestamp of the originating document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// The pack this chunk belongs to.
    pub pack_name: String,
    /// The chunker plugin that split the document.
    pub chunker_plugin: String,
    /// Plugin-defined fields, addressable by metadata filters.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A unit of source text with stable identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic ID, stable across rebuilds of an unchanged corpus.
    pub id: String,
    /// Original text, preserved verbatim.
    pub text: String,
    /// Provenance and plugin metadata.
    pub metadata: ChunkMetadata,
}

/// A chunk plus its embedding vector.
///
/// Invariant: `vector.len()` equals the dimensions declared by the manifest's
/// embedder configuration for every chunk in an index. The builder enforces
/// this before any index structure is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The underlying chunk.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// f32 embedding vector, length == index dimensions.
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    /// The dimension of this chunk's embedding vector.
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> EmbeddedChunk {
        let mut extra = BTreeMap::new();
        extra.insert("category".to_string(), Value::String("finance".to_string()));
        EmbeddedChunk {
            chunk: Chunk {
                id: "c1".to_string(),
                text: "quarterly revenue".to_string(),
                metadata: ChunkMetadata {
                    source_plugin: "@vpack/source-fs".to_string(),
                    source_id: "docs/q1.md".to_string(),
                    source_url: None,
                    created_at: None,
                    updated_at: None,
                    pack_name: "@acme/finance".to_string(),
                    chunker_plugin: "@vpack/chunker-paragraph".to_string(),
                    extra,
                },
            },
            vector: vec![1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn test_metadata_extra_is_flattened() {
        let chunk = sample_chunk();
        let json = serde_json::to_value(&chunk.chunk.metadata).unwrap();
        // Plugin-defined keys sit next to provenance fields, not nested.
        assert_eq!(json["category"], Value::String("finance".to_string()));
        assert_eq!(json["pack_name"], Value::String("@acme/finance".to_string()));
    }

    #[test]
    fn test_embedded_chunk_is_flattened() {
        let chunk = sample_chunk();
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["id"], Value::String("c1".to_string()));
        assert!(json["vector"].is_array());
    }

    #[test]
    fn test_dimension() {
        assert_eq!(sample_chunk().dimension(), 3);
    }
}
