//! `VectorPack` Core
//!
//! Canonical types and shared vocabulary for the VectorPack engine.
//! No indexing logic lives here — this crate defines the data model that the
//! engine, build pipelines, and query clients all agree on.
//!
//! # Modules
//!
//! - [`chunk`] - [`Chunk`], [`ChunkMetadata`], and [`EmbeddedChunk`]
//! - [`manifest`] - [`PackManifest`] and its index/embedder configuration
//! - [`query`] - [`QueryOptions`], [`QueryResult`], and [`MetadataFilter`]
//! - [`error`] - [`VPackError`] and the stable [`ErrorCode`] taxonomy
//! - [`model`] - [`ModelResolver`] for explicit embedding-model resolution
//! - [`recovery`] - the error-code keyed fallback decision table

pub mod chunk;
pub mod error;
pub mod manifest;
pub mod model;
pub mod query;
pub mod recovery;

// Re-export commonly used types
pub use chunk::{Chunk, ChunkMetadata, EmbeddedChunk};
pub use error::{DecodeError, ErrorCode, VPackError};
pub use manifest::{
    DistanceMetric, EmbedderSettings, HnswParams, IndexConfig, IndexType, PackManifest,
    PluginConfig, PluginKind,
};
pub use model::{verify_embedder, ModelDescriptor, ModelResolver, StaticModelResolver};
pub use query::{FilterOp, MetadataFilter, QueryOptions, QueryResult};
pub use recovery::RecoveryAction;
