//! `VectorPack` Engine
//!
//! Builds, serializes, and queries vector nearest-neighbor indexes over
//! embedded text chunks.
//!
//! # Features
//!
//! - **Flat index**: exact linear scan, always correct, the default.
//! - **HNSW index**: approximate graph search with O(log N) queries and
//!   deterministic, seeded construction.
//! - **`.vpack` codec**: a versioned binary container (manifest, chunks,
//!   graph) with fail-fast decoding.
//! - **Filtered queries**: metadata predicates with over-fetch and exact
//!   fallback so filters stay correct in the approximate mode.
//!
//! # Example
//!
//! ```
//! use vpack_core::QueryOptions;
//! use vpack_engine::{build, deserialize, serialize, BuildOptions};
//! # fn demo(chunks: Vec<vpack_core::EmbeddedChunk>, manifest: &vpack_core::PackManifest)
//! # -> Result<(), vpack_core::VPackError> {
//! let index = build(chunks, manifest, &BuildOptions::default())?;
//! let bytes = serialize(&index)?;
//! let index = deserialize(&bytes)?;
//! let results = index.query(&[0.1; 384], &QueryOptions::default().with_top_k(5))?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod distance;
pub mod filter;
pub mod index;

use vpack_core::{EmbeddedChunk, PackManifest, VPackError};

pub use codec::{FORMAT_VERSION, MAGIC};
pub use index::{BuildOptions, HnswConfig, IndexSettings, VPackIndex};

/// Build an index over embedded chunks. See [`VPackIndex::build`].
///
/// # Errors
///
/// Propagates the build validation errors of [`VPackIndex::build`].
pub fn build(
    chunks: Vec<EmbeddedChunk>,
    manifest: &PackManifest,
    options: &BuildOptions,
) -> Result<VPackIndex, VPackError> {
    VPackIndex::build(chunks, manifest, options)
}

/// Encode an index into a `.vpack` artifact. See [`codec::serialize`].
///
/// # Errors
///
/// Propagates [`VPackError::Serialize`] from the codec.
pub fn serialize(index: &VPackIndex) -> Result<Vec<u8>, VPackError> {
    codec::serialize(index)
}

/// Decode a `.vpack` artifact. See [`codec::deserialize`].
///
/// # Errors
///
/// Propagates [`VPackError::Decode`] from the codec.
pub fn deserialize(bytes: &[u8]) -> Result<VPackIndex, VPackError> {
    codec::deserialize(bytes)
}
