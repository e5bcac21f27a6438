//! Embedding-model resolution.
//!
//! The engine never invokes an embedding model, but it must be able to tell
//! whether a manifest's declared model is one the surrounding toolchain
//! knows, whether its declared dimensions agree, and whether pinned weight
//! hashes match. Resolution is explicit dependency injection: callers pass a
//! [`ModelResolver`] into verification; there is no process-global registry.

use crate::error::VPackError;
use crate::manifest::PackManifest;

/// What a resolver knows about one embedding model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Canonical model identifier, e.g. `BAAI/bge-small-en-v1.5`.
    pub id: String,
    /// Vector dimensions this model produces.
    pub dimensions: usize,
    /// sha256 of the model weights, when the resolver tracks one.
    pub hash: Option<String>,
}

/// Resolves model identifiers to descriptors.
pub trait ModelResolver {
    /// Look up a model by identifier. `None` means the model is unknown to
    /// this resolver — not that it is invalid everywhere.
    fn resolve(&self, model_id: &str) -> Option<ModelDescriptor>;
}

/// A fixed table of models, seeded with the locally runnable set.
#[derive(Debug, Clone, Default)]
pub struct StaticModelResolver {
    models: Vec<ModelDescriptor>,
}

impl StaticModelResolver {
    /// An empty resolver. Useful for tests and for callers that add their
    /// own entries.
    #[must_use]
    pub const fn new() -> Self {
        Self { models: Vec::new() }
    }

    /// The models the local embedding runtime can serve.
    #[must_use]
    pub fn with_known_models() -> Self {
        let known: &[(&str, usize)] = &[
            ("sentence-transformers/all-MiniLM-L6-v2", 384),
            ("sentence-transformers/all-MiniLM-L12-v2", 384),
            ("sentence-transformers/all-mpnet-base-v2", 768),
            ("BAAI/bge-small-en-v1.5", 384),
            ("BAAI/bge-base-en-v1.5", 768),
            ("BAAI/bge-large-en-v1.5", 1024),
            ("BAAI/bge-small-zh-v1.5", 512),
            ("BAAI/bge-large-zh-v1.5", 1024),
            ("BAAI/bge-m3", 1024),
        ];
        Self {
            models: known
                .iter()
                .map(|&(id, dimensions)| ModelDescriptor {
                    id: id.to_string(),
                    dimensions,
                    hash: None,
                })
                .collect(),
        }
    }

    /// Register an additional model.
    #[must_use]
    pub fn with_model(mut self, descriptor: ModelDescriptor) -> Self {
        self.models.push(descriptor);
        self
    }
}

impl ModelResolver for StaticModelResolver {
    fn resolve(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.models.iter().find(|m| m.id == model_id).cloned()
    }
}

/// Verify that a manifest's embedder declaration is consistent with what the
/// resolver knows about the model.
///
/// # Errors
///
/// - [`VPackError::UnknownModel`] when the resolver has no entry — the
///   recoverable case a caller may answer by substituting an embedding
///   source (see [`crate::recovery`]).
/// - [`VPackError::DimensionMismatch`] when declared and known dimensions
///   disagree.
/// - [`VPackError::ModelHashMismatch`] when both sides pin a hash and the
///   pins differ. Hard error.
pub fn verify_embedder(
    manifest: &PackManifest,
    resolver: &dyn ModelResolver,
) -> Result<(), VPackError> {
    let embedder = manifest.embedder()?;

    let Some(descriptor) = resolver.resolve(&embedder.model) else {
        return Err(VPackError::UnknownModel(embedder.model));
    };

    if descriptor.dimensions != embedder.dimensions {
        return Err(VPackError::DimensionMismatch {
            expected: descriptor.dimensions,
            got: embedder.dimensions,
        });
    }

    if let (Some(pinned), Some(local)) = (&embedder.model_hash, &descriptor.hash) {
        if pinned != local {
            return Err(VPackError::ModelHashMismatch {
                model: embedder.model,
                expected: pinned.clone(),
                got: local.clone(),
            });
        }
    }

    Ok(())
}
