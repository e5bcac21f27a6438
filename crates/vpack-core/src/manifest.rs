//! Pack manifest types.
//!
//! The manifest is the declarative descriptor that travels with an index:
//! pack identity, the plugin pipeline that produced the chunks, and the
//! embedder and index configuration. It is the single source of truth for
//! dimensionality and metric — the engine never infers either from data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VPackError;

/// Distance metric for comparing vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity (the default for text embeddings).
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Dot product.
    Dot,
}

/// The index structure to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Exact linear scan. Also the correctness oracle for the graph mode.
    #[default]
    Flat,
    /// Hierarchical Navigable Small World graph (approximate).
    Hnsw,
}

/// HNSW build parameters as declared in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max connections per node above layer 0.
    #[serde(default = "HnswParams::default_m")]
    pub m: usize,
    /// Beam width during construction.
    #[serde(default = "HnswParams::default_ef_construction")]
    pub ef_construction: usize,
}

impl HnswParams {
    const fn default_m() -> usize {
        16
    }

    const fn default_ef_construction() -> usize {
        200
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self { m: Self::default_m(), ef_construction: Self::default_ef_construction() }
    }
}

/// Manifest-level index configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// The distance metric for scoring.
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Which index structure to build.
    #[serde(rename = "index", default)]
    pub index_type: IndexType,
    /// HNSW parameters, meaningful when `index_type` is [`IndexType::Hnsw`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw: Option<HnswParams>,
}

/// The kind of a pipeline plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Produces raw documents.
    Source,
    /// Rewrites documents or chunks between stages.
    Transformer,
    /// Splits documents into chunks.
    Chunker,
    /// Embeds chunk text into vectors.
    Embedder,
    /// Consumes the built index.
    Output,
    /// Wraps the build pipeline.
    Middleware,
}

/// One entry in the manifest's plugin pipeline.
///
/// Plugin-specific settings (the embedder's `model` and `dimensions`, a
/// chunker's `size`, ...) live in `extra` and are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// What stage of the pipeline this plugin serves.
    pub kind: PluginKind,
    /// The plugin package to load, e.g. `@vpack/embedder-fastembed`.
    #[serde(rename = "use")]
    pub package: String,
    /// Plugin-specific configuration, flattened into the same JSON object.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Embedder settings extracted from the manifest's embedder plugin entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedderSettings {
    /// The embedding model identifier.
    pub model: String,
    /// Declared vector dimensions. Every indexed vector must match.
    pub dimensions: usize,
    /// Optional sha256 pin of the model weights.
    pub model_hash: Option<String>,
    /// Optional provider hint (`local`, `huggingface`, ...).
    pub provider: Option<String>,
}

/// The pack manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackManifest {
    /// Spec version, e.g. `"1.0"`.
    pub vpack: String,
    /// Scoped registry name, e.g. `@acme/product-vision`.
    pub name: String,
    /// Semver version.
    pub version: String,
    /// Optional human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional SPDX license identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Optional homepage URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// The plugin pipeline.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    /// Index configuration. Normalized by the builder so a serialized pack
    /// always records the metric and index type it was actually built with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexConfig>,
}

impl PackManifest {
    /// Parse and validate a manifest from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`VPackError::ManifestInvalid`] when the shape is wrong or the
    /// pipeline constraints (at least one source, exactly one chunker,
    /// exactly one embedder) are violated.
    pub fn parse(value: Value) -> Result<Self, VPackError> {
        let manifest: Self = serde_json::from_value(value)
            .map_err(|err| VPackError::ManifestInvalid(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate pack identity and pipeline constraints.
    ///
    /// # Errors
    ///
    /// Returns [`VPackError::ManifestInvalid`] naming the first violation.
    pub fn validate(&self) -> Result<(), VPackError> {
        if !is_scoped_name(&self.name) {
            return Err(VPackError::ManifestInvalid(format!(
                "name must be scoped: @scope/name, got '{}'",
                self.name
            )));
        }
        if !is_semver(&self.version) {
            return Err(VPackError::ManifestInvalid(format!(
                "version must be semver, got '{}'",
                self.version
            )));
        }

        let count = |kind: PluginKind| self.plugins.iter().filter(|p| p.kind == kind).count();
        if count(PluginKind::Source) == 0 {
            return Err(VPackError::ManifestInvalid(
                "at least one source plugin is required".to_string(),
            ));
        }
        if count(PluginKind::Chunker) != 1 {
            return Err(VPackError::ManifestInvalid(
                "exactly one chunker plugin is required".to_string(),
            ));
        }
        if count(PluginKind::Embedder) != 1 {
            return Err(VPackError::ManifestInvalid(
                "exactly one embedder plugin is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Extract the embedder settings from the plugin pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`VPackError::UnknownModel`] when no embedder plugin declares
    /// a model and integer dimensions — an index cannot be built or queried
    /// without them.
    pub fn embedder(&self) -> Result<EmbedderSettings, VPackError> {
        let embedder = self
            .plugins
            .iter()
            .find(|p| p.kind == PluginKind::Embedder)
            .ok_or_else(|| VPackError::UnknownModel(MISSING_EMBEDDER.to_string()))?;

        let dimensions = embedder
            .extra
            .get("dimensions")
            .and_then(as_dimensions)
            .ok_or_else(|| VPackError::UnknownModel(MISSING_EMBEDDER.to_string()))?;

        let model = embedder
            .extra
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| VPackError::UnknownModel(MISSING_EMBEDDER.to_string()))?
            .to_string();

        let model_hash =
            embedder.extra.get("model_hash").and_then(Value::as_str).map(str::to_string);
        let provider = embedder.extra.get("provider").and_then(Value::as_str).map(str::to_string);

        Ok(EmbedderSettings { model, dimensions, model_hash, provider })
    }

    /// Declared vector dimensions, from the embedder plugin entry.
    ///
    /// # Errors
    ///
    /// Returns [`VPackError::UnknownModel`] when the manifest declares none.
    pub fn dimensions(&self) -> Result<usize, VPackError> {
        Ok(self.embedder()?.dimensions)
    }
}

const MISSING_EMBEDDER: &str = "embedder plugin config must include model and dimensions";

/// Accept integer dimensions written as either a JSON integer or a whole
/// float (JSON tooling in some pipelines emits `384.0`).
fn as_dimensions(value: &Value) -> Option<usize> {
    if let Some(n) = value.as_u64() {
        return usize::try_from(n).ok();
    }
    if let Some(f) = value.as_f64() {
        if f.fract() == 0.0 && f >= 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Some(f as usize);
        }
    }
    None
}

fn is_scoped_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('@') else {
        return false;
    };
    let Some((scope, pack)) = rest.split_once('/') else {
        return false;
    };
    let ok = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    };
    ok(scope) && ok(pack)
}

fn is_semver(version: &str) -> bool {
    let core = version.split(['-', '+']).next().unwrap_or(version);
    let mut parts = 0;
    for part in core.split('.') {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 3
}
