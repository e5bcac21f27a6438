//! Build configuration and resolved index settings.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use vpack_core::{DistanceMetric, HnswParams, IndexConfig, IndexType, PackManifest};

/// Progress callback: `(processed_chunks, total_chunks)`.
///
/// Invoked once per processed chunk during a build, on the building thread.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Resolved HNSW parameters.
///
/// # Parameters
///
/// * `m` - Maximum connections per node above layer 0. Typical: 16-64.
/// * `m_max0` - Maximum connections in layer 0, the densest layer.
///   Always `2 * m`.
/// * `ef_construction` - Beam width during insertion. Higher values build a
///   better graph, slower. Typical: 100-500.
/// * `ml` - Level multiplier, `1 / ln(m)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HnswConfig {
    /// Maximum connections per node above layer 0 (the M parameter).
    pub m: usize,
    /// Maximum connections in layer 0 (2 * M).
    pub m_max0: usize,
    /// Beam width for construction.
    pub ef_construction: usize,
    /// Level multiplier (1 / ln(M)).
    pub ml: f64,
}

impl HnswConfig {
    /// Create a configuration with the given M parameter and defaults for
    /// the rest.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // m is small (16-64)
    pub fn new(m: usize) -> Self {
        let m = m.max(2);
        Self { m, m_max0: m * 2, ef_construction: 200, ml: 1.0 / (m as f64).ln() }
    }

    /// Set the construction beam width.
    #[must_use]
    pub const fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::new(16)
    }
}

impl From<HnswParams> for HnswConfig {
    fn from(params: HnswParams) -> Self {
        Self::new(params.m).with_ef_construction(params.ef_construction)
    }
}

/// Options accepted by [`build`](crate::build).
///
/// Everything is optional; unset fields fall back to the manifest's index
/// configuration and then to the defaults (flat index, cosine metric).
#[derive(Default)]
pub struct BuildOptions {
    /// Override the manifest's distance metric.
    pub metric: Option<DistanceMetric>,
    /// Override the manifest's index type.
    pub index: Option<IndexType>,
    /// Override the manifest's HNSW parameters.
    pub hnsw: Option<HnswParams>,
    /// Override the level-assignment seed. When unset the seed is derived
    /// deterministically from the manifest identity, so rebuilding the same
    /// pack reproduces the same graph.
    pub seed: Option<u64>,
    /// Per-chunk progress callback.
    pub progress: Option<ProgressFn>,
    /// Cooperative cancellation flag. When set to `true` mid-build, the
    /// build aborts with `BUILD_CANCELLED` and discards the partial graph.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl BuildOptions {
    /// Override the distance metric.
    #[must_use]
    pub const fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Override the index type.
    #[must_use]
    pub const fn with_index(mut self, index: IndexType) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the HNSW parameters.
    #[must_use]
    pub const fn with_hnsw(mut self, hnsw: HnswParams) -> Self {
        self.hnsw = Some(hnsw);
        self
    }

    /// Pin the level-assignment seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Attach a cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("metric", &self.metric)
            .field("index", &self.index)
            .field("hnsw", &self.hnsw)
            .field("seed", &self.seed)
            .field("progress", &self.progress.as_ref().map(|_| ".."))
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// The settings an index was actually built with, after resolving options
/// against the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    /// The scoring metric.
    pub metric: DistanceMetric,
    /// The index structure.
    pub index_type: IndexType,
    /// HNSW parameters (meaningful only for the graph structure).
    pub hnsw: HnswConfig,
    /// The level-assignment seed.
    pub seed: u64,
}

impl IndexSettings {
    /// Resolve settings: explicit options win, then the manifest's index
    /// configuration, then defaults (flat, cosine).
    #[must_use]
    pub fn resolve(manifest: &PackManifest, options: &BuildOptions) -> Self {
        let from_manifest = manifest.index.unwrap_or_default();
        let metric = options.metric.unwrap_or(from_manifest.metric);
        let index_type = options.index.unwrap_or(from_manifest.index_type);
        let params = options.hnsw.or(from_manifest.hnsw).unwrap_or_default();
        let seed = options.seed.unwrap_or_else(|| derive_seed(manifest));

        Self { metric, index_type, hnsw: params.into(), seed }
    }

    /// The manifest-level representation of these settings. The builder
    /// writes this back into its manifest copy so the serialized artifact
    /// records what it was built with.
    #[must_use]
    pub fn as_index_config(&self) -> IndexConfig {
        IndexConfig {
            metric: self.metric,
            index_type: self.index_type,
            hnsw: match self.index_type {
                IndexType::Hnsw => Some(HnswParams {
                    m: self.hnsw.m,
                    ef_construction: self.hnsw.ef_construction,
                }),
                IndexType::Flat => None,
            },
        }
    }
}

/// Derive the level-assignment seed from the manifest identity.
///
/// FNV-1a over name, version, and embedder model: stable across runs and
/// platforms, so identical packs rebuild identical graphs.
fn derive_seed(manifest: &PackManifest) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    let mut fold = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(PRIME);
        }
        hash ^= 0xff;
        hash = hash.wrapping_mul(PRIME);
    };

    fold(manifest.name.as_bytes());
    fold(manifest.version.as_bytes());
    if let Ok(embedder) = manifest.embedder() {
        fold(embedder.model.as_bytes());
    }
    hash
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn manifest(index: Option<serde_json::Value>) -> PackManifest {
        let mut value = json!({
            "vpack": "1.0",
            "name": "@test/fixture",
            "version": "1.0.0",
            "plugins": [
                { "kind": "source", "use": "@vpack/source-fs" },
                { "kind": "chunker", "use": "@vpack/chunker-fixed" },
                {
                    "kind": "embedder",
                    "use": "@vpack/embedder-fastembed",
                    "model": "sentence-transformers/all-MiniLM-L6-v2",
                    "dimensions": 3
                }
            ]
        });
        if let Some(index) = index {
            value["index"] = index;
        }
        PackManifest::parse(value).unwrap()
    }

    #[test]
    fn test_hnsw_config_defaults() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.m_max0, 32);
        assert_eq!(config.ef_construction, 200);
        assert!((config.ml - 1.0 / 16_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_hnsw_config_minimum_m() {
        assert_eq!(HnswConfig::new(1).m, 2);
    }

    #[test]
    fn test_resolve_defaults_to_flat_cosine() {
        let settings = IndexSettings::resolve(&manifest(None), &BuildOptions::default());
        assert_eq!(settings.metric, DistanceMetric::Cosine);
        assert_eq!(settings.index_type, IndexType::Flat);
    }

    #[test]
    fn test_resolve_reads_manifest_index_config() {
        let settings = IndexSettings::resolve(
            &manifest(Some(json!({ "metric": "dot", "index": "hnsw", "hnsw": { "m": 8, "ef_construction": 100 } }))),
            &BuildOptions::default(),
        );
        assert_eq!(settings.metric, DistanceMetric::Dot);
        assert_eq!(settings.index_type, IndexType::Hnsw);
        assert_eq!(settings.hnsw.m, 8);
        assert_eq!(settings.hnsw.m_max0, 16);
        assert_eq!(settings.hnsw.ef_construction, 100);
    }

    #[test]
    fn test_options_override_manifest() {
        let settings = IndexSettings::resolve(
            &manifest(Some(json!({ "metric": "dot", "index": "hnsw" }))),
            &BuildOptions::default()
                .with_metric(DistanceMetric::Euclidean)
                .with_index(IndexType::Flat),
        );
        assert_eq!(settings.metric, DistanceMetric::Euclidean);
        assert_eq!(settings.index_type, IndexType::Flat);
    }

    #[test]
    fn test_seed_is_deterministic_per_manifest() {
        let a = IndexSettings::resolve(&manifest(None), &BuildOptions::default());
        let b = IndexSettings::resolve(&manifest(None), &BuildOptions::default());
        assert_eq!(a.seed, b.seed);

        let mut other = manifest(None);
        other.version = "1.0.1".to_string();
        let c = IndexSettings::resolve(&other, &BuildOptions::default());
        assert_ne!(a.seed, c.seed);
    }

    #[test]
    fn test_seed_override() {
        let settings =
            IndexSettings::resolve(&manifest(None), &BuildOptions::default().with_seed(7));
        assert_eq!(settings.seed, 7);
    }
}
