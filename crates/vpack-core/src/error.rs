//! Error taxonomy for the VectorPack engine.
//!
//! Every failure kind carries a stable machine-readable [`ErrorCode`] so that
//! callers across process and language boundaries can key recovery decisions
//! on the code instead of sniffing error messages or types.
//!
//! The mismatch kinds ([`VPackError::ModelMismatch`],
//! [`VPackError::DimensionMismatch`], [`VPackError::ModelHashMismatch`]) are
//! hard errors: they mean the query vector and the index vectors are not
//! comparable, so any result set would be meaningless. No component may catch
//! one and silently proceed.

use thiserror::Error;

/// Errors produced by the VectorPack engine.
#[derive(Debug, Error)]
pub enum VPackError {
    /// Index was built (or would be built) from zero chunks.
    #[error("index is empty — build() requires at least one chunk")]
    EmptyIndex,

    /// A vector's length does not match the manifest's declared dimensions.
    #[error("dimension mismatch: index expects {expected}d vectors, got {got}d")]
    DimensionMismatch {
        /// The dimension declared by the manifest.
        expected: usize,
        /// The dimension actually observed.
        got: usize,
    },

    /// A chunk handed to the builder carries a wrong-length vector.
    ///
    /// Same code as [`VPackError::DimensionMismatch`]; this variant names the
    /// first offending chunk so build failures are diagnosable.
    #[error("dimension mismatch: chunk '{chunk_id}' has a {got}d vector, index expects {expected}d")]
    ChunkDimensionMismatch {
        /// The id of the first offending chunk.
        chunk_id: String,
        /// The dimension declared by the manifest.
        expected: usize,
        /// The dimension of the offending chunk's vector.
        got: usize,
    },

    /// Hard error: the query-side embedding model differs from the one the
    /// index was built with. Results would be meaningless.
    #[error(
        "model mismatch: index built with '{expected}', query uses '{got}' \
         — results would be meaningless; this is a hard error, not a warning"
    )]
    ModelMismatch {
        /// The model the index was built with.
        expected: String,
        /// The model the caller is using.
        got: String,
    },

    /// Hard error: local model weights do not hash to the manifest's pin.
    #[error(
        "model hash mismatch for '{model}': manifest pins {expected}, local weights hash to {got}"
    )]
    ModelHashMismatch {
        /// The model identifier.
        model: String,
        /// The hash pinned by the manifest.
        expected: String,
        /// The hash of the local weights.
        got: String,
    },

    /// The manifest names an embedding model the resolver does not know.
    #[error("unknown or unsupported model: {0}")]
    UnknownModel(String),

    /// The manifest failed validation.
    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    /// Encoding an index to the container format failed.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Decoding a container failed. The inner [`DecodeError`] distinguishes
    /// "not a pack" from "pack too new" from "pack damaged".
    #[error("invalid .vpack data: {0}")]
    Decode(#[from] DecodeError),

    /// The build was cancelled cooperatively; the partial graph is discarded.
    #[error("build cancelled before completion")]
    Cancelled,
}

impl VPackError {
    /// The stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyIndex => ErrorCode::EmptyIndex,
            Self::DimensionMismatch { .. } | Self::ChunkDimensionMismatch { .. } => {
                ErrorCode::DimensionMismatch
            }
            Self::ModelMismatch { .. } => ErrorCode::ModelMismatch,
            Self::ModelHashMismatch { .. } => ErrorCode::ModelHashMismatch,
            Self::UnknownModel(_) => ErrorCode::UnknownModel,
            Self::ManifestInvalid(_) => ErrorCode::ManifestInvalid,
            Self::Serialize(_) => ErrorCode::SerializeFailed,
            Self::Decode(_) => ErrorCode::DeserializeFailed,
            Self::Cancelled => ErrorCode::BuildCancelled,
        }
    }
}

/// Decode failures, kept distinct so operators can diagnose artifact
/// provenance: a bad magic is "not a pack", an unsupported version is "pack
/// too new (or legacy)", truncation and corruption are damage in transit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer does not start with the `VPAK` magic bytes.
    #[error("bad magic bytes — not a .vpack artifact")]
    BadMagic,

    /// The format version byte is not one this engine reads.
    ///
    /// Legacy versions (1: JSON payload, 2: undivided binary payload) fail
    /// here too: decoding is fail-fast, never best-effort.
    #[error("unsupported .vpack format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// The version byte found in the artifact.
        found: u8,
        /// The version this engine reads and writes.
        supported: u8,
    },

    /// The buffer ended before a declared section or field was complete.
    #[error("truncated buffer: needed {needed} more bytes at offset {offset}")]
    Truncated {
        /// Bytes still required by the current field.
        needed: usize,
        /// Offset at which the shortfall was detected.
        offset: usize,
    },

    /// Framing was intact but an inner structure is inconsistent.
    #[error("corrupt payload: {0}")]
    Corrupt(String),
}

/// Stable machine-readable error codes, shared across every component and
/// propagated unchanged across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// `EMPTY_INDEX`
    EmptyIndex,
    /// `DIMENSION_MISMATCH`
    DimensionMismatch,
    /// `MODEL_MISMATCH`
    ModelMismatch,
    /// `MODEL_HASH_MISMATCH`
    ModelHashMismatch,
    /// `UNKNOWN_MODEL`
    UnknownModel,
    /// `MANIFEST_INVALID`
    ManifestInvalid,
    /// `SERIALIZE_FAILED`
    SerializeFailed,
    /// `DESERIALIZE_FAILED`
    DeserializeFailed,
    /// `BUILD_CANCELLED`
    BuildCancelled,
}

impl ErrorCode {
    /// The wire representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyIndex => "EMPTY_INDEX",
            Self::DimensionMismatch => "DIMENSION_MISMATCH",
            Self::ModelMismatch => "MODEL_MISMATCH",
            Self::ModelHashMismatch => "MODEL_HASH_MISMATCH",
            Self::UnknownModel => "UNKNOWN_MODEL",
            Self::ManifestInvalid => "MANIFEST_INVALID",
            Self::SerializeFailed => "SERIALIZE_FAILED",
            Self::DeserializeFailed => "DESERIALIZE_FAILED",
            Self::BuildCancelled => "BUILD_CANCELLED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
