//! Fallback decision table.
//!
//! When a pipeline step fails, the caller — never the engine — decides what
//! to do next. That decision is keyed on the stable [`ErrorCode`], not on
//! error type inspection, so the policy is a plain table that can be read
//! and tested in one place.
//!
//! The mismatch codes always propagate: substituting anything after a
//! dimension, model, or hash mismatch would produce valid-looking but
//! meaningless results.

use crate::error::ErrorCode;

/// What a caller may do about a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Surface the error unchanged. The hard-error default.
    Propagate,
    /// The caller may substitute an alternate embedding source, logging the
    /// substitution explicitly.
    SubstituteEmbedder,
    /// The artifact is unusable; rebuild it from source inputs.
    RebuildArtifact,
}

impl RecoveryAction {
    /// The decision table.
    #[must_use]
    pub const fn for_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::EmptyIndex
            | ErrorCode::DimensionMismatch
            | ErrorCode::ModelMismatch
            | ErrorCode::ModelHashMismatch
            | ErrorCode::ManifestInvalid
            | ErrorCode::BuildCancelled => Self::Propagate,
            ErrorCode::UnknownModel => Self::SubstituteEmbedder,
            ErrorCode::SerializeFailed | ErrorCode::DeserializeFailed => Self::RebuildArtifact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatches_always_propagate() {
        for code in [
            ErrorCode::DimensionMismatch,
            ErrorCode::ModelMismatch,
            ErrorCode::ModelHashMismatch,
        ] {
            assert_eq!(RecoveryAction::for_code(code), RecoveryAction::Propagate);
        }
    }

    #[test]
    fn test_unknown_model_permits_substitution() {
        assert_eq!(
            RecoveryAction::for_code(ErrorCode::UnknownModel),
            RecoveryAction::SubstituteEmbedder
        );
    }

    #[test]
    fn test_codec_failures_rebuild() {
        assert_eq!(
            RecoveryAction::for_code(ErrorCode::DeserializeFailed),
            RecoveryAction::RebuildArtifact
        );
    }
}
