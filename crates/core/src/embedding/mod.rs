//! Embedding provider contract.
//!
//! The store never computes embeddings itself. Text entry points
//! ([`Store::create_chunk_from_text`](crate::storage::Store::create_chunk_from_text),
//! [`Store::search_text`](crate::storage::Store::search_text)) call a provider
//! first and only then touch store state, so a failing provider leaves the
//! store unchanged.

use crate::error::{Error, Result};
use crate::index::validate_vector;

/// Text → vector model.
///
/// Implementations must return vectors of one fixed dimension per model and
/// report their own failures (network, timeout, quota) as
/// [`Error::EmbeddingProvider`].
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "embedding-provider"
    }
}

impl<F> EmbeddingProvider for F
where
    F: Fn(&str) -> Result<Vec<f32>> + Send + Sync,
{
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self(text)
    }
}

/// Run `provider` and reject empty or non-finite output.
///
/// Any failure, including a malformed vector, is reported as
/// [`Error::EmbeddingProvider`] so callers can tell it apart from an empty result.
pub(crate) fn embed_checked(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vector = provider.embed(text).map_err(|e| match e {
        Error::EmbeddingProvider(_) => e,
        other => Error::EmbeddingProvider(other.to_string()),
    })?;
    validate_vector(&vector)
        .map_err(|e| Error::EmbeddingProvider(format!("{}: {}", provider.name(), e)))?;
    tracing::debug!(
        "Embedded {} chars into {} dims via {}",
        text.len(),
        vector.len(),
        provider.name()
    );
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_provider() {
        let provider = |text: &str| -> Result<Vec<f32>> { Ok(vec![text.len() as f32, 1.0]) };
        assert_eq!(embed_checked(&provider, "abc").unwrap(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_provider_failure_is_surfaced() {
        let provider =
            |_: &str| -> Result<Vec<f32>> { Err(Error::EmbeddingProvider("timeout".into())) };
        let err = embed_checked(&provider, "abc").unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(ref m) if m == "timeout"));
    }

    #[test]
    fn test_malformed_vector_is_provider_error() {
        let provider = |_: &str| -> Result<Vec<f32>> { Ok(vec![f32::NAN]) };
        assert!(matches!(
            embed_checked(&provider, "abc"),
            Err(Error::EmbeddingProvider(_))
        ));
        let empty = |_: &str| -> Result<Vec<f32>> { Ok(Vec::new()) };
        assert!(matches!(
            embed_checked(&empty, "abc"),
            Err(Error::EmbeddingProvider(_))
        ));
    }
}
