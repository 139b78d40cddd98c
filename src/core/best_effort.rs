//! Best-effort execution of backend sub-steps.
//!
//! A few steps (display-name lookup during resolution, file listing while
//! gathering corpus info) must not abort the operation that runs them. They
//! go through [`best_effort`] so the degraded path is named, logged and
//! testable instead of hidden behind a broad catch.

use std::future::Future;

use crate::core::errors::ApiError;

/// Awaits `call`; on failure logs `label` with the error and returns `fallback`.
pub async fn best_effort<T, F>(label: &str, call: F, fallback: T) -> T
where
    F: Future<Output = Result<T, ApiError>>,
{
    match call.await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("{} failed, continuing with fallback: {}", label, err);
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value_on_success() {
        let value = best_effort("ok", async { Ok::<_, ApiError>(7) }, 0).await;
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn returns_fallback_on_failure() {
        let value = best_effort(
            "listing",
            async { Err::<Vec<u8>, _>(ApiError::Upstream("boom".to_string())) },
            Vec::new(),
        )
        .await;
        assert!(value.is_empty());
    }
}
