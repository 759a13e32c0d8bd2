//! Provider trait for generation backends.
//!
//! A provider knows how to talk to one hosted model family. It does not pick
//! credentials or models itself: every call receives the [`BackendTarget`]
//! chosen by the resolver, so a single provider instance can serve every
//! candidate pair and tests can script outcomes per target.
//!
//! # Error contract
//!
//! Providers report what the backend said and let the error type classify
//! it (see [`KotobaError::is_transient`](crate::KotobaError::is_transient)):
//! - malformed attachments, policy blocks, bad keys and unknown models map
//!   to permanent variants, keeping the backend's own message
//! - anything else, transport failures included, is retried
//!
//! Providers never retry on their own; the gateway owns the retry loop.

use async_trait::async_trait;

use crate::Result;
use crate::types::{BackendTarget, GenerateRequest, GenerateResponse};

/// Provider for single-shot multimodal generation.
#[async_trait]
pub trait GenerateProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Send one request to `target` and return the raw model output.
    ///
    /// The wire payload must keep the order instruction, context,
    /// attachment.
    async fn generate(
        &self,
        target: &BackendTarget,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse>;

    /// Minimal liveness check for a candidate pair.
    ///
    /// Default implementation sends [`GenerateRequest::probe`]. Must not
    /// mutate provider state so that resolution stays idempotent.
    async fn probe(&self, target: &BackendTarget) -> Result<()> {
        self.generate(target, &GenerateRequest::probe())
            .await
            .map(|_| ())
    }
}
