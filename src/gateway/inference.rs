//! The inference gateway: lazily resolved backend + retrying invocation.

use std::time::Instant;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::resolver::{BackendHandle, BackendResolver};
use crate::providers::retry::{RetryPolicy, with_retry};
use crate::telemetry;
use crate::types::{Attachment, GenerateRequest, Turn};
use crate::{KotobaError, Result};

const OPERATION: &str = "generate";

/// Single call surface for the presentation layer.
///
/// The backend is resolved on first use and cached for the lifetime of the
/// gateway. It is never re-validated and never swapped mid-call: a failing
/// backend surfaces as [`KotobaError::TransientExhausted`], not as a silent
/// fallback to another candidate. Drop the gateway (or restart the process)
/// to resolve again.
#[derive(Debug)]
pub struct InferenceGateway {
    resolver: BackendResolver,
    retry: RetryPolicy,
    handle: OnceCell<BackendHandle>,
}

impl InferenceGateway {
    /// Create a gateway that resolves through `resolver` on first use.
    pub fn new(resolver: BackendResolver, retry: RetryPolicy) -> Self {
        Self {
            resolver,
            retry,
            handle: OnceCell::new(),
        }
    }

    /// Create a gateway around an already resolved backend.
    pub fn with_backend(handle: BackendHandle, retry: RetryPolicy) -> Self {
        let resolver = BackendResolver::new(
            handle.provider().clone(),
            vec![handle.target().credential.clone()],
            vec![handle.backend().clone()],
        );
        Self {
            resolver,
            retry,
            handle: OnceCell::new_with(Some(handle)),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn resolver(&self) -> &BackendResolver {
        &self.resolver
    }

    /// The cached backend, if one has been resolved already.
    pub fn resolved(&self) -> Option<&BackendHandle> {
        self.handle.get()
    }

    /// Resolve the backend on first call, then return the cached handle.
    ///
    /// A failed resolution caches nothing; the next call probes again.
    pub async fn backend(&self) -> Result<&BackendHandle> {
        self.handle
            .get_or_try_init(|| self.resolver.resolve())
            .await
    }

    /// Instruction, optional attachment, prior turns → model text.
    pub async fn invoke(
        &self,
        instruction: &str,
        attachment: Option<Attachment>,
        context: &[Turn],
    ) -> Result<String> {
        let request = GenerateRequest::new(instruction)
            .context(context.to_vec())
            .maybe_attachment(attachment);
        self.dispatch(&request, None).await
    }

    /// Same as [`invoke`](Self::invoke) for a prebuilt request.
    pub async fn invoke_request(&self, request: &GenerateRequest) -> Result<String> {
        self.dispatch(request, None).await
    }

    /// Invoke with a token that aborts an in-flight attempt or backoff sleep.
    pub async fn invoke_with_cancel(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.dispatch(request, Some(cancel)).await
    }

    async fn dispatch(
        &self,
        request: &GenerateRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        validate(request)?;
        let handle = match self.backend().await {
            Ok(handle) => handle,
            Err(e) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "provider" => "none",
                    "operation" => OPERATION,
                    "status" => "error",
                )
                .increment(1);
                return Err(e);
            }
        };
        invoke(handle, &self.retry, request, cancel).await
    }
}

/// Send `request` to an already resolved backend under `policy`.
///
/// Never re-resolves: every retry reuses `handle`. Returns the raw text on
/// success, [`KotobaError::TransientExhausted`] when the budget runs out and
/// [`KotobaError::PermanentRejected`] for anything the backend refuses.
#[instrument(skip_all, fields(provider = handle.provider_name(), backend = %handle.backend()))]
pub async fn invoke(
    handle: &BackendHandle,
    policy: &RetryPolicy,
    request: &GenerateRequest,
    cancel: Option<&CancellationToken>,
) -> Result<String> {
    validate(request)?;

    let provider = handle.provider_name().to_owned();
    let start = Instant::now();
    let result = with_retry(policy, &provider, OPERATION, cancel, || {
        handle.generate(request)
    })
    .await;

    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.clone(),
        "operation" => OPERATION,
    )
    .record(start.elapsed().as_secs_f64());
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider,
        "operation" => OPERATION,
        "status" => if result.is_ok() { "ok" } else { "error" },
    )
    .increment(1);

    result.map(|response| response.text)
}

fn validate(request: &GenerateRequest) -> Result<()> {
    if request.instruction.trim().is_empty() {
        return Err(KotobaError::rejected(KotobaError::InvalidInput(
            "instruction must not be empty".into(),
        )));
    }
    Ok(())
}
