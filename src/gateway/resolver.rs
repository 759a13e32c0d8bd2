//! Backend resolution: probe candidate pairs in priority order.
//!
//! Candidates are enumerated credentials-outer, backends-inner. The first
//! pair that answers a probe wins; nothing after it is probed. When every
//! probe fails, exactly `|credentials| × |backends|` probes have been sent
//! (there is no early exit from the outer loop).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::providers::GenerateProvider;
use crate::telemetry;
use crate::types::{BackendId, BackendTarget, Credential, GenerateRequest, GenerateResponse};
use crate::{KotobaError, Result};

/// A resolved, reachable backend: one provider bound to one target.
///
/// Cheap to clone. Never re-validated once created.
#[derive(Clone)]
pub struct BackendHandle {
    provider: Arc<dyn GenerateProvider>,
    target: BackendTarget,
}

impl BackendHandle {
    /// Bind a provider to a target without probing it.
    pub fn new(provider: Arc<dyn GenerateProvider>, target: BackendTarget) -> Self {
        Self { provider, target }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    pub fn backend(&self) -> &BackendId {
        &self.target.backend
    }

    pub fn credential_rank(&self) -> usize {
        self.target.credential.rank()
    }

    /// Send one request, without retry.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.provider.generate(&self.target, request).await
    }

    pub(crate) fn provider(&self) -> &Arc<dyn GenerateProvider> {
        &self.provider
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("provider", &self.provider.name())
            .field("target", &self.target)
            .finish()
    }
}

/// Ordered candidate lists plus the provider that can probe them.
pub struct BackendResolver {
    provider: Arc<dyn GenerateProvider>,
    credentials: Vec<Credential>,
    backends: Vec<BackendId>,
}

impl BackendResolver {
    /// `credentials` highest priority first, `backends` most capable first.
    pub fn new(
        provider: Arc<dyn GenerateProvider>,
        credentials: Vec<Credential>,
        backends: Vec<BackendId>,
    ) -> Self {
        Self {
            provider,
            credentials,
            backends,
        }
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn backends(&self) -> &[BackendId] {
        &self.backends
    }

    /// Number of (credential, backend) pairs.
    pub fn candidate_count(&self) -> usize {
        self.credentials.len() * self.backends.len()
    }

    /// All candidate pairs in priority order.
    pub fn candidates(&self) -> impl Iterator<Item = BackendTarget> + '_ {
        self.credentials.iter().flat_map(move |credential| {
            self.backends
                .iter()
                .map(move |backend| BackendTarget::new(credential.clone(), backend.clone()))
        })
    }

    /// Probe candidates in order and bind the first one that answers.
    pub async fn resolve(&self) -> Result<BackendHandle> {
        let provider_name = self.provider.name();
        let mut probed = 0;

        for target in self.candidates() {
            probed += 1;
            debug!(provider = provider_name, candidate = %target, "probing backend");

            match self.provider.probe(&target).await {
                Ok(()) => {
                    metrics::counter!(telemetry::PROBES_TOTAL,
                        "provider" => provider_name.to_owned(),
                        "status" => "ok",
                    )
                    .increment(1);
                    info!(
                        provider = provider_name,
                        backend = %target.backend,
                        credential_rank = target.credential.rank(),
                        probed,
                        "backend selected"
                    );
                    return Ok(BackendHandle::new(self.provider.clone(), target));
                }
                Err(e) => {
                    metrics::counter!(telemetry::PROBES_TOTAL,
                        "provider" => provider_name.to_owned(),
                        "status" => "error",
                    )
                    .increment(1);
                    warn!(
                        provider = provider_name,
                        candidate = %target,
                        error = %e,
                        "probe failed, trying next candidate"
                    );
                }
            }
        }

        warn!(provider = provider_name, probed, "no backend answered");
        Err(KotobaError::NoBackendAvailable { probed })
    }
}

impl fmt::Debug for BackendResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendResolver")
            .field("provider", &self.provider.name())
            .field("credentials", &self.credentials.len())
            .field("backends", &self.backends)
            .finish()
    }
}

/// Resolve a backend from ordered candidate lists.
///
/// Convenience over [`BackendResolver::resolve`] for one-off use.
pub async fn resolve_backend(
    provider: Arc<dyn GenerateProvider>,
    credentials: &[Credential],
    backends: &[BackendId],
) -> Result<BackendHandle> {
    BackendResolver::new(provider, credentials.to_vec(), backends.to_vec())
        .resolve()
        .await
}
