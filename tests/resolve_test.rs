//! Tests for backend resolution over credential × model candidates.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kotoba::gateway::{BackendResolver, resolve_backend};
use kotoba::providers::GenerateProvider;
use kotoba::types::PROBE_INSTRUCTION;
use kotoba::{
    BackendId, BackendTarget, Credential, GenerateRequest, GenerateResponse, KotobaError, Result,
};

// ============================================================================
// Mock provider
// ============================================================================

/// Answers probes only for the listed (credential rank, model) pairs and
/// records every probe in order.
struct ScriptedProbe {
    alive: HashSet<(usize, &'static str)>,
    probed: Mutex<Vec<(usize, String)>>,
}

impl ScriptedProbe {
    fn new(alive: &[(usize, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            alive: alive.iter().copied().collect(),
            probed: Mutex::new(Vec::new()),
        })
    }

    fn probed(&self) -> Vec<(usize, String)> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerateProvider for ScriptedProbe {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _target: &BackendTarget,
        _request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        Ok(GenerateResponse::text("unused"))
    }

    async fn probe(&self, target: &BackendTarget) -> Result<()> {
        let rank = target.credential.rank();
        let model = target.backend.as_str();
        self.probed.lock().unwrap().push((rank, model.to_string()));
        if self.alive.iter().any(|&(r, m)| r == rank && m == model) {
            Ok(())
        } else if rank == 0 {
            Err(KotobaError::AuthenticationFailed("API key not valid".into()))
        } else {
            Err(KotobaError::ModelNotFound {
                model: model.to_string(),
                message: "not found for API version v1beta".into(),
            })
        }
    }
}

/// Relies on the default `probe`, recording what it sends.
#[derive(Default)]
struct RecordingGenerate {
    calls: AtomicU32,
    last: Mutex<Option<GenerateRequest>>,
}

#[async_trait]
impl GenerateProvider for RecordingGenerate {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(
        &self,
        _target: &BackendTarget,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        Ok(GenerateResponse::text("pong"))
    }
}

fn keys(n: usize) -> Vec<Credential> {
    Credential::ranked((0..n).map(|i| format!("key-{i}")))
}

fn models(ids: &[&str]) -> Vec<BackendId> {
    ids.iter().copied().map(BackendId::from).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn first_candidate_wins_without_further_probes() {
    let provider = ScriptedProbe::new(&[(0, "pro"), (0, "flash"), (1, "pro")]);
    let resolver = BackendResolver::new(provider.clone(), keys(2), models(&["pro", "flash"]));

    let handle = resolver.resolve().await.unwrap();

    assert_eq!(handle.credential_rank(), 0);
    assert_eq!(handle.backend().as_str(), "pro");
    assert_eq!(provider.probed(), vec![(0, "pro".to_string())]);
}

#[tokio::test]
async fn probes_every_model_for_a_credential_before_the_next_credential() {
    let provider = ScriptedProbe::new(&[(1, "pro")]);
    let resolver = BackendResolver::new(provider.clone(), keys(2), models(&["pro", "flash"]));

    let handle = resolver.resolve().await.unwrap();

    assert_eq!(handle.credential_rank(), 1);
    assert_eq!(handle.backend().as_str(), "pro");
    assert_eq!(
        provider.probed(),
        vec![
            (0, "pro".to_string()),
            (0, "flash".to_string()),
            (1, "pro".to_string()),
        ]
    );
}

#[tokio::test]
async fn falls_back_to_a_less_capable_model() {
    let provider = ScriptedProbe::new(&[(0, "flash")]);
    let handle = resolve_backend(provider.clone(), &keys(1), &models(&["pro", "flash"]))
        .await
        .unwrap();

    assert_eq!(handle.backend().as_str(), "flash");
    assert_eq!(provider.probed().len(), 2);
}

#[tokio::test]
async fn all_probes_failing_costs_exactly_every_candidate() {
    let provider = ScriptedProbe::new(&[]);
    let resolver = BackendResolver::new(
        provider.clone(),
        keys(3),
        models(&["pro", "flash", "lite"]),
    );

    let err = resolver.resolve().await.unwrap_err();

    assert!(matches!(err, KotobaError::NoBackendAvailable { probed: 9 }));
    let probed = provider.probed();
    assert_eq!(probed.len(), 9);
    // Each pair probed once
    let unique: HashSet<_> = probed.iter().collect();
    assert_eq!(unique.len(), 9);
}

#[tokio::test]
async fn empty_candidate_lists_probe_nothing() {
    let provider = ScriptedProbe::new(&[(0, "pro")]);

    let err = resolve_backend(provider.clone(), &[], &models(&["pro"]))
        .await
        .unwrap_err();
    assert!(matches!(err, KotobaError::NoBackendAvailable { probed: 0 }));

    let err = resolve_backend(provider.clone(), &keys(2), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, KotobaError::NoBackendAvailable { probed: 0 }));

    assert!(provider.probed().is_empty());
}

#[tokio::test]
async fn resolution_is_repeatable() {
    let provider = ScriptedProbe::new(&[(0, "flash"), (1, "pro")]);
    let resolver = BackendResolver::new(provider, keys(2), models(&["pro", "flash"]));

    let first = resolver.resolve().await.unwrap();
    let second = resolver.resolve().await.unwrap();

    assert_eq!(first.target(), second.target());
}

#[tokio::test]
async fn default_probe_sends_minimal_request() {
    let provider = Arc::new(RecordingGenerate::default());
    let handle = resolve_backend(provider.clone(), &keys(1), &models(&["flash"]))
        .await
        .unwrap();

    assert_eq!(handle.provider_name(), "recording");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    let sent = provider.last.lock().unwrap().clone().unwrap();
    assert_eq!(sent.instruction, PROBE_INSTRUCTION);
    assert_eq!(sent.max_output_tokens, Some(1));
    assert!(sent.context.is_empty());
    assert!(sent.attachment.is_none());
}

#[test]
fn candidate_count_is_the_product() {
    let provider = ScriptedProbe::new(&[]);
    let resolver = BackendResolver::new(provider, keys(4), models(&["a", "b", "c"]));
    assert_eq!(resolver.candidate_count(), 12);
    assert_eq!(resolver.candidates().count(), 12);
}
