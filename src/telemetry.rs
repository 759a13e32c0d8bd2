//! Telemetry metric name constants.
//!
//! Centralised metric names for kotoba operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `kotoba_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "gemini")
//! - `operation`: what was invoked (e.g. "generate")
//! - `status`: outcome: "ok" or "error"

/// Liveness probes issued while resolving a backend.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const PROBES_TOTAL: &str = "kotoba_probes_total";

/// Gateway invocations, counted once per call (not per attempt).
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "kotoba_requests_total";

/// Invocation duration in seconds, backoff included.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "kotoba_request_duration_seconds";

/// Retries scheduled after a transient failure.
///
/// A failure on the last allowed attempt is not counted.
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "kotoba_retries_total";
