//! Provider seam, retry policy and concrete backends.
//!
//! Backends implement [`GenerateProvider`]; the gateway wraps every call in
//! [`retry::with_retry`]. Gemini is the only bundled backend.

#[cfg(feature = "gemini")]
pub mod gemini;
pub mod retry;
pub mod traits;

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
pub use retry::{Backoff, RetryPolicy};
pub use traits::GenerateProvider;
