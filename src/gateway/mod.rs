//! Gateway implementations

mod builder;
mod inference;
mod resolver;

pub use builder::{DEFAULT_MODELS, Kotoba, KotobaBuilder};
pub use inference::{InferenceGateway, invoke};
pub use resolver::{BackendHandle, BackendResolver, resolve_backend};
