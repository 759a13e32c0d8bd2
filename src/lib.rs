//! Kotoba - retrying inference gateway for a Japanese study companion
//!
//! This crate picks a working Gemini backend once (credential × model
//! probing), caches it for the life of the gateway, and invokes it with a
//! bounded, cancellable retry policy. Failures reach the caller as one of
//! three kinds: nothing reachable, retries exhausted, or request refused.
//!
//! On top of the gateway, [`StudySession`] holds the lesson text and the
//! role-play history and offers the study operations: lesson scanning,
//! pronunciation feedback and dialogue.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kotoba::{Kotoba, StudySession};
//!
//! #[tokio::main]
//! async fn main() -> kotoba::Result<()> {
//!     let gateway = Kotoba::builder()
//!         .api_key("primary-key")
//!         .api_key("backup-key")
//!         .build()?;
//!
//!     let mut session = StudySession::new(Arc::new(gateway));
//!     session.load_lesson("Kore wa pen desu.")?;
//!
//!     match session.say("Sore wa nan desu ka?").await {
//!         Ok(reply) => println!("{reply}"),
//!         Err(e) => match e.failure_kind() {
//!             Some(kind) => eprintln!("{}", kind.user_message()),
//!             None => eprintln!("{e}"),
//!         },
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod session;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use error::{FailureKind, KotobaError, Result};
pub use gateway::{BackendHandle, InferenceGateway, Kotoba, KotobaBuilder};
pub use providers::{Backoff, GenerateProvider, RetryPolicy};
pub use session::{Conversation, Instructions, StudySession};

pub use types::{
    Attachment, BackendId, BackendTarget, Credential, GenerateRequest, GenerateResponse,
    MediaKind, Role, Turn, TurnContent, Usage,
};

pub use version::{BuildInfo, PKG_VERSION, version_string};
