//! Public types for the Kotoba API.

mod attachment;
mod credential;
mod generate;
mod turn;

pub use attachment::{AUDIO_WAV, Attachment, MediaKind};
pub use credential::{BackendId, BackendTarget, Credential};
pub use generate::{GenerateRequest, GenerateResponse, PROBE_INSTRUCTION, Usage};
pub use turn::{Role, Turn, TurnContent};
