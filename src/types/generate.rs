//! Types for a single generation request.

use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use super::turn::Turn;

/// Instruction sent by a liveness probe.
pub const PROBE_INSTRUCTION: &str = "ping";

/// One generation request: instruction, then context, then attachment.
///
/// Providers must keep that order when building the wire payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Natural-language instruction (required, non-empty).
    pub instruction: String,

    /// Prior turns, oldest first. Never truncated by the gateway.
    pub context: Vec<Turn>,

    /// Optional image or audio payload.
    pub attachment: Option<Attachment>,

    /// Upper bound on generated tokens, if any.
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    /// Create a request with just an instruction.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            context: Vec::new(),
            attachment: None,
            max_output_tokens: None,
        }
    }

    /// The smallest request a backend can answer.
    pub fn probe() -> Self {
        Self::new(PROBE_INSTRUCTION).max_output_tokens(1)
    }

    /// Set the context turns.
    pub fn context(mut self, turns: impl Into<Vec<Turn>>) -> Self {
        self.context = turns.into();
        self
    }

    /// Attach one image or audio clip.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Optionally attach.
    pub fn maybe_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Cap generated tokens.
    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.max_output_tokens = Some(n);
        self
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw text produced by a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}
