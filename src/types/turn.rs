//! Conversation turns for the role-play dialogue

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Turn content. Voice clips are kept only as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnContent {
    Text(String),
    VoiceClip,
}

impl TurnContent {
    /// Get the text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TurnContent::Text(s) => Some(s),
            TurnContent::VoiceClip => None,
        }
    }
}

/// One message in the dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    /// Create a user text turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(content.into()),
        }
    }

    /// Create a user turn standing in for a recorded clip
    pub fn user_voice() -> Self {
        Self {
            role: Role::User,
            content: TurnContent::VoiceClip,
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(content.into()),
        }
    }

    /// Flatten into the single text line sent to the model.
    pub fn to_prompt_line(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => format!("{}: {text}", self.role.label()),
            TurnContent::VoiceClip => format!("{}: [voice clip]", self.role.label()),
        }
    }
}
