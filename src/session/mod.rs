//! Explicit study session state.
//!
//! A [`StudySession`] owns everything that lives for one learner session:
//! the current lesson text and the role-play history. The gateway (and its
//! cached backend) is shared. All mutation goes through `&mut self`, and
//! history is only appended after a successful invocation.
//!
//! Lifecycle events:
//! - [`load_lesson`](StudySession::load_lesson) /
//!   [`scan_lesson`](StudySession::scan_lesson) replace the lesson and clear
//!   the conversation
//! - [`restart_dialogue`](StudySession::restart_dialogue) clears the
//!   conversation and keeps the lesson

mod conversation;
mod instructions;

use std::sync::Arc;

use tracing::debug;

use crate::gateway::InferenceGateway;
use crate::types::{Attachment, MediaKind, Turn};
use crate::{KotobaError, Result};

pub use conversation::Conversation;
pub use instructions::Instructions;

/// Turns of history sent with each dialogue reply by default.
pub const DEFAULT_CONTEXT_TURNS: usize = 20;

/// One learner's session: lesson, dialogue history, shared gateway.
pub struct StudySession {
    gateway: Arc<InferenceGateway>,
    instructions: Instructions,
    lesson: Option<String>,
    conversation: Conversation,
    context_turns: usize,
}

impl StudySession {
    pub fn new(gateway: Arc<InferenceGateway>) -> Self {
        Self {
            gateway,
            instructions: Instructions::default(),
            lesson: None,
            conversation: Conversation::new(),
            context_turns: DEFAULT_CONTEXT_TURNS,
        }
    }

    /// Replace the instruction templates.
    pub fn with_instructions(mut self, instructions: Instructions) -> Self {
        self.instructions = instructions;
        self
    }

    /// Limit how many past turns accompany each dialogue reply.
    pub fn context_turns(mut self, n: usize) -> Self {
        self.context_turns = n;
        self
    }

    pub fn gateway(&self) -> &InferenceGateway {
        &self.gateway
    }

    pub fn lesson(&self) -> Option<&str> {
        self.lesson.as_deref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Use typed or pasted text as the lesson.
    pub fn load_lesson(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(KotobaError::InvalidInput("lesson text is empty".into()));
        }
        self.replace_lesson(text);
        Ok(())
    }

    /// Extract the lesson from a photo.
    ///
    /// On failure the previous lesson and conversation are left untouched.
    pub async fn scan_lesson(&mut self, image: Attachment) -> Result<&str> {
        if !matches!(image.kind, MediaKind::Image { .. }) {
            return Err(KotobaError::InvalidInput(
                "lesson scans take an image attachment".into(),
            ));
        }
        let text = self
            .gateway
            .invoke(&self.instructions.extract_lesson, Some(image), &[])
            .await?;
        self.replace_lesson(text);
        Ok(self.lesson.as_deref().unwrap_or_default())
    }

    /// Feedback on a recording of the learner reading the lesson aloud.
    pub async fn pronunciation_feedback(&self, audio: Attachment) -> Result<String> {
        if !audio.is_audio() {
            return Err(KotobaError::InvalidInput(
                "pronunciation feedback takes an audio attachment".into(),
            ));
        }
        let lesson = self.lesson.as_deref().ok_or(KotobaError::NoLesson)?;
        let instruction = self.instructions.pronunciation(lesson);
        self.gateway.invoke(&instruction, Some(audio), &[]).await
    }

    /// Role-play reply to a typed message.
    pub async fn say(&mut self, text: impl Into<String>) -> Result<String> {
        self.reply(Turn::user(text), None).await
    }

    /// Role-play reply to a spoken message.
    pub async fn say_voice(&mut self, audio: Attachment) -> Result<String> {
        if !audio.is_audio() {
            return Err(KotobaError::InvalidInput(
                "voice turns take an audio attachment".into(),
            ));
        }
        self.reply(Turn::user_voice(), Some(audio)).await
    }

    /// Forget the dialogue, keep the lesson.
    pub fn restart_dialogue(&mut self) {
        debug!(turns = self.conversation.len(), "dialogue restarted");
        self.conversation.clear();
    }

    async fn reply(&mut self, user_turn: Turn, audio: Option<Attachment>) -> Result<String> {
        let lesson = self.lesson.as_deref().ok_or(KotobaError::NoLesson)?;
        let instruction = self.instructions.role_play(lesson, audio.is_some());

        let mut context = self.conversation.recent(self.context_turns).to_vec();
        context.push(user_turn.clone());

        let text = self.gateway.invoke(&instruction, audio, &context).await?;

        self.conversation.push(user_turn);
        self.conversation.push(Turn::assistant(text.clone()));
        Ok(text)
    }

    fn replace_lesson(&mut self, text: String) {
        debug!(
            chars = text.chars().count(),
            cleared_turns = self.conversation.len(),
            "lesson replaced"
        );
        self.lesson = Some(text);
        self.conversation.clear();
    }
}
