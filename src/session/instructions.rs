//! Instruction templates sent with each session operation.

use serde::Deserialize;

/// Placeholder replaced by the current lesson text.
const LESSON_PLACEHOLDER: &str = "{lesson}";

const VOICE_HINT: &str = "The learner's last turn is the attached recording.";

/// Instruction strings for the three session operations.
///
/// `pronunciation` and `role_play` may contain `{lesson}`; if they don't,
/// the lesson is appended on its own paragraph.
///
/// ```toml
/// [instructions]
/// role_play = "Play a shop keeper. Lesson:\n{lesson}"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Instructions {
    pub extract_lesson: String,
    pub pronunciation: String,
    pub role_play: String,
}

impl Default for Instructions {
    fn default() -> Self {
        Self {
            extract_lesson: "Extract the Japanese lesson text from this image. Give the \
                Japanese exactly as written, then its romaji reading, then a French \
                translation. Keep the original line breaks."
                .into(),
            pronunciation: "You are a patient Japanese pronunciation coach. The learner \
                is reading this lesson aloud:\n{lesson}\nListen to the recording. Point \
                out the words that were unclear, explain how to fix them, and end with \
                a score out of 10."
                .into(),
            role_play: "You are a friendly Japanese conversation partner. Stay within \
                the vocabulary of this lesson:\n{lesson}\nContinue the dialogue below \
                with one short reply in Japanese, then its romaji and a French \
                translation."
                .into(),
        }
    }
}

impl Instructions {
    pub(crate) fn pronunciation(&self, lesson: &str) -> String {
        fill(&self.pronunciation, lesson)
    }

    pub(crate) fn role_play(&self, lesson: &str, voice: bool) -> String {
        let mut instruction = fill(&self.role_play, lesson);
        if voice {
            instruction.push('\n');
            instruction.push_str(VOICE_HINT);
        }
        instruction
    }
}

fn fill(template: &str, lesson: &str) -> String {
    if template.contains(LESSON_PLACEHOLDER) {
        template.replace(LESSON_PLACEHOLDER, lesson)
    } else {
        format!("{template}\n\n{lesson}")
    }
}
