//! Conversation transcript and the chat handler

use crate::llm::LanguageModel;
use std::fmt;

/// Reply used when there is no model to talk to
pub const CHAT_DISABLED: &str =
    "Chatbot is disabled. Enable [chat] in config.toml and set gemini_api_key to use it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Append-only record of chat turns, owned by the main loop.
/// Only `clear` ever removes anything.
#[derive(Debug)]
pub struct Transcript {
    assistant_name: String,
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(assistant_name: &str) -> Self {
        Self {
            assistant_name: assistant_name.to_string(),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, speaker: Speaker, text: &str) {
        self.turns.push(Turn {
            speaker,
            text: text.to_string(),
        });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Interleaved "User: ... / Jarvis: ..." rendering
impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for turn in self.turns() {
            let who = match turn.speaker {
                Speaker::User => "User",
                Speaker::Assistant => self.assistant_name.as_str(),
            };
            writeln!(f, "{}: {}", who, turn.text)?;
        }
        Ok(())
    }
}

/// Record `query`, ask the model (one independent request, no prior turns
/// sent), record the reply and return it. Model errors become the reply
/// text. With no model, nothing is requested.
pub fn respond(
    query: &str,
    model: Option<&dyn LanguageModel>,
    transcript: &mut Transcript,
) -> String {
    transcript.push(Speaker::User, query);

    let reply = match model {
        Some(model) => match model.generate(query) {
            Ok(text) => text.trim().to_string(),
            Err(e) => format!("AI error: {}", e),
        },
        None => CHAT_DISABLED.to_string(),
    };

    transcript.push(Speaker::Assistant, &reply);
    reply
}
