//! Responder trait and the scripted tutor

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

/// Input to one automated reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPrompt {
    /// Text of the Human message that triggered the reply
    pub message: String,
    /// Skill the session owner teaches
    pub offered_topic: String,
    /// Skill the session owner learns
    pub wanted_topic: String,
}

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("Responder failed: {0}")]
    Failed(String),
}

/// Produces the text of an Assistant reply
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, prompt: &ReplyPrompt) -> Result<String, ResponderError>;
}

const QUESTION_REPLIES: &[&str] = &[
    "Great question! Here's a tip for {wanted}: break it into one small goal for this session and ask {partner} to check it.",
    "Good thing to ask. Try answering it together: you explain what you know about {offered}, then let your partner do the same for {wanted}.",
    "When you're stuck on \"{excerpt}\", look for the simplest example you can find and build from there.",
];

const GENERAL_REPLIES: &[&str] = &[
    "Nice start! Since you teach {offered} and learn {wanted}, try swapping roles every ten minutes.",
    "Tip for learning {wanted}: practice a little every day and ask your partner to correct you right away.",
    "Teaching {offered} is a great way to learn it deeper. What's the first thing your partner should try?",
    "You said \"{excerpt}\". Try explaining that back in your own words; it helps both of you remember it.",
];

/// Template-based tutor with a seedable RNG
pub struct ScriptedTutor {
    rng: Mutex<StdRng>,
}

impl ScriptedTutor {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic replies for a given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seeded when a seed is configured, random otherwise
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    fn pick(&self, templates: &'static [&'static str]) -> Result<&'static str, ResponderError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ResponderError::Failed("tutor state poisoned".to_string()))?;
        Ok(templates[rng.random_range(0..templates.len())])
    }
}

impl Default for ScriptedTutor {
    fn default() -> Self {
        Self::new()
    }
}

/// First words of a message, cut at a char boundary
fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", trimmed[..cut].trim_end()),
        None => trimmed.to_string(),
    }
}

fn render(template: &str, prompt: &ReplyPrompt) -> String {
    template
        .replace("{offered}", &prompt.offered_topic)
        .replace("{wanted}", &prompt.wanted_topic)
        .replace("{partner}", "your partner")
        .replace("{excerpt}", &excerpt(&prompt.message, 40))
}

#[async_trait]
impl Responder for ScriptedTutor {
    async fn respond(&self, prompt: &ReplyPrompt) -> Result<String, ResponderError> {
        debug!(message_len = prompt.message.len(), "ScriptedTutor::respond: called");
        let templates = if prompt.message.contains('?') {
            QUESTION_REPLIES
        } else {
            GENERAL_REPLIES
        };
        let template = self.pick(templates)?;
        Ok(format!("AI says: {}", render(template, prompt)))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the prompt back and records every call
    pub struct EchoResponder {
        calls: AtomicUsize,
        prompts: Mutex<Vec<ReplyPrompt>>,
        fail: bool,
    }

    impl EchoResponder {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<ReplyPrompt> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, prompt: &ReplyPrompt) -> Result<String, ResponderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.clone());
            if self.fail {
                return Err(ResponderError::Failed("mock failure".to_string()));
            }
            Ok(format!("re: {}", prompt.message))
        }
    }
}
