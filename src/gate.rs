//! Wake-word / conversation-window gate.
//!
//! An utterance reaches the router only if it names the assistant, or if the
//! previous accepted command was less than the window length ago. The mode
//! (dormant or active) is never stored; it is derived from the last
//! interaction time on every evaluation.

use crate::pipeline::messages::Utterance;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Conversational filler removed from the front of accepted commands.
pub const FILLER_PREFIXES: [&str; 7] = [
    "can you",
    "please",
    "could you",
    "would you",
    "hey",
    "jarvis",
    "zeta",
];

/// Derived gate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// A wake token is required.
    Dormant,
    /// Any utterance is accepted.
    Active,
}

/// Result of running an utterance through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward this (cleaned) text to the router.
    Accept(String),
    /// Not addressed to the assistant.
    Reject,
}

/// The single "last interaction" timestamp shared by the gate and anyone
/// who wants to know whether a conversation is in progress.
#[derive(Debug)]
pub struct ConversationWindow {
    last_interaction: Mutex<Instant>,
    length: Duration,
}

impl ConversationWindow {
    /// A window that starts open, as if a command had just been accepted.
    pub fn new(length: Duration) -> Self {
        Self::starting_at(Instant::now(), length)
    }

    pub fn starting_at(last_interaction: Instant, length: Duration) -> Self {
        Self {
            last_interaction: Mutex::new(last_interaction),
            length,
        }
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn last_interaction(&self) -> Instant {
        match self.last_interaction.lock() {
            Ok(t) => *t,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Record an accepted command at `now`.
    pub fn touch(&self, now: Instant) {
        match self.last_interaction.lock() {
            Ok(mut t) => *t = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Mode as seen at `now`.
    pub fn mode_at(&self, now: Instant) -> GateMode {
        if now.saturating_duration_since(self.last_interaction()) < self.length {
            GateMode::Active
        } else {
            GateMode::Dormant
        }
    }
}

/// Decides whether an utterance is addressed to the assistant.
#[derive(Debug, Clone)]
pub struct CommandGate {
    wake_tokens: Vec<String>,
}

impl CommandGate {
    pub fn new(wake_tokens: &[String]) -> Self {
        Self {
            wake_tokens: wake_tokens.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// Evaluate `utterance` against the window.
    ///
    /// On acceptance the window is touched with the utterance's arrival time
    /// before anything is dispatched, so a slow handler cannot let the window
    /// lapse mid-response. With `require_wake_word == false` the window check
    /// is skipped and everything is accepted.
    pub fn evaluate(
        &self,
        utterance: &Utterance,
        window: &ConversationWindow,
        require_wake_word: bool,
    ) -> GateDecision {
        let text = utterance.text.to_lowercase();
        let now = utterance.received_at;

        let accepted = if let Some(token) = self.find_wake_token(&text) {
            debug!("wake token '{token}' heard");
            Some(strip_wake_token(&text, token))
        } else if !require_wake_word || window.mode_at(now) == GateMode::Active {
            Some(text.trim().to_owned())
        } else {
            None
        };

        match accepted {
            Some(command) => {
                window.touch(now);
                GateDecision::Accept(command)
            }
            None => {
                debug!("ignored (dormant, no wake token): {text}");
                GateDecision::Reject
            }
        }
    }

    fn find_wake_token(&self, text: &str) -> Option<&str> {
        self.wake_tokens
            .iter()
            .find(|t| text.contains(t.as_str()))
            .map(String::as_str)
    }
}

/// Remove the wake token and a greeting "hey" from the utterance.
fn strip_wake_token(text: &str, token: &str) -> String {
    let without_token = text.replace(token, " ");
    let words: Vec<&str> = without_token
        .split_whitespace()
        .filter(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) != "hey")
        .collect();
    trim_edge_punctuation(&words.join(" ")).to_owned()
}

fn trim_edge_punctuation(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':'))
}

/// Drop conversational filler ("can you", "please", ...) from the start of a
/// command, repeatedly, so "please can you open notes" becomes "open notes".
pub fn strip_fillers(command: &str) -> String {
    let mut rest = trim_edge_punctuation(command.trim());
    loop {
        let next = FILLER_PREFIXES.iter().find_map(|prefix| {
            let tail = rest.strip_prefix(prefix)?;
            let boundary = tail.chars().next().is_none_or(|c| !c.is_alphanumeric());
            boundary.then(|| trim_edge_punctuation(tail))
        });
        match next {
            Some(tail) => rest = tail,
            None => return rest.to_owned(),
        }
    }
}
