//! Smoothed emotion signal.
//!
//! Face analysis reports a label per observation, which is noisy frame to
//! frame. The window keeps the last [`WINDOW_CAPACITY`] labels and exposes
//! the majority as the current emotion.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Number of recent labels considered.
pub const WINDOW_CAPACITY: usize = 10;

/// Label reported before any observation arrives.
pub const NEUTRAL: &str = "neutral";

/// Bounded ring of recent emotion labels with a cached majority.
#[derive(Debug)]
pub struct EmotionWindow {
    inner: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    labels: VecDeque<String>,
    current: String,
}

impl Default for EmotionWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionWindow {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WindowState {
                labels: VecDeque::with_capacity(WINDOW_CAPACITY),
                current: NEUTRAL.to_owned(),
            }),
        }
    }

    /// Push a classified label and recompute the majority.
    ///
    /// Returns the current emotion after the update.
    pub fn update(&self, label: &str) -> String {
        let label = label.trim().to_lowercase();
        let mut state = match self.inner.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if label.is_empty() {
            return state.current.clone();
        }
        if state.labels.len() == WINDOW_CAPACITY {
            state.labels.pop_front();
        }
        state.labels.push_back(label);
        if let Some(majority) = majority(&state.labels) {
            state.current = majority;
        }
        state.current.clone()
    }

    /// The majority label over the window (`"neutral"` when empty).
    pub fn current(&self) -> String {
        match self.inner.lock() {
            Ok(s) => s.current.clone(),
            Err(poisoned) => poisoned.into_inner().current.clone(),
        }
    }

    /// Whether the current emotion equals `label` (case-insensitive).
    pub fn is(&self, label: &str) -> bool {
        self.current().eq_ignore_ascii_case(label)
    }
}

/// Most frequent label. On a tie, the label that reached the winning count
/// first (scanning oldest to newest) wins.
fn majority(labels: &VecDeque<String>) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut best: Option<(&str, usize)> = None;
    for label in labels {
        let count = match counts.iter_mut().find(|(l, _)| *l == label.as_str()) {
            Some(entry) => {
                entry.1 += 1;
                entry.1
            }
            None => {
                counts.push((label.as_str(), 1));
                1
            }
        };
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((label.as_str(), count));
        }
    }
    best.map(|(l, _)| l.to_owned())
}
