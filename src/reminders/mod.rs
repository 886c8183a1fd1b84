//! Spoken reminders persisted to `reminders.json`.
//!
//! Records are `{message, timestamp, set_time}` with Unix-second `f64`
//! timestamps. A periodic check announces due items and rewrites the file
//! with whatever is still pending.

pub mod parse;

use crate::error::{AssistantError, Result};
use crate::pipeline::Voice;
use chrono::{Datelike, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Pause between consecutive due announcements.
pub const ANNOUNCE_GAP: Duration = Duration::from_secs(1);

pub const MISSING_MESSAGE: &str =
    "I'm sorry, I didn't catch what you want to be reminded about.";
pub const UNPARSED_TIME: &str =
    "I couldn't understand the time for that reminder. Could you be more specific?";
pub const PAST_REFUSED: &str = "I can't set reminders for the past, *giggles*.";
pub const PAST_WARNING: &str =
    "Hmm, that time seems to be in the past. I'll set it for then anyway, but please check.";
pub const SAVE_FAILED: &str = "I couldn't save that reminder.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub message: String,
    /// When the reminder is due.
    pub timestamp: f64,
    /// When the reminder was created.
    pub set_time: f64,
}

/// JSON file of pending reminders.
#[derive(Debug)]
pub struct ReminderStore {
    path: PathBuf,
    // Serializes read-modify-write cycles between the router and the due check.
    lock: Mutex<()>,
}

impl ReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All pending reminders. A missing or corrupt file reads as empty.
    pub fn load(&self) -> Vec<Reminder> {
        let _guard = self.lock.lock();
        self.read_unlocked()
    }

    /// Append a reminder.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add(&self, reminder: Reminder) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| AssistantError::Storage(format!("reminder lock poisoned: {e}")))?;
        let mut reminders = self.read_unlocked();
        reminders.push(reminder);
        self.write_unlocked(&reminders)
    }

    /// Remove and return every reminder due at or before `now_ts`. The file
    /// is only rewritten when something was due.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub fn take_due(&self, now_ts: f64) -> Result<Vec<Reminder>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| AssistantError::Storage(format!("reminder lock poisoned: {e}")))?;
        let (due, keep): (Vec<_>, Vec<_>) = self
            .read_unlocked()
            .into_iter()
            .partition(|r| r.timestamp <= now_ts);
        if !due.is_empty() {
            self.write_unlocked(&keep)?;
        }
        Ok(due)
    }

    fn read_unlocked(&self) -> Vec<Reminder> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("ignoring unreadable reminders file {}: {e}", self.path.display());
            Vec::new()
        })
    }

    fn write_unlocked(&self, reminders: &[Reminder]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(reminders)?;
        std::fs::write(&self.path, json)
            .map_err(|e| AssistantError::Storage(format!("{}: {e}", self.path.display())))
    }
}

/// Local wall-clock time as Unix seconds.
pub fn unix_seconds(at: NaiveDateTime) -> Option<f64> {
    let local = Local.from_local_datetime(&at).earliest()?;
    #[allow(clippy::cast_precision_loss)]
    let secs = local.timestamp_millis() as f64 / 1000.0;
    Some(secs)
}

/// What to do with a parsed reminder request.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    /// Nothing after the trigger phrase.
    MissingMessage,
    /// No recognizable time.
    UnparsedTime,
    /// Explicitly in the past ("yesterday", "last friday").
    RefusedPast,
    Scheduled {
        message: String,
        due: NaiveDateTime,
        /// The time was in the past and could not be adjusted.
        past_warning: bool,
    },
}

/// Interpret a reminder command relative to `now`.
pub fn plan(command: &str, now: NaiveDateTime) -> Schedule {
    let Some(text) = parse::reminder_text(command) else {
        return Schedule::MissingMessage;
    };
    let Some((message, mut due)) = parse::split_message_and_time(text, now) else {
        return Schedule::UnparsedTime;
    };

    let mut past_warning = false;
    if due < now {
        if command.contains("yesterday") || command.contains("last") {
            return Schedule::RefusedPast;
        }
        if due.date() == now.date() {
            due += chrono::Duration::days(1);
        } else if due.year() == now.year() && due.month() == now.month() && due.day() < now.day()
        {
            due += chrono::Duration::days(7);
        } else {
            past_warning = true;
        }
    }
    Schedule::Scheduled {
        message,
        due,
        past_warning,
    }
}

/// Handle "remind me ..." end to end, returning the lines to speak.
pub fn handle_command(store: &ReminderStore, command: &str, now: NaiveDateTime) -> Vec<String> {
    match plan(command, now) {
        Schedule::MissingMessage => vec![MISSING_MESSAGE.to_owned()],
        Schedule::UnparsedTime => vec![UNPARSED_TIME.to_owned()],
        Schedule::RefusedPast => vec![PAST_REFUSED.to_owned()],
        Schedule::Scheduled {
            message,
            due,
            past_warning,
        } => {
            let mut lines = Vec::new();
            if past_warning {
                lines.push(PAST_WARNING.to_owned());
            }
            let (Some(timestamp), Some(set_time)) = (unix_seconds(due), unix_seconds(now)) else {
                return vec![UNPARSED_TIME.to_owned()];
            };
            let reminder = Reminder {
                message: message.clone(),
                timestamp,
                set_time,
            };
            if let Err(e) = store.add(reminder) {
                warn!("failed to save reminder: {e}");
                lines.push(SAVE_FAILED.to_owned());
                return lines;
            }
            info!("reminder set for {due}: {message}");
            lines.push(format!(
                "Okay, I'll remind you to {message} on {}.",
                due.format("%B %d at %I:%M %p")
            ));
            lines
        }
    }
}

/// Speak every due reminder, pausing between them.
pub async fn announce_due(store: &ReminderStore, voice: &dyn Voice, now_ts: f64) -> usize {
    let due = match store.take_due(now_ts) {
        Ok(due) => due,
        Err(e) => {
            warn!("reminder check failed: {e}");
            return 0;
        }
    };
    for (i, reminder) in due.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(ANNOUNCE_GAP).await;
        }
        info!("reminder due: {}", reminder.message);
        voice.speak(&format!("Reminder: {}", reminder.message));
    }
    due.len()
}
