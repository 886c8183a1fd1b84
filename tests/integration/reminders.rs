//! Reminder commands persisted to disk and announced when due.

use crate::helpers::RecordingVoice;
use chrono::{NaiveDate, NaiveDateTime};
use jarvis::reminders::{
    MISSING_MESSAGE, PAST_REFUSED, ReminderStore, UNPARSED_TIME, announce_due, handle_command,
    unix_seconds,
};

/// Monday 2 March 2026, 10:00.
fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[test]
fn commands_are_scheduled_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReminderStore::new(dir.path().join("reminders.json"));
    let now = monday_morning();

    assert_eq!(
        handle_command(&store, "remind me to call mom at 5 pm", now),
        vec!["Okay, I'll remind you to call mom on March 02 at 05:00 PM."]
    );
    assert_eq!(
        handle_command(&store, "remind me to water the plants at 9am tomorrow", now),
        vec!["Okay, I'll remind you to water the plants on March 03 at 09:00 AM."]
    );
    assert_eq!(
        handle_command(&store, "set a reminder to pay rent in 2 hours", now),
        vec!["Okay, I'll remind you to pay rent on March 02 at 12:00 PM."]
    );

    let saved = store.load();
    let messages: Vec<&str> = saved.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, vec!["call mom", "water the plants", "pay rent"]);
    assert_eq!(saved[0].timestamp, unix_seconds(at(2, 17)).unwrap());
    assert_eq!(saved[1].timestamp, unix_seconds(at(3, 9)).unwrap());
    assert!(saved.iter().all(|r| r.set_time == unix_seconds(now).unwrap()));

    // A second store on the same file sees the same reminders.
    let reopened = ReminderStore::new(dir.path().join("reminders.json"));
    assert_eq!(reopened.load(), saved);
}

#[test]
fn unusable_commands_are_explained_and_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReminderStore::new(dir.path().join("reminders.json"));
    let now = monday_morning();

    assert_eq!(handle_command(&store, "remind me", now), vec![MISSING_MESSAGE]);
    assert_eq!(
        handle_command(&store, "remind me to think about things", now),
        vec![UNPARSED_TIME]
    );
    assert_eq!(
        handle_command(&store, "remind me to jump at 9 am yesterday", now),
        vec![PAST_REFUSED]
    );
    assert!(store.load().is_empty());
    assert!(!store.path().exists());
}

#[test]
fn offset_beyond_the_calendar_is_not_scheduled() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReminderStore::new(dir.path().join("reminders.json"));

    assert_eq!(
        handle_command(
            &store,
            "remind me to water plants in 100000000 weeks",
            monday_morning()
        ),
        vec![UNPARSED_TIME]
    );
    assert!(store.load().is_empty());
    assert!(!store.path().exists());
}

#[test]
fn corrupt_file_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reminders.json");
    std::fs::write(&path, "{ not a list").unwrap();

    let store = ReminderStore::new(&path);
    assert!(store.load().is_empty());
    handle_command(&store, "remind me to breathe in 5 minutes", monday_morning());
    assert_eq!(store.load().len(), 1);
}

#[tokio::test]
async fn due_reminders_are_announced_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReminderStore::new(dir.path().join("reminders.json"));
    let now = monday_morning();
    handle_command(&store, "remind me to stand up at 11", now);
    handle_command(&store, "remind me to drink water at noon", now);
    handle_command(&store, "remind me to go home at 6 pm", now);

    let voice = RecordingVoice::default();
    let half_past_noon = unix_seconds(at(2, 12)).unwrap() + 1800.0;
    assert_eq!(announce_due(&store, &voice, half_past_noon).await, 2);
    assert_eq!(
        voice.spoken(),
        vec!["Reminder: stand up", "Reminder: drink water"]
    );

    // Announced reminders are gone; the evening one is still pending.
    assert_eq!(announce_due(&store, &voice, half_past_noon).await, 0);
    let left = store.load();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].message, "go home");
}
