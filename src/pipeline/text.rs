//! Text shaping applied before speech is queued.
//!
//! Two passes, in order:
//! 1. Emotion rewrite: an angry listener gets a short apology instead of a
//!    long answer, or an empathetic prefix on a short one.
//! 2. Stage directions: `*laughs*`, `(sighs)` and friends become vocal
//!    interjections or silence, ellipses are flattened and any leftover
//!    bracketed annotation is removed.

use regex::Regex;
use std::sync::LazyLock;

/// Replaces a long reply while the user is angry.
pub const ANGRY_APOLOGY: &str = "I am sorry. I will try to do better.";

/// Prefixed to a short reply while the user is angry.
pub const ANGRY_PREFIX: &str = "I understand. ";

/// Stage direction → spoken replacement, applied top to bottom.
const STAGE_DIRECTIONS: [(&str, &str); 12] = [
    (r"laughs|laughter|laughing|chuckles|giggles|rofl|lol", " Haha! "),
    (r"sighs|sighing", " hh... "),
    (r"clears throat|ahem", " mm-hm "),
    (r"gasps|gasp", " oh! "),
    (r"yawn|yawns", " yawn... "),
    (r"cries|sobs|sniffles", " snff... "),
    (r"hums|humming", " hmm hmm "),
    (r"screams|shouts", " ah! "),
    (r"smirk|smirks|smirking", " heh. "),
    (r"blushes|shy|acting shy", " um... "),
    (r"pauses|thinking|thinks", " hmm... "),
    (
        r"winks|nods|shrugs|smiles|frowns|looks|points|waves|stares|leans|bounces|beams",
        "",
    ),
];

#[allow(clippy::expect_used)]
static STAGE_DIRECTION_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    STAGE_DIRECTIONS
        .iter()
        .map(|(words, replacement)| {
            let pattern = format!(r"(?i)[\(\*]+({words})[\)\*]+");
            (
                Regex::new(&pattern).expect("valid stage direction regex"),
                *replacement,
            )
        })
        .collect()
});

#[allow(clippy::expect_used)]
static ELLIPSIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\.\.\.|…)").expect("valid ellipsis regex"));

#[allow(clippy::expect_used)]
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[\(\*][^\)\*]+[\)\*]\s*").expect("valid annotation regex"));

/// Apply the angry-listener rewrite.
pub fn rewrite_for_emotion(text: &str, emotion: &str, length_threshold: usize) -> String {
    if !emotion.eq_ignore_ascii_case("angry") {
        return text.to_owned();
    }
    if text.chars().count() > length_threshold {
        ANGRY_APOLOGY.to_owned()
    } else {
        format!("{ANGRY_PREFIX}{text}")
    }
}

/// Turn stage directions into speakable interjections and strip the rest.
pub fn replace_stage_directions(text: &str) -> String {
    let mut out = text.to_owned();
    for (rule, replacement) in STAGE_DIRECTION_RULES.iter() {
        out = rule.replace_all(&out, *replacement).into_owned();
    }
    out = ELLIPSIS.replace_all(&out, " ").into_owned();
    out = BRACKETED.replace_all(&out, " ").into_owned();
    out.trim().to_owned()
}

/// Full preprocessing for a piece of outgoing speech.
pub fn prepare_for_speech(text: &str, emotion: &str, length_threshold: usize) -> String {
    let rewritten = rewrite_for_emotion(text, emotion, length_threshold);
    replace_stage_directions(&rewritten)
}

/// Byte index just past the first sentence terminator (`.`, `?`, `!`)
/// that is followed by whitespace, including that whitespace.
///
/// Used to cut streamed model output into speakable sentences.
pub fn sentence_end(buffer: &str) -> Option<usize> {
    let mut chars = buffer.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        let mut end = i + c.len_utf8();
        let mut saw_space = false;
        while let Some(&(j, next)) = chars.peek() {
            if next.is_whitespace() {
                saw_space = true;
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if saw_space {
            return Some(end);
        }
    }
    None
}
