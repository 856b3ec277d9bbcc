//! The user prompt for one run: the instruction with a timestamp comment in
//! front.

use chrono::{Local, NaiveDateTime};

/// HTML comment carrying the local wall-clock time, so the model knows when
/// it is acting.
pub fn timestamp_comment(now: NaiveDateTime) -> String {
    format!(
        "<!-- Current date and time: {} -->",
        now.format("%Y-%m-%d %H:%M:%S (%a)")
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn compose(instruction: &str, now: NaiveDateTime) -> Self {
        Self(format!("{}\n{instruction}", timestamp_comment(now)))
    }

    /// Compose with the current local time (honours `TZ`).
    pub fn now(instruction: &str) -> Self {
        Self::compose(instruction, Local::now().naive_local())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
