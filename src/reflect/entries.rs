use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::reflect::crypto::Decryptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoodTag {
    Joyful,
    Happy,
    Calm,
    Neutral,
    Tired,
    Anxious,
    Sad,
    Crying,
    Angry,
}

impl MoodTag {
    pub fn symbol(self) -> &'static str {
        match self {
            MoodTag::Joyful => "😄",
            MoodTag::Happy => "😊",
            MoodTag::Calm => "😌",
            MoodTag::Neutral => "😐",
            MoodTag::Tired => "😴",
            MoodTag::Anxious => "😰",
            MoodTag::Sad => "😔",
            MoodTag::Crying => "😢",
            MoodTag::Angry => "😠",
        }
    }

    /// Affect score on a 1-5 scale. Only feeds the variance estimate.
    pub fn affect_score(self) -> f64 {
        match self {
            MoodTag::Joyful => 5.0,
            MoodTag::Happy | MoodTag::Calm => 4.0,
            MoodTag::Neutral => 3.0,
            MoodTag::Tired | MoodTag::Anxious | MoodTag::Sad => 2.0,
            MoodTag::Crying | MoodTag::Angry => 1.0,
        }
    }
}

impl fmt::Display for MoodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for MoodTag {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let tag = match trimmed {
            "😄" | "😁" => MoodTag::Joyful,
            "😊" | "🙂" => MoodTag::Happy,
            "😌" => MoodTag::Calm,
            "😐" => MoodTag::Neutral,
            "😴" => MoodTag::Tired,
            "😰" | "😟" => MoodTag::Anxious,
            "😔" | "🙁" => MoodTag::Sad,
            "😢" | "😭" => MoodTag::Crying,
            "😠" | "😡" => MoodTag::Angry,
            other => match other.to_ascii_lowercase().as_str() {
                "joyful" | "great" | "excited" => MoodTag::Joyful,
                "happy" | "good" => MoodTag::Happy,
                "calm" | "peaceful" | "content" => MoodTag::Calm,
                "neutral" | "okay" | "ok" | "meh" => MoodTag::Neutral,
                "tired" | "exhausted" => MoodTag::Tired,
                "anxious" | "worried" | "stressed" => MoodTag::Anxious,
                "sad" | "down" | "low" => MoodTag::Sad,
                "crying" | "upset" => MoodTag::Crying,
                "angry" | "frustrated" => MoodTag::Angry,
                _ => return Err(format!("unknown mood `{trimmed}`")),
            },
        };
        Ok(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    pub date: NaiveDate,
    pub mood: Option<MoodTag>,
    pub word_count: u32,
    pub text: String,
    pub prompt_text: String,
    pub prompt_category: Option<String>,
}

/// One stored row, before decryption and normalisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntryRow {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub reflection_text: Option<String>,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub prompt_type: Option<String>,
}

/// Read side of the journal store.
pub trait EntrySource {
    /// Rows for `user_id` with `start <= date <= end`, ordered oldest first.
    fn fetch_rows(&self, user_id: &str, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<RawEntryRow>>;
}

/// Newline-delimited JSON store, one row per line.
pub struct JsonlEntryStore {
    path: PathBuf,
}

impl JsonlEntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntrySource for JsonlEntryStore {
    fn fetch_rows(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawEntryRow>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "entry store missing, treating as empty");
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let mut rows = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("failed to read line from {}", self.path.display()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let row = match serde_json::from_str::<RawEntryRow>(trimmed) {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(line = idx + 1, error = %err, "skipping unparseable entry row");
                    continue;
                }
            };
            if row.user_id == user_id && row.date >= start && row.date <= end {
                rows.push(row);
            }
        }

        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.created_at.cmp(&b.created_at)));
        Ok(rows)
    }
}

fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

fn normalize_optional(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Decrypt and normalise one stored row.
pub fn entry_from_row(row: RawEntryRow, decryptor: &dyn Decryptor) -> JournalEntry {
    let raw_text = row.reflection_text.unwrap_or_default();
    let text = match decryptor.decrypt_if_encrypted(&raw_text) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(date = %row.date, error = %err, "dropping reflection text that could not be decrypted");
            String::new()
        }
    };

    let mood = row.mood.as_deref().and_then(|raw| match raw.parse::<MoodTag>() {
        Ok(tag) => Some(tag),
        Err(err) => {
            tracing::debug!(date = %row.date, %err, "ignoring mood");
            None
        }
    });

    let word_count = row.word_count.unwrap_or_else(|| count_words(&text));

    JournalEntry {
        date: row.date,
        mood,
        word_count,
        text,
        prompt_text: row.prompt_text.unwrap_or_default(),
        prompt_category: normalize_optional(row.prompt_type),
    }
}

/// Fetch and decrypt every entry for the period. Only store failures
/// propagate.
pub fn load_entries(
    source: &dyn EntrySource,
    decryptor: &dyn Decryptor,
    user_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<JournalEntry>> {
    let rows = source
        .fetch_rows(user_id, start, end)
        .with_context(|| format!("failed to fetch journal entries for {user_id}"))?;
    Ok(rows
        .into_iter()
        .map(|row| entry_from_row(row, decryptor))
        .collect())
}
