//! Monthly feature extraction.
//!
//! Turns a period's journal entries into `MonthlyContext` statistics and the
//! plain-text context handed to a model as the user turn. Everything here is
//! a pure function of its inputs.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::reflect::entries::{JournalEntry, MoodTag};
use crate::reflect::util::truncate_with_ellipsis;

const MIN_WORD_LEN: usize = 4;
const MIN_REPEAT_COUNT: usize = 6;
const MAX_REPEATED_WORDS: usize = 10;
const MAX_CATEGORY_ROWS: usize = 4;
const MAX_EXCERPTS: usize = 3;
const EXCERPT_CHARS: usize = 140;

const RENDER_MOODS: usize = 6;
const RENDER_WORDS: usize = 8;

const STOPWORDS: [&str; 32] = [
    "that", "this", "with", "have", "from", "just", "like", "about", "been", "were", "they",
    "them", "their", "there", "what", "when", "which", "would", "could", "should", "into",
    "than", "then", "also", "very", "really", "because", "some", "more", "much", "will", "your",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodCount {
    pub mood: MoodTag,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDepth {
    pub category: String,
    pub count: usize,
    pub average_word_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Excerpt {
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyContext {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub display_name: Option<String>,
    pub entry_count: usize,
    pub average_word_count: u32,
    pub mood_distribution: Vec<MoodCount>,
    pub mood_variance: Option<f64>,
    pub repeated_words: Vec<WordCount>,
    pub category_depth: Vec<CategoryDepth>,
    pub excerpts: Vec<Excerpt>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn rounded_average(total: u64, count: usize) -> u32 {
    if count == 0 {
        return 0;
    }
    (total as f64 / count as f64).round() as u32
}

pub fn average_word_count(entries: &[JournalEntry]) -> u32 {
    let total: u64 = entries.iter().map(|e| u64::from(e.word_count)).sum();
    rounded_average(total, entries.len())
}

/// Ranked by count, ties broken by the tag's declaration order.
pub fn mood_distribution(entries: &[JournalEntry]) -> Vec<MoodCount> {
    let mut counts = BTreeMap::<MoodTag, usize>::new();
    for mood in entries.iter().filter_map(|e| e.mood) {
        *counts.entry(mood).or_insert(0) += 1;
    }
    let mut out: Vec<MoodCount> = counts
        .into_iter()
        .map(|(mood, count)| MoodCount { mood, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.mood.cmp(&b.mood)));
    out
}

/// Population variance of affect scores, rounded to two decimals. `None`
/// below two scored entries.
pub fn mood_variance(entries: &[JournalEntry]) -> Option<f64> {
    let scores: Vec<f64> = entries
        .iter()
        .filter_map(|e| e.mood.map(MoodTag::affect_score))
        .collect();
    if scores.len() < 2 {
        return None;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    Some(round_to(variance, 2))
}

fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '\'')
        .collect();
    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_WORD_LEN && !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Words used at least six times across the whole period, most frequent
/// first, ties alphabetical.
pub fn repeated_words(entries: &[JournalEntry]) -> Vec<WordCount> {
    let mut counts = BTreeMap::<String, usize>::new();
    for entry in entries {
        for token in tokenize(&entry.text) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    let mut out: Vec<WordCount> = counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_REPEAT_COUNT)
        .map(|(word, count)| WordCount { word, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    out.truncate(MAX_REPEATED_WORDS);
    out
}

/// Prompt categories ranked by average entry length.
pub fn category_depth(entries: &[JournalEntry]) -> Vec<CategoryDepth> {
    let mut totals = BTreeMap::<&str, (usize, u64)>::new();
    for entry in entries {
        let Some(category) = entry.prompt_category.as_deref() else {
            continue;
        };
        let slot = totals.entry(category).or_insert((0, 0));
        slot.0 += 1;
        slot.1 += u64::from(entry.word_count);
    }
    let mut out: Vec<CategoryDepth> = totals
        .into_iter()
        .map(|(category, (count, words))| CategoryDepth {
            category: category.to_string(),
            count,
            average_word_count: rounded_average(words, count),
        })
        .collect();
    out.sort_by(|a, b| {
        b.average_word_count
            .cmp(&a.average_word_count)
            .then_with(|| a.category.cmp(&b.category))
    });
    out.truncate(MAX_CATEGORY_ROWS);
    out
}

/// The most recent entries with text, kept in stored order.
pub fn excerpts(entries: &[JournalEntry]) -> Vec<Excerpt> {
    let with_text: Vec<&JournalEntry> = entries
        .iter()
        .filter(|e| !e.text.trim().is_empty())
        .collect();
    let skip = with_text.len().saturating_sub(MAX_EXCERPTS);
    with_text
        .into_iter()
        .skip(skip)
        .map(|e| Excerpt {
            date: e.date,
            text: truncate_with_ellipsis(e.text.trim(), EXCERPT_CHARS),
        })
        .collect()
}

pub fn extract_context(
    entries: &[JournalEntry],
    period_start: NaiveDate,
    period_end: NaiveDate,
    display_name: Option<&str>,
) -> MonthlyContext {
    MonthlyContext {
        period_start,
        period_end,
        display_name: display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        entry_count: entries.len(),
        average_word_count: average_word_count(entries),
        mood_distribution: mood_distribution(entries),
        mood_variance: mood_variance(entries),
        repeated_words: repeated_words(entries),
        category_depth: category_depth(entries),
        excerpts: excerpts(entries),
    }
}

impl MonthlyContext {
    /// Context text for the model, sections in a fixed order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let name = self.display_name.as_deref().unwrap_or("the writer");
        let _ = writeln!(
            out,
            "Journal of {name}, covering {} to {}.",
            self.period_start, self.period_end
        );
        let _ = writeln!(
            out,
            "Entries written: {}. Average length: {} words.",
            self.entry_count, self.average_word_count
        );
        if let Some(variance) = self.mood_variance {
            let _ = writeln!(out, "Mood variance: {variance:.2}");
        }

        if self.mood_distribution.is_empty() {
            out.push_str("Mood distribution: none recorded\n");
        } else {
            let moods = self
                .mood_distribution
                .iter()
                .take(RENDER_MOODS)
                .map(|m| format!("{} x{}", m.mood, m.count))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "Mood distribution: {moods}");
        }

        if !self.category_depth.is_empty() {
            out.push_str("Prompt categories by depth:\n");
            for row in &self.category_depth {
                let _ = writeln!(
                    out,
                    "- {}: {} entries, {} words on average",
                    row.category, row.count, row.average_word_count
                );
            }
        }

        if !self.repeated_words.is_empty() {
            let words = self
                .repeated_words
                .iter()
                .take(RENDER_WORDS)
                .map(|w| format!("{} ({})", w.word, w.count))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "Repeated words: {words}");
        }

        if !self.excerpts.is_empty() {
            out.push_str("Excerpts:\n");
            for excerpt in &self.excerpts {
                let _ = writeln!(out, "- [{}] \"{}\"", excerpt.date, excerpt.text);
            }
        }
        out
    }
}
