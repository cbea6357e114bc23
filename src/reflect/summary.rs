use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReflectError;
use crate::reflect::chain::{AttemptRecord, ProviderChain};
use crate::reflect::config::GenerationConfig;
use crate::reflect::crypto::Decryptor;
use crate::reflect::entries::{EntrySource, JournalEntry, load_entries};
use crate::reflect::fallback::fallback_insights;
use crate::reflect::features::{MonthlyContext, extract_context};
use crate::reflect::parser::ReflectionInsights;
use crate::reflect::prompt::build_request;
use crate::reflect::providers::ProviderKind;

pub const FALLBACK_MODEL: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryProvider {
    OpenRouter,
    HuggingFace,
    Gemini,
    OpenAi,
    Fallback,
}

impl From<ProviderKind> for SummaryProvider {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenRouter => SummaryProvider::OpenRouter,
            ProviderKind::HuggingFace => SummaryProvider::HuggingFace,
            ProviderKind::Gemini => SummaryProvider::Gemini,
            ProviderKind::OpenAi => SummaryProvider::OpenAi,
        }
    }
}

impl fmt::Display for SummaryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SummaryProvider::OpenRouter => "openrouter",
            SummaryProvider::HuggingFace => "huggingface",
            SummaryProvider::Gemini => "gemini",
            SummaryProvider::OpenAi => "openai",
            SummaryProvider::Fallback => "fallback",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub overview_text: String,
    pub observations: Vec<String>,
    pub theme_reflection: String,
    pub closing_question: String,
    pub provider: SummaryProvider,
    pub model: String,
}

impl SummaryResult {
    fn from_insights(
        ctx: &MonthlyContext,
        insights: ReflectionInsights,
        provider: SummaryProvider,
        model: String,
    ) -> Self {
        Self {
            period_start: ctx.period_start,
            period_end: ctx.period_end,
            overview_text: insights.overview_text,
            observations: insights.observations,
            theme_reflection: insights.theme_reflection,
            closing_question: insights.closing_question,
            provider,
            model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub user_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub display_name: Option<String>,
}

impl SummaryRequest {
    pub fn validate(&self) -> Result<(), ReflectError> {
        if self.user_id.trim().is_empty() {
            return Err(ReflectError::InvalidInput("user id cannot be empty".to_string()));
        }
        if self.period_start > self.period_end {
            return Err(ReflectError::InvalidPeriod {
                start: self.period_start,
                end: self.period_end,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub result: SummaryResult,
    pub context: MonthlyContext,
    pub attempts: Vec<AttemptRecord>,
}

/// Summarise already-loaded entries. Always returns a complete result:
/// the first valid provider reply, or the template fallback.
pub fn summarize_entries(
    entries: &[JournalEntry],
    request: &SummaryRequest,
    chain: &ProviderChain,
    generation: &GenerationConfig,
) -> SummaryOutcome {
    let context = extract_context(
        entries,
        request.period_start,
        request.period_end,
        request.display_name.as_deref(),
    );
    let chat = build_request(&context, generation.temperature, generation.max_output_tokens);
    let report = chain.run(&chat);

    let result = match report.success {
        Some(success) => SummaryResult::from_insights(
            &context,
            success.insights,
            success.provider.into(),
            success.model,
        ),
        None => {
            tracing::info!(
                attempts = report.attempts.len(),
                "no provider produced a valid reflection, using fallback"
            );
            SummaryResult::from_insights(
                &context,
                fallback_insights(context.entry_count, context.average_word_count),
                SummaryProvider::Fallback,
                FALLBACK_MODEL.to_string(),
            )
        }
    };

    SummaryOutcome {
        result,
        context,
        attempts: report.attempts,
    }
}

/// Full pipeline: fetch, decrypt, extract, cascade, fallback. Only an
/// invalid request or a failing entry store produces an error.
pub fn generate_monthly_summary(
    source: &dyn EntrySource,
    decryptor: &dyn Decryptor,
    chain: &ProviderChain,
    generation: &GenerationConfig,
    request: &SummaryRequest,
) -> Result<SummaryOutcome> {
    request.validate()?;
    let entries = load_entries(
        source,
        decryptor,
        &request.user_id,
        request.period_start,
        request.period_end,
    )?;
    tracing::debug!(user = %request.user_id, entries = entries.len(), "loaded journal entries");
    Ok(summarize_entries(&entries, request, chain, generation))
}
