use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, PeriodOptions, entry_store, resolve_period};
use crate::reflect::audit;
use crate::reflect::chain::{AttemptResult, ProviderChain};
use crate::reflect::config::load_config;
use crate::reflect::crypto::decryptor_from_env;
use crate::reflect::paths::resolve_paths;
use crate::reflect::summary::{SummaryRequest, generate_monthly_summary};

#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    pub period: PeriodOptions,
    pub out: Option<PathBuf>,
}

pub fn run(opts: &SummaryOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("summary");
    let (period_start, period_end) = match resolve_period(&opts.period) {
        Ok(bounds) => bounds,
        Err(err) => {
            report.issue(err.to_string());
            return Ok(report);
        }
    };

    let request = SummaryRequest {
        user_id: opts.period.user_id.clone(),
        period_start,
        period_end,
        display_name: opts.period.display_name.clone(),
    };
    if let Err(err) = request.validate() {
        report.issue(err.to_string());
        return Ok(report);
    }

    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let store = entry_store(&paths, &opts.period);
    let decryptor = decryptor_from_env()?;
    let chain = ProviderChain::from_config(&cfg)?;
    tracing::info!(
        user = %request.user_id,
        start = %period_start,
        end = %period_end,
        providers = chain.configured_count(),
        "generating monthly summary"
    );

    let outcome = generate_monthly_summary(
        &store,
        decryptor.as_ref(),
        &chain,
        &cfg.generation,
        &request,
    )?;
    let result = &outcome.result;

    report.detail(format!("period={}..{}", result.period_start, result.period_end));
    report.detail(format!("entries={}", outcome.context.entry_count));
    report.detail(format!("provider={}", result.provider));
    report.detail(format!("model={}", result.model));
    report.detail(format!("attempts={}", outcome.attempts.len()));
    for attempt in &outcome.attempts {
        report.detail(format!(
            "attempt {}/{}: {}",
            attempt.provider,
            attempt.model,
            describe(&attempt.result)
        ));
    }
    report.detail(format!("overview: {}", result.overview_text));
    for observation in &result.observations {
        report.detail(format!("observation: {observation}"));
    }
    report.detail(format!("theme: {}", result.theme_reflection));
    report.detail(format!("question: {}", result.closing_question));

    if let Some(out) = &opts.out {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(result)?;
        fs::write(out, format!("{body}\n"))
            .with_context(|| format!("failed to write {}", out.display()))?;
        report.detail(format!("written={}", out.display()));
    }

    let message = format!(
        "user={} period={}..{} entries={} provider={} model={} attempts={}",
        request.user_id,
        result.period_start,
        result.period_end,
        outcome.context.entry_count,
        result.provider,
        result.model,
        outcome.attempts.len()
    );
    if let Err(err) = audit::append_event(&paths, "summary", "ok", &message) {
        tracing::warn!(error = %err, "failed to append audit event");
    }

    report.attach(result)?;
    Ok(report)
}

fn describe(result: &AttemptResult) -> String {
    match result {
        AttemptResult::Accepted => "accepted".to_string(),
        AttemptResult::EmptyReply => "empty reply".to_string(),
        AttemptResult::InvalidReply => "reply missing required sections".to_string(),
        AttemptResult::ModelUnavailable { status } => format!("model unavailable ({status})"),
        AttemptResult::CredentialsRejected { status } => {
            format!("credentials rejected ({status}), provider skipped")
        }
        AttemptResult::TimedOut => "timed out".to_string(),
        AttemptResult::Failed { reason } => format!("failed: {reason}"),
    }
}
