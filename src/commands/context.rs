use anyhow::Result;
use serde::Serialize;

use crate::commands::{CommandReport, PeriodOptions, entry_store, resolve_period};
use crate::reflect::crypto::decryptor_from_env;
use crate::reflect::entries::load_entries;
use crate::reflect::features::{MonthlyContext, extract_context};
use crate::reflect::paths::resolve_paths;
use crate::reflect::summary::SummaryRequest;

#[derive(Debug, Serialize)]
struct ContextPreview<'a> {
    rendered: String,
    #[serde(flatten)]
    context: &'a MonthlyContext,
}

/// Dry run: build the prompt context without contacting any provider.
pub fn run(opts: &PeriodOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("context");
    let (period_start, period_end) = match resolve_period(opts) {
        Ok(bounds) => bounds,
        Err(err) => {
            report.issue(err.to_string());
            return Ok(report);
        }
    };
    let request = SummaryRequest {
        user_id: opts.user_id.clone(),
        period_start,
        period_end,
        display_name: opts.display_name.clone(),
    };
    if let Err(err) = request.validate() {
        report.issue(err.to_string());
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let store = entry_store(&paths, opts);
    let decryptor = decryptor_from_env()?;
    let entries = load_entries(
        &store,
        decryptor.as_ref(),
        &request.user_id,
        period_start,
        period_end,
    )?;
    let context = extract_context(
        &entries,
        period_start,
        period_end,
        request.display_name.as_deref(),
    );
    let rendered = context.render();

    report.detail(format!("entries_file={}", store.path().display()));
    report.detail(format!("entries={}", context.entry_count));
    report.detail(format!("average_words={}", context.average_word_count));
    for line in rendered.lines() {
        report.detail(line.to_string());
    }
    report.attach(&ContextPreview {
        rendered,
        context: &context,
    })?;
    Ok(report)
}
