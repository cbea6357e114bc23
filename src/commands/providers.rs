use anyhow::Result;
use serde::Serialize;
use std::env;

use crate::commands::CommandReport;
use crate::reflect::config::{load_config, resolve_config_path};
use crate::reflect::paths::resolve_paths;
use crate::reflect::providers::{ProviderKind, resolve_api_key, resolve_base_url, resolve_models};

include!(concat!(env!("OUT_DIR"), "/reflect_env_allowlist.rs"));

#[derive(Debug, Serialize)]
struct ProviderStatus {
    provider: ProviderKind,
    priority: usize,
    configured: bool,
    disabled: bool,
    base_url: String,
    models: Vec<String>,
}

fn unknown_env_keys() -> Vec<String> {
    let mut unknown: Vec<String> = env::vars_os()
        .filter_map(|(key, _)| key.into_string().ok())
        .filter(|key| key.starts_with("REFLECT_"))
        .filter(|key| !GENERATED_REFLECT_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown
}

/// Show the cascade as it would run right now. Never prints key material.
pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("providers");

    let statuses: Vec<ProviderStatus> = ProviderKind::PRIORITY
        .into_iter()
        .enumerate()
        .map(|(idx, kind)| ProviderStatus {
            provider: kind,
            priority: idx + 1,
            configured: resolve_api_key(kind).is_some(),
            disabled: cfg.providers.is_disabled(kind),
            base_url: resolve_base_url(kind),
            models: resolve_models(kind, &cfg),
        })
        .collect();

    for status in &statuses {
        let state = match (status.disabled, status.configured) {
            (true, _) => "disabled",
            (false, true) => "active",
            (false, false) => "no api key",
        };
        report.detail(format!(
            "{}. {} [{state}] models={}",
            status.priority,
            status.provider,
            status.models.join(",")
        ));
    }

    let active = statuses
        .iter()
        .filter(|s| s.configured && !s.disabled)
        .count();
    if active == 0 {
        report.detail("no active providers; summaries will use the fallback template");
    }
    report.detail(format!(
        "generation temperature={} max_output_tokens={} timeout_secs={}",
        cfg.generation.temperature, cfg.generation.max_output_tokens, cfg.http.request_timeout_secs
    ));

    report.detail(format!("reflect_home={}", paths.reflect_home.display()));
    report.detail(format!("entries_file={}", paths.entries_file.display()));
    report.detail(format!("audit_log={}", paths.audit_log().display()));
    if let Some(config) = resolve_config_path() {
        let state = if config.exists() { "" } else { " (absent)" };
        report.detail(format!("config_file={}{state}", config.display()));
    }

    for key in unknown_env_keys() {
        report.issue(format!("unknown environment variable {key}"));
    }

    report.attach(&statuses)?;
    Ok(report)
}
