use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::reflect::providers::ProviderKind;
use crate::reflect::util::{env_non_empty, split_csv};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
        }
    }
}

/// Per-provider model overrides. An empty or absent list means "use the
/// built-in defaults".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub openrouter: Option<Vec<String>>,
    #[serde(default)]
    pub huggingface: Option<Vec<String>>,
    #[serde(default)]
    pub gemini: Option<Vec<String>>,
    #[serde(default)]
    pub openai: Option<Vec<String>>,
}

impl ModelsConfig {
    pub fn for_provider(&self, kind: ProviderKind) -> Option<&[String]> {
        let list = match kind {
            ProviderKind::OpenRouter => &self.openrouter,
            ProviderKind::HuggingFace => &self.huggingface,
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
        };
        list.as_deref()
    }

    fn slot_mut(&mut self, kind: ProviderKind) -> &mut Option<Vec<String>> {
        match kind {
            ProviderKind::OpenRouter => &mut self.openrouter,
            ProviderKind::HuggingFace => &mut self.huggingface,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::OpenAi => &mut self.openai,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl ProvidersConfig {
    pub fn is_disabled(&self, kind: ProviderKind) -> bool {
        self.disabled
            .iter()
            .any(|raw| ProviderKind::parse_alias(raw) == Some(kind))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReflectConfig {
    pub generation: GenerationConfig,
    pub http: HttpConfig,
    pub models: ModelsConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialReflectConfig {
    generation: Option<GenerationConfig>,
    http: Option<HttpConfig>,
    models: Option<ModelsConfig>,
    providers: Option<ProvidersConfig>,
}

fn env_or_f32(var: &str, fallback: f32) -> f32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn models_var(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenRouter => "REFLECT_OPENROUTER_MODELS",
        ProviderKind::HuggingFace => "REFLECT_HUGGINGFACE_MODELS",
        ProviderKind::Gemini => "REFLECT_GEMINI_MODELS",
        ProviderKind::OpenAi => "REFLECT_OPENAI_MODELS",
    }
}

pub fn validate(cfg: &ReflectConfig) -> Result<()> {
    let t = cfg.generation.temperature;
    if !(0.0..=2.0).contains(&t) {
        return Err(anyhow!("invalid temperature {t}: require 0.0 <= temperature <= 2.0"));
    }
    if cfg.generation.max_output_tokens < 256 {
        return Err(anyhow!(
            "invalid max output tokens: must be >= 256 to fit four sections"
        ));
    }
    if cfg.http.request_timeout_secs == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    for raw in &cfg.providers.disabled {
        if ProviderKind::parse_alias(raw).is_none() {
            return Err(anyhow!(
                "unknown provider `{raw}` in disabled list; use openrouter, huggingface, gemini, or openai"
            ));
        }
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(custom) = env_non_empty("REFLECT_CONFIG_PATH") {
        return Some(PathBuf::from(custom));
    }
    let home = dirs::home_dir()?;
    Some(home.join(".reflect").join("reflect.toml"))
}

fn merge_file_config(base: &mut ReflectConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse reflect config {}: {err}", path.display()))
}

fn merge_toml(base: &mut ReflectConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialReflectConfig = toml::from_str(raw)?;
    if let Some(generation) = parsed.generation {
        base.generation = generation;
    }
    if let Some(http) = parsed.http {
        base.http = http;
    }
    if let Some(models) = parsed.models {
        base.models = models;
    }
    if let Some(providers) = parsed.providers {
        base.providers = providers;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ReflectConfig) {
    cfg.generation.temperature = env_or_f32("REFLECT_TEMPERATURE", cfg.generation.temperature);
    cfg.generation.max_output_tokens =
        env_or_u32("REFLECT_MAX_OUTPUT_TOKENS", cfg.generation.max_output_tokens);
    cfg.http.request_timeout_secs =
        env_or_u64("REFLECT_REQUEST_TIMEOUT_SECS", cfg.http.request_timeout_secs);

    for kind in ProviderKind::PRIORITY {
        if let Some(raw) = env_non_empty(models_var(kind)) {
            let list = split_csv(&raw);
            if !list.is_empty() {
                *cfg.models.slot_mut(kind) = Some(list);
            }
        }
    }
    if let Some(raw) = env_non_empty("REFLECT_DISABLED_PROVIDERS") {
        cfg.providers.disabled = split_csv(&raw);
    }
}

pub fn load_config() -> Result<ReflectConfig> {
    let mut cfg = ReflectConfig::default();
    merge_file_config(&mut cfg)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ReflectConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.generation.max_output_tokens, 1400);
    }

    #[test]
    fn toml_sections_replace_defaults() {
        let mut cfg = ReflectConfig::default();
        merge_toml(
            &mut cfg,
            r#"
[generation]
temperature = 0.4
max_output_tokens = 2000

[models]
openrouter = ["a/free", "b/free"]

[providers]
disabled = ["hf"]
"#,
        )
        .expect("parse");
        assert!((cfg.generation.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(
            cfg.models.for_provider(ProviderKind::OpenRouter),
            Some(&["a/free".to_string(), "b/free".to_string()][..])
        );
        assert_eq!(cfg.models.for_provider(ProviderKind::Gemini), None);
        assert!(cfg.providers.is_disabled(ProviderKind::HuggingFace));
        assert!(!cfg.providers.is_disabled(ProviderKind::OpenAi));
        assert_eq!(cfg.http.request_timeout_secs, 60);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut cfg = ReflectConfig::default();
        cfg.generation.temperature = 3.5;
        assert!(validate(&cfg).is_err());

        let mut cfg = ReflectConfig::default();
        cfg.generation.max_output_tokens = 10;
        assert!(validate(&cfg).is_err());

        let mut cfg = ReflectConfig::default();
        cfg.http.request_timeout_secs = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = ReflectConfig::default();
        cfg.providers.disabled = vec!["anthropic".to_string()];
        assert!(validate(&cfg).is_err());
    }
}
