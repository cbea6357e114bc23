//! Ordered provider × model cascade.
//!
//! Providers are tried in priority order and, within a provider, models in
//! list order. Every pair gets one attempt. The first reply that passes
//! `parse_reply` wins. Failures are sorted by `classify`: a rejected
//! credential abandons the provider, everything else moves to the next model.

use serde::Serialize;

use crate::reflect::config::ReflectConfig;
use crate::reflect::parser::{ReflectionInsights, parse_reply};
use crate::reflect::prompt::ChatRequest;
use crate::reflect::providers::{
    ChatProvider, ProviderError, ProviderKind, build_http_client, build_provider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    NextModel,
    NextProvider,
}

/// 401/403 mean the credential is bad for every model; anything else is
/// assumed to be specific to the model.
pub fn classify(err: &ProviderError) -> AttemptOutcome {
    match err.status() {
        Some(401) | Some(403) => AttemptOutcome::NextProvider,
        _ => AttemptOutcome::NextModel,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptResult {
    Accepted,
    EmptyReply,
    InvalidReply,
    ModelUnavailable { status: u16 },
    CredentialsRejected { status: u16 },
    TimedOut,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(flatten)]
    pub result: AttemptResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainSuccess {
    pub provider: ProviderKind,
    pub model: String,
    pub insights: ReflectionInsights,
}

#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    pub success: Option<ChainSuccess>,
    pub attempts: Vec<AttemptRecord>,
}

/// A provider position in the chain. `client` is `None` when the provider
/// has no credential (or is disabled) and is skipped.
pub struct ProviderSlot {
    pub kind: ProviderKind,
    pub client: Option<Box<dyn ChatProvider>>,
}

pub struct ProviderChain {
    slots: Vec<ProviderSlot>,
}

impl ProviderChain {
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self { slots }
    }

    /// Build every provider client once, in priority order.
    pub fn from_config(cfg: &ReflectConfig) -> anyhow::Result<Self> {
        let http = build_http_client(cfg)?;
        let slots = ProviderKind::PRIORITY
            .into_iter()
            .map(|kind| ProviderSlot {
                kind,
                client: build_provider(kind, cfg, &http),
            })
            .collect();
        Ok(Self::new(slots))
    }

    pub fn configured_count(&self) -> usize {
        self.slots.iter().filter(|s| s.client.is_some()).count()
    }

    pub fn run(&self, request: &ChatRequest) -> ChainReport {
        let mut attempts = Vec::new();
        let success = self
            .slots
            .iter()
            .filter_map(|slot| match &slot.client {
                Some(client) => Some(client.as_ref()),
                None => {
                    tracing::debug!(provider = %slot.kind, "provider not configured, skipping");
                    None
                }
            })
            .find_map(|client| try_provider(client, request, &mut attempts));
        ChainReport { success, attempts }
    }
}

fn try_provider(
    client: &dyn ChatProvider,
    request: &ChatRequest,
    attempts: &mut Vec<AttemptRecord>,
) -> Option<ChainSuccess> {
    let provider = client.kind();
    for model in client.models() {
        tracing::debug!(%provider, %model, "requesting reflection");
        let record = |result: AttemptResult| AttemptRecord {
            provider,
            model: model.clone(),
            result,
        };

        match client.complete(model, request) {
            Ok(reply) => {
                let Some(text) = reply.text.filter(|t| !t.trim().is_empty()) else {
                    tracing::warn!(%provider, %model, "empty reply, trying next model");
                    attempts.push(record(AttemptResult::EmptyReply));
                    continue;
                };
                match parse_reply(&text) {
                    Some(insights) => {
                        tracing::info!(%provider, %model, "reflection accepted");
                        attempts.push(record(AttemptResult::Accepted));
                        return Some(ChainSuccess {
                            provider,
                            model: model.clone(),
                            insights,
                        });
                    }
                    None => {
                        tracing::warn!(%provider, %model, "reply missing required sections, trying next model");
                        attempts.push(record(AttemptResult::InvalidReply));
                    }
                }
            }
            Err(err) => match classify(&err) {
                AttemptOutcome::NextProvider => {
                    tracing::warn!(%provider, %model, error = %err, "credentials rejected, abandoning provider");
                    attempts.push(record(AttemptResult::CredentialsRejected {
                        status: err.status().unwrap_or_default(),
                    }));
                    return None;
                }
                AttemptOutcome::NextModel => {
                    let result = match err.status() {
                        Some(404) => AttemptResult::ModelUnavailable { status: 404 },
                        _ if err.is_timeout() => AttemptResult::TimedOut,
                        _ => AttemptResult::Failed {
                            reason: err.to_string(),
                        },
                    };
                    tracing::warn!(%provider, %model, error = %err, "attempt failed, trying next model");
                    attempts.push(record(result));
                }
            },
        }
    }
    None
}
