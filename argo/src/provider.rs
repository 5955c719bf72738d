//! AI provider capability
//!
//! Per spec.md's Non-goals, no concrete provider client lives here — only
//! the minimal trait surface `ci_*` steps depend on. A real implementation
//! (HTTP client, streaming, retries against a specific vendor API) is out
//! of scope and left as a documented extension point (spec.md §9).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<AiMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    pub content: String,
}

/// Capability a `ci_ask`/`ci_analyze`/`ci_ask_series`/`ci_present` step
/// dispatches through. Implementations are expected to return a complete
/// response; streaming is not part of this contract.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, request: AiRequest) -> Result<AiResponse>;

    /// Whether this provider can actually answer requests. `ci_*` steps use
    /// this to skip straight to their non-AI fallback instead of dispatching
    /// and catching a `Provider` error.
    fn is_configured(&self) -> bool {
        true
    }
}

/// A provider stub useful for tests and for running workflows with no
/// `ci_*` steps configured. Calling it is itself a protocol error: the
/// daemon is expected to fail fast if a graph uses `ci_*` steps but no
/// provider was wired in.
pub struct UnconfiguredProvider;

#[async_trait]
impl AiProvider for UnconfiguredProvider {
    async fn complete(&self, _request: AiRequest) -> Result<AiResponse> {
        Err(crate::error::ArgoError::Provider(
            "no AI provider configured".to_string(),
        ))
    }

    fn is_configured(&self) -> bool {
        false
    }
}
