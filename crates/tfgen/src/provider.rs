//! Provider selection from `LLM_PROVIDER`

use std::sync::Arc;

use anyhow::{bail, Context};

use agent_core::LlmProvider;
use agent_runtime::{OllamaProvider, OpenAiProvider};

/// Build the provider named by `kind` (`ollama` or `openai`)
pub fn build_provider(kind: &str) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match kind.trim().to_ascii_lowercase().as_str() {
        "ollama" => Arc::new(OllamaProvider::from_env()),
        "openai" => Arc::new(
            OpenAiProvider::from_env().context("Cannot configure the OpenAI-compatible provider")?,
        ),
        other => bail!("Unknown LLM_PROVIDER '{}', expected 'ollama' or 'openai'", other),
    };
    Ok(provider)
}

/// Log whether the provider answers, and the models it offers
pub async fn announce(provider: &dyn LlmProvider) {
    let name = provider
        .info()
        .await
        .map(|info| info.name)
        .unwrap_or_else(|_| "provider".into());
    
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to {}", name);
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not available - generation will fail", name);
        }
    }
}
