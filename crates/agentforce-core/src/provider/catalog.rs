//! Provider catalog
//!
//! Default endpoint, API key variable, and model per provider, loaded from
//! embedded JSON at compile time.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Embedded JSON data
const PROVIDERS_JSON: &str = include_str!("providers.json");

/// Model information
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub context: usize,
}

/// Provider information
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub api_key_env: Option<String>,
    #[serde(rename = "model")]
    pub default_model: Model,
}

#[derive(Deserialize, Default)]
struct RawCatalog {
    providers: HashMap<String, Provider>,
}

static CATALOG: LazyLock<HashMap<String, Provider>> = LazyLock::new(|| {
    let raw: RawCatalog = serde_json::from_str(PROVIDERS_JSON).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Embedded provider catalog is invalid");
        RawCatalog::default()
    });

    raw.providers
        .into_iter()
        .map(|(id, mut provider)| {
            provider.id = id.clone();
            (id, provider)
        })
        .collect()
});

/// Get a provider by ID
pub fn get(provider_id: &str) -> Option<&'static Provider> {
    CATALOG.get(provider_id)
}

/// Get all provider IDs
pub fn ids() -> impl Iterator<Item = &'static str> {
    CATALOG.keys().map(|s| s.as_str())
}

/// Get base URL for a provider
pub fn base_url(provider_id: &str) -> Option<&'static str> {
    get(provider_id).map(|p| p.base_url.as_str())
}

/// Get API key environment variable for a provider
pub fn api_key_env(provider_id: &str) -> Option<&'static str> {
    get(provider_id).and_then(|p| p.api_key_env.as_deref())
}

/// Get default model ID for a provider
pub fn default_model(provider_id: &str) -> Option<&'static str> {
    get(provider_id).map(|p| p.default_model.id.as_str())
}

/// Get context window for a provider's default model
pub fn context_window(provider_id: &str) -> Option<usize> {
    get(provider_id).map(|p| p.default_model.context)
}
