//! Store (tenant) types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PLATFORM_SUFFIX: &str = ".myshopify.com";

/// A merchant's store, keyed by its platform domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Platform domain, e.g. `acme.myshopify.com`.
    pub domain: String,

    /// Display name used in prompts.
    pub name: String,

    /// Merchant-authored assistant settings.
    #[serde(default)]
    pub ai_config: AiConfig,

    /// Whether the store is active.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// The record created on first contact with an unknown domain.
    pub fn minimal(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let now = Utc::now();
        Self {
            name: display_name_for(&domain),
            domain,
            ai_config: AiConfig::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Derive a display name from a store domain.
pub fn display_name_for(domain: &str) -> String {
    domain
        .strip_suffix(PLATFORM_SUFFIX)
        .unwrap_or(domain)
        .to_string()
}

/// Free-form assistant configuration authored by the merchant.
///
/// Known keys are typed; anything else is kept verbatim so admin tooling can
/// round-trip fields this service does not interpret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    /// Tone of voice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<Personality>,

    /// Additional behaviour instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,

    /// Sales directives appended to the system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Assistant tone of voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Professional,
    Casual,
    #[default]
    Friendly,
}
