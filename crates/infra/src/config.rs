//! Configuration loading and representation.

use anyhow::{Context, bail};

use enrollhub_core::RegistryId;
use enrollhub_registry::IdentityPolicy;

pub const ENFORCE_UNIQUE_IDENTITIES_VAR: &str = "ENROLLHUB_ENFORCE_UNIQUE_IDENTITIES";
pub const REGISTRY_ID_VAR: &str = "ENROLLHUB_REGISTRY_ID";

/// Runtime configuration for a [`crate::RegistryService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Whether duplicate actor/resource identities are rejected on insertion.
    pub identity_policy: IdentityPolicy,
    /// Stream to rehydrate; a fresh id is generated when unset.
    pub registry_id: Option<RegistryId>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            identity_policy: IdentityPolicy::Unique,
            registry_id: None,
        }
    }
}

impl RegistryConfig {
    /// Load from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source (process env, a map in tests, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENFORCE_UNIQUE_IDENTITIES_VAR) {
            let enforce = parse_flag(&raw)
                .with_context(|| format!("invalid {ENFORCE_UNIQUE_IDENTITIES_VAR}"))?;
            config.identity_policy = if enforce {
                IdentityPolicy::Unique
            } else {
                IdentityPolicy::AllowDuplicates
            };
        }

        if let Some(raw) = lookup(REGISTRY_ID_VAR) {
            let id = raw
                .trim()
                .parse::<RegistryId>()
                .with_context(|| format!("invalid {REGISTRY_ID_VAR}"))?;
            config.registry_id = Some(id);
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("expected true/false, got '{other}'"),
    }
}
