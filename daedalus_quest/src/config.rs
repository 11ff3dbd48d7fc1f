//! Engine configuration.
//!
//! Everything here is optional. A missing or broken config file must never stop the
//! editor from working, so [`EngineConfig::load`] falls back to the defaults and logs why.
//!
//! ```toml
//! topic_filter = "missions_only"
//!
//! [graph]
//! hideInferredEdges = false
//! showExternalConditions = true
//!
//! [guardrails.shared-mis-dependencies]
//! blocking = true
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphOptions;
use crate::guardrails::GuardrailId;
use crate::identity::TopicFilterPolicy;

/// Override for one guardrail's default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailOverride {
    pub blocking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which topic constants are listed as quests.
    pub topic_filter: TopicFilterPolicy,
    /// Defaults for graph requests that do not pass their own options.
    pub graph: GraphOptions,
    /// Keyed by guardrail id, e.g. `failure-status-preservation`.
    pub guardrails: BTreeMap<String, GuardrailOverride>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown guardrail id '{0}' in engine config")]
    UnknownGuardrail(String),
}

impl EngineConfig {
    /// Parses a config document, rejecting unknown guardrail ids.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the TOML is malformed or names a guardrail that does not exist.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        if let Some(unknown) = config.guardrails.keys().find(|id| GuardrailId::parse(id).is_none()) {
            return Err(ConfigError::UnknownGuardrail(unknown.clone()));
        }
        Ok(config)
    }

    /// Loads the config from `path`, falling back to defaults on any error.
    ///
    /// # Logging
    /// - `info!` on successful load
    /// - `warn!` when the file cannot be read or parsed
    pub fn load(path: &Path) -> EngineConfig {
        match Self::try_load(path) {
            Ok(config) => {
                info!(
                    "engine config loaded from '{}' ({} guardrail overrides)",
                    path.display(),
                    config.guardrails.len()
                );
                config
            },
            Err(e) => {
                warn!(
                    "Could not load engine config from '{}': {e:#}. Using defaults.",
                    path.display()
                );
                EngineConfig::default()
            },
        }
    }

    /// Strict variant of [`EngineConfig::load`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn try_load(path: &Path) -> Result<EngineConfig> {
        let source =
            fs::read_to_string(path).with_context(|| format!("reading engine config from '{}'", path.display()))?;
        let config = Self::from_toml_str(&source)
            .with_context(|| format!("parsing engine config from '{}'", path.display()))?;
        Ok(config)
    }

    /// Configured override for a guardrail, if any.
    pub fn guardrail_override(&self, id: GuardrailId) -> Option<GuardrailOverride> {
        self.guardrails.get(id.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.topic_filter, TopicFilterPolicy::MissionsAndNotes);
        assert!(config.graph.show_external_conditions);
    }

    #[test]
    fn full_document_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            topic_filter = "missions_only"

            [graph]
            hideInferredEdges = true

            [guardrails.failure-status-preservation]
            blocking = false
            "#,
        )
        .unwrap();
        assert_eq!(config.topic_filter, TopicFilterPolicy::MissionsOnly);
        assert!(config.graph.hide_inferred_edges);
        assert!(config.graph.show_external_conditions);
        assert_eq!(
            config.guardrail_override(GuardrailId::FailureStatusPreservation),
            Some(GuardrailOverride { blocking: false })
        );
    }

    #[test]
    fn unknown_guardrail_is_rejected() {
        let err = EngineConfig::from_toml_str("[guardrails.no-such-check]\nblocking = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGuardrail(id) if id == "no-such-check"));
    }

    #[test]
    fn bad_policy_value_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("topic_filter = \"everything\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
