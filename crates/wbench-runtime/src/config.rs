//! Runtime configuration (spec §6 "Configuration keys").
//!
//! Grounded on `astrid-runtime::runtime::config::RuntimeConfig`'s
//! struct-with-`Default`-impl shape, trimmed to the keys this workbench
//! actually reads: model selection, credentials, the loop bound, the
//! title-generation model, and the global auto-approve default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default bound on LLM rounds per cell execution (spec §4.8 "bounded by
/// `maxLoops`", §5 budgets).
pub const DEFAULT_MAX_LOOPS: u32 = 30;

/// Runtime-wide settings, loaded once at startup and overridable per
/// document via [`AgentRecord::model`](wbench_core::AgentRecord::model).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// API key used for every provider request. Absence fails a cell
    /// execution before a runner is even built (spec §4.11 "fail fast...
    /// before instantiating a runner").
    pub api_key: Option<String>,
    /// Override base URL for an OpenAI-compatible endpoint.
    pub base_url: Option<String>,
    /// The model used when an agent carries no per-document override.
    pub default_model: String,
    /// Named model aliases a host UI can present for `select_model` (spec
    /// §6 command table).
    pub models: HashMap<String, String>,
    /// Model used for fire-and-forget title generation (spec §4.8 "first
    /// cell of a root agent"). `None` disables title generation entirely.
    pub title_generator_model: Option<String>,
    /// Global default for the approval gate's auto-approve toggle.
    pub auto_approve_enabled: bool,
    /// Upper bound on LLM rounds in one cell execution (spec §4.8, §5).
    pub max_loops: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: "gpt-4o-mini".to_string(),
            models: HashMap::new(),
            title_generator_model: None,
            auto_approve_enabled: false,
            max_loops: DEFAULT_MAX_LOOPS,
        }
    }
}

impl RuntimeConfig {
    /// Resolve the model an agent should run with: its own override, else
    /// the runtime default.
    #[must_use]
    pub fn model_for(&self, agent_override: Option<&str>) -> String {
        agent_override.map(str::to_string).unwrap_or_else(|| self.default_model.clone())
    }
}
