//! Editing facade used by the quest editor.
//!
//! [`QuestEditingService`] ties the engine together under one [`EngineConfig`]: it lists
//! and analyzes quests, builds graphs with the configured defaults, and gates commands
//! through a guardrail preview before the caller writes anything to disk.

use std::collections::BTreeSet;

use daedalus_data::SemanticModel;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::analysis::{QuestAnalysis, analyze_quest, list_quest_topics};
use crate::command::{CommandContext, CommandResult, QuestCommand, execute_quest_command};
use crate::config::EngineConfig;
use crate::graph::{QuestGraph, build_quest_graph};
use crate::guardrails::{GuardrailPolicy, QuestGuardrailWarning, get_quest_guardrail_delta_warnings};
use crate::usage::QuestUsageIndex;

/// A guardrail warning with the policy that applies to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewWarning {
    #[serde(flatten)]
    pub warning: QuestGuardrailWarning,
    pub blocking: bool,
}

/// What applying a command would do, computed without touching the caller's model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPreview {
    pub result: CommandResult,
    /// Warnings the edit introduces, compared to the model before it.
    pub warnings: Vec<PreviewWarning>,
    /// Source files of the affected functions that exist in the model.
    pub affected_files: Vec<String>,
    /// False when the command failed or any warning blocks it.
    pub can_apply: bool,
}

impl CommandPreview {
    pub fn blocking_warnings(&self) -> impl Iterator<Item = &PreviewWarning> {
        self.warnings.iter().filter(|w| w.blocking)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestEditingService {
    config: EngineConfig,
}

impl QuestEditingService {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Quest topic constants admitted by the configured topic filter.
    pub fn list_quests(&self, model: &SemanticModel) -> Vec<String> {
        list_quest_topics(model, self.config.topic_filter)
    }

    /// Analyzes every listed quest from one shared usage index.
    pub fn analyze_all(&self, model: &SemanticModel) -> Vec<(String, QuestAnalysis)> {
        let index = QuestUsageIndex::build(model);
        self.list_quests(model)
            .into_iter()
            .map(|token| {
                let analysis = analyze_quest(model, &token, Some(&index));
                (token, analysis)
            })
            .collect()
    }

    /// Graph of one quest with the configured default options.
    pub fn quest_graph(&self, model: &SemanticModel, quest_name: &str) -> QuestGraph {
        build_quest_graph(model, quest_name, &self.config.graph)
    }

    /// Executes a command without any guardrail checks.
    ///
    /// # Errors
    /// Returns the executor's [`crate::command::CommandFailure`] when validation fails.
    pub fn run_command(&self, model: &SemanticModel, quest_name: &str, command: &QuestCommand) -> CommandResult {
        let context = CommandContext { quest_name, model };
        execute_quest_command(&context, command)
    }

    /// Executes a command and reports the guardrail warnings it would introduce.
    ///
    /// Nothing is applied; the caller decides whether to keep `result.updated_model`.
    pub fn preview_command(&self, model: &SemanticModel, quest_name: &str, command: &QuestCommand) -> CommandPreview {
        let result = self.run_command(model, quest_name, command);
        let (warnings, affected_files) = match &result {
            Ok(success) => (
                self.tagged_delta_warnings(model, &success.updated_model, quest_name),
                affected_files(model, &success.affected_function_names),
            ),
            Err(_) => (Vec::new(), Vec::new()),
        };

        let can_apply = result.is_ok() && !warnings.iter().any(|w| w.blocking);
        if can_apply {
            debug!(
                "preview of {} on '{quest_name}': {} warnings, {} files",
                command.name(),
                warnings.len(),
                affected_files.len()
            );
        } else if result.is_ok() {
            info!(
                "preview of {} on '{quest_name}' blocked by {}",
                command.name(),
                warnings
                    .iter()
                    .filter(|w| w.blocking)
                    .map(|w| w.warning.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        CommandPreview {
            result,
            warnings,
            affected_files,
            can_apply,
        }
    }

    fn tagged_delta_warnings(
        &self,
        before: &SemanticModel,
        after: &SemanticModel,
        quest_name: &str,
    ) -> Vec<PreviewWarning> {
        get_quest_guardrail_delta_warnings(before, after, quest_name)
            .into_iter()
            .map(|warning| PreviewWarning {
                blocking: GuardrailPolicy::for_id(warning.id, &self.config).blocking,
                warning,
            })
            .collect()
    }
}

fn affected_files(model: &SemanticModel, function_names: &[String]) -> Vec<String> {
    function_names
        .iter()
        .filter_map(|name| model.function(name).and_then(|func| func.file_path.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
