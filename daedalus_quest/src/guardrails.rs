//! Guardrails: heuristic warnings about quest edits that risk breaking failure handling
//! or coupling a quest to state owned by another one.
//!
//! [`analyze_quest_guardrails`] inspects one model. [`get_quest_guardrail_delta_warnings`]
//! diffs two versions of a model and is what the editor consults before writing an edit.
//! Only the failure-path warnings block an edit by default; see [`GuardrailPolicy`].

use std::collections::BTreeSet;

use daedalus_data::{Action, AssignOp, Condition, DialogFunction, SemanticModel};
use log::warn;
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::config::EngineConfig;
use crate::identity::{
    LifecycleState, canonical_quest_key, is_case_insensitive_match, is_mis_variable, quest_mis_variable_name,
};
use crate::usage::quest_functions;

/// Names shown in a warning message before it is cut off with `...`.
const MESSAGE_NAME_LIMIT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "kebab-case")]
pub enum GuardrailId {
    MultiTopicSideEffects,
    SharedMisDependencies,
    FailureStatusPreservation,
    FailureStatusRegression,
}

impl GuardrailId {
    pub const ALL: [GuardrailId; 4] = [
        GuardrailId::MultiTopicSideEffects,
        GuardrailId::SharedMisDependencies,
        GuardrailId::FailureStatusPreservation,
        GuardrailId::FailureStatusRegression,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GuardrailId::MultiTopicSideEffects => "multi-topic-side-effects",
            GuardrailId::SharedMisDependencies => "shared-mis-dependencies",
            GuardrailId::FailureStatusPreservation => "failure-status-preservation",
            GuardrailId::FailureStatusRegression => "failure-status-regression",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == id)
    }
}

/// What a warning was raised about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailProvenance {
    pub function_names: Vec<String>,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestGuardrailWarning {
    pub id: GuardrailId,
    pub message: String,
    pub provenance: GuardrailProvenance,
}

impl QuestGuardrailWarning {
    /// Identity used when diffing warning lists: the id plus its provenance.
    pub fn signature(&self) -> String {
        format!(
            "{}:{}:{}",
            self.id.as_str(),
            self.provenance.function_names.join("|"),
            self.provenance.variables.join("|")
        )
    }
}

/// Whether a warning stops an edit from being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    pub blocking: bool,
}

const DEFAULT_POLICIES: [(GuardrailId, GuardrailPolicy); 4] = [
    (GuardrailId::MultiTopicSideEffects, GuardrailPolicy { blocking: false }),
    (GuardrailId::SharedMisDependencies, GuardrailPolicy { blocking: false }),
    (GuardrailId::FailureStatusPreservation, GuardrailPolicy { blocking: true }),
    (GuardrailId::FailureStatusRegression, GuardrailPolicy { blocking: true }),
];

impl GuardrailPolicy {
    pub fn default_for(id: GuardrailId) -> Self {
        DEFAULT_POLICIES
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map_or(GuardrailPolicy { blocking: false }, |(_, policy)| *policy)
    }

    /// Default policy for `id`, unless the config overrides it.
    pub fn for_id(id: GuardrailId, config: &EngineConfig) -> Self {
        config
            .guardrail_override(id)
            .map_or_else(|| Self::default_for(id), |o| GuardrailPolicy { blocking: o.blocking })
    }
}

/// Checks every function touching the quest for risky patterns.
///
/// Warnings come out in a fixed order (multi-topic, shared state, failure paths) with
/// sorted provenance, so two runs over equal models compare equal.
pub fn analyze_quest_guardrails(model: &SemanticModel, token: &str) -> Vec<QuestGuardrailWarning> {
    if token.trim().is_empty() {
        return Vec::new();
    }
    let mis_name = quest_mis_variable_name(token);

    let mut multi_topic = BTreeSet::new();
    let mut shared_functions = BTreeSet::new();
    let mut shared_variables = BTreeSet::new();
    let mut failure_paths = BTreeSet::new();

    for (key, func) in quest_functions(model, token, None) {
        let topics: BTreeSet<String> = func
            .actions
            .iter()
            .filter_map(Action::topic)
            .filter(|topic| !topic.trim().is_empty())
            .map(canonical_quest_key)
            .collect();
        if topics.len() > 1 {
            multi_topic.insert(key.clone());
        }
        if writes_failure(func, token, &mis_name) {
            failure_paths.insert(key.clone());
        }
        for cond in &func.conditions {
            if let Condition::Variable { variable_name, .. } = cond
                && is_mis_variable(variable_name)
                && !is_case_insensitive_match(variable_name, &mis_name)
            {
                shared_variables.insert(variable_name.clone());
                shared_functions.insert(key.clone());
            }
        }
    }

    let mut warnings = Vec::new();
    if !multi_topic.is_empty() {
        let function_names: Vec<String> = multi_topic.into_iter().collect();
        warnings.push(QuestGuardrailWarning {
            id: GuardrailId::MultiTopicSideEffects,
            message: format!(
                "Quest logic shares functions with other topics: {}.",
                summarize(&function_names)
            ),
            provenance: GuardrailProvenance {
                function_names,
                variables: Vec::new(),
            },
        });
    }
    if !shared_variables.is_empty() {
        let variables: Vec<String> = shared_variables.into_iter().collect();
        warnings.push(QuestGuardrailWarning {
            id: GuardrailId::SharedMisDependencies,
            message: format!(
                "Quest branches depend on shared state variables: {}.",
                summarize(&variables)
            ),
            provenance: GuardrailProvenance {
                function_names: shared_functions.into_iter().collect(),
                variables,
            },
        });
    }
    if !failure_paths.is_empty() {
        warnings.push(QuestGuardrailWarning {
            id: GuardrailId::FailureStatusPreservation,
            message: "Quest contains LOG_FAILED/LOG_OBSOLETE status paths. Preserve these paths during edits."
                .to_string(),
            provenance: GuardrailProvenance {
                function_names: failure_paths.into_iter().collect(),
                variables: Vec::new(),
            },
        });
    }
    warnings
}

/// Warnings in `after` whose signature does not occur in `before`.
pub fn get_new_quest_guardrail_warnings(
    before: &[QuestGuardrailWarning],
    after: &[QuestGuardrailWarning],
) -> Vec<QuestGuardrailWarning> {
    let known: BTreeSet<String> = before.iter().map(QuestGuardrailWarning::signature).collect();
    after
        .iter()
        .filter(|warning| !known.contains(&warning.signature()))
        .cloned()
        .collect()
}

/// Warnings an edit from `before` to `after` introduces, plus a regression warning when
/// the edit loses failure paths.
///
/// Moving a failure write from one function to another is not a regression; only a
/// shrinking set of failure-writing functions is.
pub fn get_quest_guardrail_delta_warnings(
    before: &SemanticModel,
    after: &SemanticModel,
    token: &str,
) -> Vec<QuestGuardrailWarning> {
    let previous = analyze_quest_guardrails(before, token);
    let current = analyze_quest_guardrails(after, token);
    let had_preservation = previous.iter().any(|w| w.id.is_failure_status_preservation());

    let mut warnings: Vec<QuestGuardrailWarning> = get_new_quest_guardrail_warnings(&previous, &current)
        .into_iter()
        .filter(|w| !(had_preservation && w.id.is_failure_status_preservation()))
        .collect();

    let old_paths = failure_functions(before, token);
    let new_paths = failure_functions(after, token);
    let removed: Vec<String> = old_paths.difference(&new_paths).cloned().collect();
    if !removed.is_empty() && new_paths.len() < old_paths.len() {
        warn!(
            "edit to quest '{token}' removes failure paths in {}",
            removed.join(", ")
        );
        warnings.push(QuestGuardrailWarning {
            id: GuardrailId::FailureStatusRegression,
            message: "Quest edits removed LOG_FAILED/LOG_OBSOLETE status paths. Preserve non-happy-path outcomes."
                .to_string(),
            provenance: GuardrailProvenance {
                function_names: removed,
                variables: Vec::new(),
            },
        });
    }
    warnings
}

/// Functions writing a failed or obsolete state for the quest, through either channel.
fn failure_functions(model: &SemanticModel, token: &str) -> BTreeSet<String> {
    let mis_name = quest_mis_variable_name(token);
    quest_functions(model, token, None)
        .into_iter()
        .filter(|(_, func)| writes_failure(func, token, &mis_name))
        .map(|(key, _)| key.clone())
        .collect()
}

fn writes_failure(func: &DialogFunction, token: &str, mis_name: &str) -> bool {
    func.actions.iter().any(|action| match action {
        Action::LogSetTopicStatus { topic, status } => {
            is_case_insensitive_match(topic, token) && LifecycleState::normalize(status).is_failure()
        },
        Action::SetVariable {
            variable_name,
            operator: AssignOp::Assign,
            value,
        } => is_case_insensitive_match(variable_name, mis_name) && LifecycleState::normalize(value).is_failure(),
        _ => false,
    })
}

fn summarize(names: &[String]) -> String {
    let shown = names
        .iter()
        .take(MESSAGE_NAME_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > MESSAGE_NAME_LIMIT {
        format!("{shown}...")
    } else {
        shown
    }
}
