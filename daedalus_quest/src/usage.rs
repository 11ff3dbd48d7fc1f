//! Quest usage index.
//!
//! One linear pass over the model that records, per canonical quest token and per
//! canonical variable name, which functions touch it. Everything here is derived data:
//! rebuild it after every model change. Analysis results with and without the index
//! are identical; the index only saves rescanning every function per query.

use std::collections::{BTreeMap, BTreeSet};

use daedalus_data::{Action, Condition, DialogFunction, SemanticModel};
use log::debug;
use serde::Serialize;

use crate::identity::{canonical_quest_key, is_case_insensitive_match, quest_mis_variable_name};

/// Functions touching one topic through journal actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicUsage {
    /// Casing of the first occurrence, in function key order.
    pub display_name: String,
    pub creators: BTreeSet<String>,
    pub status_writers: BTreeSet<String>,
    pub entry_writers: BTreeSet<String>,
}

impl TopicUsage {
    pub fn functions(&self) -> impl Iterator<Item = &String> {
        self.creators
            .iter()
            .chain(&self.status_writers)
            .chain(&self.entry_writers)
    }
}

/// Readers and writers of one variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableUsage {
    /// Functions with any `SetVariable` action on the variable.
    pub writers: BTreeSet<String>,
    /// Functions with a variable condition on it.
    pub readers: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestUsageIndex {
    topics: BTreeMap<String, TopicUsage>,
    variables: BTreeMap<String, VariableUsage>,
    dialogs_by_function: BTreeMap<String, BTreeSet<String>>,
}

impl QuestUsageIndex {
    pub fn build(model: &SemanticModel) -> Self {
        let mut index = QuestUsageIndex::default();

        for (key, func) in &model.functions {
            for action in &func.actions {
                index.record_action(key, action);
            }
            for cond in &func.conditions {
                if let Condition::Variable { variable_name, .. } = cond
                    && !variable_name.is_empty()
                {
                    index.variable_entry(variable_name).readers.insert(key.clone());
                }
            }
        }

        for (dialog_key, dialog) in &model.dialogs {
            for func in [dialog.information_function(), dialog.condition_function()]
                .into_iter()
                .flatten()
            {
                if func.is_empty() {
                    continue;
                }
                index
                    .dialogs_by_function
                    .entry(canonical_quest_key(func))
                    .or_default()
                    .insert(dialog_key.clone());
            }
        }

        debug!(
            "quest usage index built: {} topics, {} variables, {} dialog-owned functions",
            index.topics.len(),
            index.variables.len(),
            index.dialogs_by_function.len()
        );
        index
    }

    fn record_action(&mut self, function_key: &str, action: &Action) {
        match action {
            Action::CreateTopic { topic, .. } if !topic.is_empty() => {
                self.topic_entry(topic).creators.insert(function_key.to_string());
            },
            Action::LogSetTopicStatus { topic, .. } if !topic.is_empty() => {
                self.topic_entry(topic).status_writers.insert(function_key.to_string());
            },
            Action::LogEntry { topic, .. } if !topic.is_empty() => {
                self.topic_entry(topic).entry_writers.insert(function_key.to_string());
            },
            Action::SetVariable { variable_name, .. } if !variable_name.is_empty() => {
                self.variable_entry(variable_name).writers.insert(function_key.to_string());
            },
            _ => {},
        }
    }

    fn topic_entry(&mut self, topic: &str) -> &mut TopicUsage {
        self.topics
            .entry(canonical_quest_key(topic))
            .or_insert_with(|| TopicUsage {
                display_name: topic.to_string(),
                ..TopicUsage::default()
            })
    }

    fn variable_entry(&mut self, name: &str) -> &mut VariableUsage {
        self.variables.entry(canonical_quest_key(name)).or_default()
    }

    pub fn topic(&self, token: &str) -> Option<&TopicUsage> {
        self.topics.get(&canonical_quest_key(token))
    }

    pub fn variable(&self, name: &str) -> Option<&VariableUsage> {
        self.variables.get(&canonical_quest_key(name))
    }

    /// Usage of the quest's derived `MIS_` variable.
    pub fn mis_usage(&self, token: &str) -> Option<&VariableUsage> {
        self.variable(&quest_mis_variable_name(token))
    }

    /// Functions writing a variable, empty when nothing writes it.
    pub fn variable_writers(&self, name: &str) -> BTreeSet<String> {
        self.variable(name).map(|usage| usage.writers.clone()).unwrap_or_default()
    }

    /// Every function touching the quest through its topic or its `MIS_` variable, sorted.
    pub fn functions_for_quest(&self, token: &str) -> BTreeSet<String> {
        let mut functions = BTreeSet::new();
        if let Some(topic) = self.topic(token) {
            functions.extend(topic.functions().cloned());
        }
        if let Some(mis) = self.mis_usage(token) {
            functions.extend(mis.writers.iter().cloned());
            functions.extend(mis.readers.iter().cloned());
        }
        functions
    }

    /// Dialogs whose information or condition function touches the quest.
    pub fn dialogs_for_quest(&self, token: &str) -> BTreeSet<String> {
        self.functions_for_quest(token)
            .iter()
            .filter_map(|func| self.dialogs_by_function.get(&canonical_quest_key(func)))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn dialogs_for_function(&self, function_name: &str) -> Option<&BTreeSet<String>> {
        self.dialogs_by_function.get(&canonical_quest_key(function_name))
    }

    /// Every topic any journal action touches, in first-seen casing.
    pub fn used_topics(&self) -> BTreeSet<String> {
        self.topics.values().map(|usage| usage.display_name.clone()).collect()
    }
}

/// Whether a function touches a quest: any journal action on the topic, or any read or
/// write of its `MIS_` variable. This is the unindexed twin of
/// [`QuestUsageIndex::functions_for_quest`].
pub(crate) fn touches_quest(func: &DialogFunction, token: &str, mis_name: &str) -> bool {
    let by_action = func.actions.iter().any(|action| {
        action.topic().is_some_and(|topic| is_case_insensitive_match(topic, token))
            || action
                .assigned_variable()
                .is_some_and(|var| is_case_insensitive_match(var, mis_name))
    });
    by_action
        || func.conditions.iter().any(|cond| match cond {
            Condition::Variable { variable_name, .. } => is_case_insensitive_match(variable_name, mis_name),
            _ => false,
        })
}

/// Functions touching a quest, from the index when given, otherwise by scanning the model.
///
/// Both paths yield the same keys in the same order.
pub(crate) fn quest_functions<'a>(
    model: &'a SemanticModel,
    token: &str,
    index: Option<&QuestUsageIndex>,
) -> Vec<(&'a String, &'a DialogFunction)> {
    if let Some(index) = index {
        return index
            .functions_for_quest(token)
            .iter()
            .filter_map(|name| model.functions.get_key_value(name))
            .collect();
    }
    let mis_name = quest_mis_variable_name(token);
    model
        .functions
        .iter()
        .filter(|(_, func)| touches_quest(func, token, &mis_name))
        .collect()
}
