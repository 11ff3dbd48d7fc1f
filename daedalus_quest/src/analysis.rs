//! Quest lifecycle analysis and reference listing.
//!
//! A quest's state lives in two channels that modders use inconsistently: journal
//! status actions on the topic (`Log_SetTopicStatus`) and assignments to the quest's
//! `MIS_` variable. The analyzer accumulates both separately so it can report which
//! channel drives the lifecycle and whether they disagree.

use std::collections::{BTreeMap, BTreeSet};

use daedalus_data::{Action, AssignOp, Condition, DialogFunction, ScriptValue, SemanticModel};
use serde::{Deserialize, Serialize};

use crate::identity::{LifecycleState, TopicFilterPolicy, canonical_quest_key, is_case_insensitive_match, quest_mis_variable_name};
use crate::usage::{QuestUsageIndex, quest_functions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// At least one terminal state is reachable.
    Implemented,
    /// Started but never finished.
    Wip,
    NotStarted,
}

/// Which channel produced the quest's terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSource {
    None,
    Topic,
    Mis,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicMethod {
    /// Tracked through the `MIS_` variable.
    Explicit,
    /// Gated only by other conditions (knows-info chains, flags, items).
    Implicit,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestFilePaths {
    pub topic: Option<String>,
    pub variable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestAnalysis {
    pub status: QuestStatus,
    pub mis_variable_name: String,
    pub mis_variable_exists: bool,
    pub has_start: bool,
    pub has_success: bool,
    /// Also set by obsolete outcomes.
    pub has_failed: bool,
    pub has_obsolete: bool,
    pub lifecycle_source: LifecycleSource,
    pub has_lifecycle_conflict: bool,
    pub logic_method: LogicMethod,
    pub description: String,
    pub file_paths: QuestFilePaths,
}

/// Running totals while scanning the quest's functions.
#[derive(Default)]
struct LifecycleAccumulator {
    has_start: bool,
    topic_terminals: BTreeSet<LifecycleState>,
    mis_terminals: BTreeSet<LifecycleState>,
    mis_referenced: bool,
    gated_implicitly: bool,
}

impl LifecycleAccumulator {
    fn scan(&mut self, func: &DialogFunction, token: &str, mis_name: &str) {
        for action in &func.actions {
            match action {
                Action::CreateTopic { topic, .. } if is_case_insensitive_match(topic, token) => {
                    self.has_start = true;
                },
                Action::LogSetTopicStatus { topic, status } if is_case_insensitive_match(topic, token) => {
                    Self::record(status, &mut self.has_start, &mut self.topic_terminals);
                },
                Action::SetVariable {
                    variable_name,
                    operator,
                    value,
                } if is_case_insensitive_match(variable_name, mis_name) => {
                    self.mis_referenced = true;
                    if *operator == AssignOp::Assign {
                        Self::record(value, &mut self.has_start, &mut self.mis_terminals);
                    }
                },
                _ => {},
            }
        }

        for cond in &func.conditions {
            match cond {
                Condition::Variable { variable_name, .. } if is_case_insensitive_match(variable_name, mis_name) => {
                    self.mis_referenced = true;
                },
                _ => self.gated_implicitly = true,
            }
        }
    }

    fn record(value: &ScriptValue, has_start: &mut bool, terminals: &mut BTreeSet<LifecycleState>) {
        if value.is_blank() {
            return;
        }
        *has_start = true;
        let state = LifecycleState::normalize(value);
        if state.is_terminal() {
            terminals.insert(state);
        }
    }

    fn reached(&self, state: LifecycleState) -> bool {
        self.topic_terminals.contains(&state) || self.mis_terminals.contains(&state)
    }

    fn source(&self) -> LifecycleSource {
        match (self.topic_terminals.is_empty(), self.mis_terminals.is_empty()) {
            (true, true) => LifecycleSource::None,
            (false, true) => LifecycleSource::Topic,
            (true, false) => LifecycleSource::Mis,
            (false, false) => LifecycleSource::Mixed,
        }
    }

    fn has_conflict(&self) -> bool {
        !self.topic_terminals.is_empty()
            && !self.mis_terminals.is_empty()
            && self.topic_terminals.is_disjoint(&self.mis_terminals)
    }
}

/// Classify a quest's implementation status and state-tracking method.
///
/// Passing an index built from the same model only changes how the quest's functions are
/// found, never the result.
pub fn analyze_quest(model: &SemanticModel, token: &str, index: Option<&QuestUsageIndex>) -> QuestAnalysis {
    let mis_name = quest_mis_variable_name(token);
    let mut acc = LifecycleAccumulator::default();
    for (_, func) in quest_functions(model, token, index) {
        acc.scan(func, token, &mis_name);
    }

    let topic_constant = model.constant(token);
    let mis_variable = model.variable(&mis_name);

    let has_success = acc.reached(LifecycleState::Success);
    let has_obsolete = acc.reached(LifecycleState::Obsolete);
    let has_failed = acc.reached(LifecycleState::Failed) || has_obsolete;

    let status = if has_success || has_failed {
        QuestStatus::Implemented
    } else if acc.has_start {
        QuestStatus::Wip
    } else {
        QuestStatus::NotStarted
    };

    let logic_method = if mis_variable.is_some() || acc.mis_referenced {
        LogicMethod::Explicit
    } else if acc.gated_implicitly {
        LogicMethod::Implicit
    } else {
        LogicMethod::Unknown
    };

    QuestAnalysis {
        status,
        mis_variable_exists: mis_variable.is_some(),
        mis_variable_name: mis_name.clone(),
        has_start: acc.has_start,
        has_success,
        has_failed,
        has_obsolete,
        lifecycle_source: acc.source(),
        has_lifecycle_conflict: acc.has_conflict(),
        logic_method,
        description: topic_constant
            .and_then(|c| c.value.as_ref())
            .map(|value| strip_quotes(&value.to_string()).to_string())
            .unwrap_or_default(),
        file_paths: QuestFilePaths {
            topic: topic_constant.and_then(|c| c.file_path.clone()),
            variable: mis_variable.and_then(|v| v.file_path.clone()),
        },
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Create,
    Status,
    Entry,
    Assignment,
    Condition,
}

/// One place in the scripts that touches a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestReference {
    pub kind: ReferenceKind,
    pub function_name: String,
    pub dialog_name: Option<String>,
    pub npc_name: Option<String>,
    pub details: String,
}

/// List every action and condition touching a quest, grouped by function in key order.
pub fn get_quest_references(
    model: &SemanticModel,
    token: &str,
    index: Option<&QuestUsageIndex>,
) -> Vec<QuestReference> {
    if token.is_empty() {
        return Vec::new();
    }
    let mis_name = quest_mis_variable_name(token);
    let mut refs = Vec::new();

    for (key, func) in quest_functions(model, token, index) {
        let owner = model.information_owner(key);
        let reference = |kind, details: String| QuestReference {
            kind,
            function_name: key.clone(),
            dialog_name: owner.map(|(name, _)| name.clone()),
            npc_name: owner.and_then(|(_, dialog)| dialog.npc().map(str::to_string)),
            details,
        };

        for action in &func.actions {
            match action {
                Action::CreateTopic { topic, topic_type } if is_case_insensitive_match(topic, token) => {
                    let details = match topic_type {
                        Some(section) => format!("Created in {section}"),
                        None => "Created".to_string(),
                    };
                    refs.push(reference(ReferenceKind::Create, details));
                },
                Action::LogSetTopicStatus { topic, status } if is_case_insensitive_match(topic, token) => {
                    refs.push(reference(ReferenceKind::Status, format!("Set status to {status}")));
                },
                Action::LogEntry { topic, text } if is_case_insensitive_match(topic, token) => {
                    refs.push(reference(ReferenceKind::Entry, format!("Entry: \"{text}\"")));
                },
                Action::SetVariable {
                    variable_name,
                    operator,
                    value,
                } if is_case_insensitive_match(variable_name, &mis_name) => {
                    refs.push(reference(
                        ReferenceKind::Assignment,
                        format!("{variable_name} {} {value}", operator.as_str()),
                    ));
                },
                _ => {},
            }
        }

        for cond in &func.conditions {
            if let Condition::Variable {
                variable_name,
                operator,
                value,
                negated,
            } = cond
                && is_case_insensitive_match(variable_name, &mis_name)
            {
                let bang = if *negated { "!" } else { "" };
                let details = match (operator, value) {
                    (Some(op), Some(value)) => format!("Condition: {bang}{variable_name} {op} {value}"),
                    _ => format!("Condition: {bang}{variable_name}"),
                };
                refs.push(reference(ReferenceKind::Condition, details));
            }
        }
    }

    refs
}

/// Every topic any journal action touches, in the casing first seen.
pub fn get_used_quest_topics(model: &SemanticModel, index: Option<&QuestUsageIndex>) -> BTreeSet<String> {
    if let Some(index) = index {
        return index.used_topics();
    }
    let mut first_seen: BTreeMap<String, String> = BTreeMap::new();
    for func in model.functions.values() {
        for topic in func.actions.iter().filter_map(Action::topic) {
            if !topic.is_empty() {
                first_seen
                    .entry(canonical_quest_key(topic))
                    .or_insert_with(|| topic.to_string());
            }
        }
    }
    first_seen.into_values().collect()
}

/// Key of the dialog whose information function is `function_name`.
pub fn find_dialog_name_for_function(model: &SemanticModel, function_name: &str) -> Option<String> {
    model.information_owner(function_name).map(|(name, _)| name.clone())
}

/// Topic constants admitted as quests by the filter policy, sorted by name.
pub fn list_quest_topics(model: &SemanticModel, policy: TopicFilterPolicy) -> Vec<String> {
    model
        .constants
        .keys()
        .filter(|name| policy.is_quest_topic_constant(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_data::{CompareOp, Dialog, DialogProperties, GlobalSymbol};

    fn func(name: &str, actions: Vec<Action>, conditions: Vec<Condition>) -> DialogFunction {
        DialogFunction {
            actions,
            conditions,
            ..DialogFunction::new(name)
        }
    }

    fn status(topic: &str, value: &str) -> Action {
        Action::LogSetTopicStatus {
            topic: topic.into(),
            status: value.into(),
        }
    }

    fn mis_set(var: &str, value: &str) -> Action {
        Action::SetVariable {
            variable_name: var.into(),
            operator: AssignOp::Assign,
            value: value.into(),
        }
    }

    fn model_of(functions: Vec<DialogFunction>) -> SemanticModel {
        let mut model = SemanticModel::default();
        for f in functions {
            model.functions.insert(f.name.clone(), f);
        }
        model
    }

    #[test]
    fn untouched_quest_is_not_started() {
        let analysis = analyze_quest(&SemanticModel::default(), "TOPIC_Nothing", None);
        assert_eq!(analysis.status, QuestStatus::NotStarted);
        assert_eq!(analysis.lifecycle_source, LifecycleSource::None);
        assert_eq!(analysis.logic_method, LogicMethod::Unknown);
        assert_eq!(analysis.mis_variable_name, "MIS_Nothing");
    }

    #[test]
    fn running_only_quest_is_wip() {
        let model = model_of(vec![func("A", vec![status("TOPIC_Q", "LOG_RUNNING")], vec![])]);
        let analysis = analyze_quest(&model, "TOPIC_Q", None);
        assert_eq!(analysis.status, QuestStatus::Wip);
        assert!(analysis.has_start);
    }

    #[test]
    fn blank_status_does_not_start_quest() {
        let model = model_of(vec![func("A", vec![status("TOPIC_Q", " ")], vec![])]);
        assert!(!analyze_quest(&model, "TOPIC_Q", None).has_start);
    }

    #[test]
    fn obsolete_counts_as_failed() {
        let model = model_of(vec![func("A", vec![mis_set("MIS_Q", "LOG_OBSOLETE")], vec![])]);
        let analysis = analyze_quest(&model, "TOPIC_Q", None);
        assert!(analysis.has_obsolete && analysis.has_failed);
        assert_eq!(analysis.lifecycle_source, LifecycleSource::Mis);
        assert_eq!(analysis.logic_method, LogicMethod::Explicit);
    }

    #[test]
    fn disjoint_channels_flag_conflict() {
        let model = model_of(vec![
            func("A", vec![status("TOPIC_Q", "LOG_SUCCESS")], vec![]),
            func("B", vec![mis_set("mis_q", "3")], vec![]),
        ]);
        let analysis = analyze_quest(&model, "topic_q", None);
        assert_eq!(analysis.lifecycle_source, LifecycleSource::Mixed);
        assert!(analysis.has_lifecycle_conflict);
    }

    #[test]
    fn overlapping_channels_are_mixed_without_conflict() {
        let model = model_of(vec![
            func("A", vec![status("TOPIC_Q", "LOG_SUCCESS"), mis_set("MIS_Q", "LOG_SUCCESS")], vec![]),
            func("B", vec![mis_set("MIS_Q", "LOG_FAILED")], vec![]),
        ]);
        let analysis = analyze_quest(&model, "TOPIC_Q", None);
        assert_eq!(analysis.lifecycle_source, LifecycleSource::Mixed);
        assert!(!analysis.has_lifecycle_conflict);
    }

    #[test]
    fn non_mis_gate_makes_logic_implicit() {
        let model = model_of(vec![func(
            "A",
            vec![Action::CreateTopic {
                topic: "TOPIC_Q".into(),
                topic_type: None,
            }],
            vec![Condition::NpcKnowsInfo {
                npc: "other".into(),
                dialog_ref: "DIA_X".into(),
            }],
        )]);
        assert_eq!(analyze_quest(&model, "TOPIC_Q", None).logic_method, LogicMethod::Implicit);
    }

    #[test]
    fn description_and_paths_come_from_declarations() {
        let mut model = SemanticModel::default();
        model.constants.insert(
            "TOPIC_Q".into(),
            GlobalSymbol {
                name: "TOPIC_Q".into(),
                type_name: "string".into(),
                value: Some("\"The Dragon Hunt\"".into()),
                file_path: Some("Story/Log_Constants.d".into()),
            },
        );
        model.variables.insert(
            "MIS_Q".into(),
            GlobalSymbol {
                name: "MIS_Q".into(),
                type_name: "int".into(),
                value: None,
                file_path: Some("Story/Mission_Vars.d".into()),
            },
        );
        let analysis = analyze_quest(&model, "TOPIC_Q", None);
        assert_eq!(analysis.description, "The Dragon Hunt");
        assert!(analysis.mis_variable_exists);
        assert_eq!(analysis.file_paths.variable.as_deref(), Some("Story/Mission_Vars.d"));
        assert_eq!(analysis.logic_method, LogicMethod::Explicit);
    }

    #[test]
    fn references_carry_dialog_context() {
        let mut model = model_of(vec![func(
            "DIA_Q_Info",
            vec![Action::CreateTopic {
                topic: "TOPIC_Q".into(),
                topic_type: Some("LOG_MISSION".into()),
            }],
            vec![Condition::Variable {
                variable_name: "MIS_Q".into(),
                operator: Some(CompareOp::Eq),
                value: Some("LOG_RUNNING".into()),
                negated: false,
            }],
        )]);
        model.dialogs.insert(
            "DIA_Q".into(),
            Dialog {
                name: "DIA_Q".into(),
                properties: DialogProperties {
                    npc: Some("BAU_900_Onar".into()),
                    information: Some("DIA_Q_Info".into()),
                    ..DialogProperties::default()
                },
                ..Dialog::default()
            },
        );

        let refs = get_quest_references(&model, "TOPIC_Q", None);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ReferenceKind::Create);
        assert_eq!(refs[0].details, "Created in LOG_MISSION");
        assert_eq!(refs[0].npc_name.as_deref(), Some("BAU_900_Onar"));
        assert_eq!(refs[1].details, "Condition: MIS_Q == LOG_RUNNING");
        assert_eq!(find_dialog_name_for_function(&model, "dia_q_info").as_deref(), Some("DIA_Q"));
    }

    #[test]
    fn quest_topic_listing_follows_policy() {
        let mut model = SemanticModel::default();
        for name in ["TOPIC_Main", "Topic_Trader", "Other"] {
            model.constants.insert(name.into(), GlobalSymbol::default());
        }
        assert_eq!(list_quest_topics(&model, TopicFilterPolicy::MissionsOnly), vec!["TOPIC_Main"]);
        assert_eq!(
            list_quest_topics(&model, TopicFilterPolicy::MissionsAndNotes),
            vec!["TOPIC_Main", "Topic_Trader"]
        );
    }
}
