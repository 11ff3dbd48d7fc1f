//! Graph membership: which functions belong to a quest's graph and what role each plays.

use std::collections::{BTreeMap, BTreeSet};

use daedalus_data::{Action, AssignOp, CompareOp, Condition, DialogFunction, ScriptValue, SemanticModel};

use super::{EdgeExpression, NodeKind, NodeStep};
use crate::identity::{
    LifecycleState, canonical_quest_key, is_case_insensitive_match, is_mis_variable, lifecycle_value_key,
};
use crate::usage::touches_quest;

pub(super) struct Member {
    pub kind: NodeKind,
    pub step: NodeStep,
    pub description: String,
    pub touches: bool,
}

/// Graph members keyed by function key, resolvable case-insensitively.
#[derive(Default)]
pub(super) struct Members {
    entries: BTreeMap<String, Member>,
    by_canonical: BTreeMap<String, String>,
}

impl Members {
    fn insert(&mut self, key: &str, member: Member) {
        self.by_canonical
            .entry(canonical_quest_key(key))
            .or_insert_with(|| key.to_string());
        self.entries.insert(key.to_string(), member);
    }

    /// Stored key of the member named `name`, if any.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.entries.get_key_value(name) {
            return Some(key.as_str());
        }
        self.by_canonical.get(&canonical_quest_key(name)).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Member> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Member)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> BTreeMap<String, Member> {
        self.entries
    }
}

/// A variable condition reduced to the parts edge inference needs.
pub(super) struct VarCheck<'a> {
    pub variable: &'a str,
    operator: Option<CompareOp>,
    value: Option<&'a ScriptValue>,
    negated: bool,
}

impl<'a> VarCheck<'a> {
    /// `None` for conditions without a variable, or with an operator but no operand.
    pub fn from_condition(cond: &'a Condition) -> Option<Self> {
        let Condition::Variable {
            variable_name,
            operator,
            value,
            negated,
        } = cond
        else {
            return None;
        };
        if variable_name.trim().is_empty() || operator.is_some() != value.is_some() {
            return None;
        }
        Some(Self {
            variable: variable_name,
            operator: *operator,
            value: value.as_ref(),
            negated: *negated,
        })
    }

    fn value_key(&self, value: &ScriptValue) -> String {
        if is_mis_variable(self.variable) {
            lifecycle_value_key(value)
        } else {
            value.to_string().trim().to_string()
        }
    }

    /// Whether assigning `produced` to the variable makes this condition hold.
    pub fn is_satisfied_by(&self, produced: &ScriptValue) -> bool {
        let produced = self.value_key(produced);
        let holds = match (self.operator, self.value) {
            (Some(op), Some(expected)) => compare(op, &produced, &self.value_key(expected)),
            _ => is_truthy(&produced),
        };
        holds != self.negated
    }

    /// `MIS_X == LOG_RUNNING`, or `flag` / `!flag` for bare checks.
    pub fn label(&self) -> String {
        let bang = if self.negated { "!" } else { "" };
        match (self.operator, self.value) {
            (Some(op), Some(value)) => format!("{bang}{} {op} {value}", self.variable),
            _ => format!("{bang}{}", self.variable),
        }
    }

    /// Part of external node ids identifying which value is awaited.
    pub fn id_fragment(&self) -> String {
        let key = self.value.map_or_else(|| "set".to_string(), |value| self.value_key(value));
        if self.negated { format!("not-{key}") } else { key }
    }

    /// Only discrete `==`/`!=` checks have a single producer value an editor can rewrite.
    pub fn is_editable(&self) -> bool {
        !self.negated && self.operator.is_some_and(CompareOp::is_discrete)
    }

    pub fn expression(&self) -> Option<EdgeExpression> {
        match (self.operator, self.value) {
            (Some(operator), Some(value)) if !self.negated => Some(EdgeExpression {
                variable: self.variable.to_string(),
                operator,
                value: value.to_string(),
            }),
            _ => None,
        }
    }
}

fn compare(op: CompareOp, produced: &str, expected: &str) -> bool {
    if let (Ok(lhs), Ok(rhs)) = (produced.parse::<f64>(), expected.parse::<f64>()) {
        return op.evaluate(lhs, rhs);
    }
    let equal = canonical_quest_key(produced) == canonical_quest_key(expected);
    match op {
        CompareOp::Eq => equal,
        CompareOp::Ne => !equal,
        _ => false,
    }
}

/// Daedalus truthiness: zero and `FALSE` are false, any other value counts as set.
fn is_truthy(value: &str) -> bool {
    match value.parse::<f64>() {
        Ok(n) => n != 0.0,
        Err(_) => !value.eq_ignore_ascii_case("false") && !value.is_empty(),
    }
}

pub(super) struct Producer {
    pub function: String,
    pub value: ScriptValue,
}

/// Every function assigning a value to a variable, across the whole model.
///
/// Journal actions on the selected topic also count as producers of its `MIS_` variable,
/// since scripts commonly gate on `MIS_X == LOG_RUNNING` while only calling
/// `Log_SetTopicStatus`.
pub(super) struct ProducerIndex {
    by_variable: BTreeMap<String, Vec<Producer>>,
    /// Casing of the first assignment seen, in function key order.
    display_names: BTreeMap<String, String>,
}

impl ProducerIndex {
    pub fn build(model: &SemanticModel, token: &str, mis_name: &str) -> Self {
        let mut index = Self {
            by_variable: BTreeMap::new(),
            display_names: BTreeMap::new(),
        };
        for (key, func) in &model.functions {
            for action in &func.actions {
                match action {
                    Action::SetVariable {
                        variable_name,
                        operator: AssignOp::Assign,
                        value,
                    } if !variable_name.trim().is_empty() => index.add(variable_name, key, value),
                    Action::CreateTopic { topic, .. } if is_case_insensitive_match(topic, token) => {
                        index.add(mis_name, key, &ScriptValue::Int(1));
                    },
                    Action::LogSetTopicStatus { topic, status }
                        if is_case_insensitive_match(topic, token) && !status.is_blank() =>
                    {
                        index.add(mis_name, key, status);
                    },
                    _ => {},
                }
            }
        }
        index
    }

    fn add(&mut self, variable: &str, function: &str, value: &ScriptValue) {
        let canonical = canonical_quest_key(variable);
        self.display_names
            .entry(canonical.clone())
            .or_insert_with(|| variable.to_string());
        let producers = self.by_variable.entry(canonical).or_default();
        let duplicate = producers
            .iter()
            .any(|p| p.function == function && lifecycle_value_key(&p.value) == lifecycle_value_key(value));
        if !duplicate {
            producers.push(Producer {
                function: function.to_string(),
                value: value.clone(),
            });
        }
    }

    /// One spelling per variable, so differently cased checks share edge ids.
    pub fn display_name<'a>(&'a self, variable: &'a str) -> &'a str {
        self.display_names
            .get(&canonical_quest_key(variable))
            .map_or(variable, String::as_str)
    }

    /// Producers whose assigned value satisfies `check`, in function key order.
    pub fn satisfying<'a>(&'a self, check: &'a VarCheck<'_>) -> impl Iterator<Item = &'a Producer> {
        self.by_variable
            .get(&canonical_quest_key(check.variable))
            .into_iter()
            .flatten()
            .filter(move |producer| check.is_satisfied_by(&producer.value))
    }
}

/// Information function of the dialog a knows-info condition names.
pub(super) fn resolve_knows_producer<'m>(model: &'m SemanticModel, dialog_ref: &str) -> Option<&'m str> {
    model.dialog(dialog_ref)?.information_function()
}

/// Quest functions, plus everything reachable from them through knows-info chains when
/// `follow_knows` is set.
pub(super) fn collect_members(model: &SemanticModel, token: &str, mis_name: &str, follow_knows: bool) -> Members {
    let mut members = Members::default();
    for (key, func) in &model.functions {
        if touches_quest(func, token, mis_name) {
            members.insert(key, classify(func, token, mis_name));
        }
    }
    if !follow_knows {
        return members;
    }

    // Dialogs that only require knowing an earlier quest dialog still belong to the flow.
    loop {
        let followers: Vec<&String> = model
            .functions
            .iter()
            .filter(|(key, func)| members.resolve(key).is_none() && follows_member(model, func, &members))
            .map(|(key, _)| key)
            .collect();
        if followers.is_empty() {
            break;
        }
        for key in followers {
            members.insert(
                key,
                Member {
                    kind: NodeKind::Condition,
                    step: NodeStep::Check,
                    description: "Follows a known dialog".to_string(),
                    touches: false,
                },
            );
        }
    }
    members
}

fn follows_member(model: &SemanticModel, func: &DialogFunction, members: &Members) -> bool {
    func.conditions.iter().any(|cond| match cond {
        Condition::NpcKnowsInfo { dialog_ref, .. } => {
            resolve_knows_producer(model, dialog_ref).is_some_and(|producer| members.resolve(producer).is_some())
        },
        _ => false,
    })
}

/// Adds functions that produce a variable some member checks. Producers found this way
/// do not pull in their own producers.
pub(super) fn pull_in_indirect_producers(model: &SemanticModel, producers: &ProducerIndex, members: &mut Members) {
    let mut found = BTreeSet::new();
    for (key, _) in members.iter() {
        let Some(func) = model.functions.get(key) else {
            continue;
        };
        for check in func.conditions.iter().filter_map(VarCheck::from_condition) {
            for producer in producers.satisfying(&check) {
                if members.resolve(&producer.function).is_none() {
                    found.insert(producer.function.clone());
                }
            }
        }
    }
    for key in found {
        members.insert(
            &key,
            Member {
                kind: NodeKind::Condition,
                step: NodeStep::Check,
                description: "Indirect prerequisite".to_string(),
                touches: false,
            },
        );
    }
}

/// Picks the most significant quest effect of a function for display.
fn classify(func: &DialogFunction, token: &str, mis_name: &str) -> Member {
    let mut step = NodeStep::Check;
    let mut description = String::new();
    let mut writes_state = false;

    let mut offer = |candidate: NodeStep, text: String| {
        if candidate > step || (description.is_empty() && candidate == step) {
            step = candidate;
            description = text;
        }
    };

    for action in &func.actions {
        match action {
            Action::CreateTopic { topic, .. } if is_case_insensitive_match(topic, token) => {
                writes_state = true;
                offer(NodeStep::Start, "Start Quest".to_string());
            },
            Action::LogSetTopicStatus { topic, status }
                if is_case_insensitive_match(topic, token) && !status.is_blank() =>
            {
                writes_state = true;
                let (candidate, text) = describe_state(status);
                offer(candidate, text);
            },
            Action::SetVariable {
                variable_name,
                operator: AssignOp::Assign,
                value,
            } if is_case_insensitive_match(variable_name, mis_name) && !value.is_blank() => {
                writes_state = true;
                let (candidate, _) = describe_state(value);
                offer(candidate, format!("{variable_name} = {value}"));
            },
            Action::LogEntry { topic, .. } if is_case_insensitive_match(topic, token) => {
                offer(NodeStep::Update, "Log Entry".to_string());
            },
            _ => {},
        }
    }

    Member {
        kind: if writes_state { NodeKind::State } else { NodeKind::Trigger },
        step,
        description,
        touches: true,
    }
}

fn describe_state(value: &ScriptValue) -> (NodeStep, String) {
    match LifecycleState::normalize(value) {
        LifecycleState::Running => (NodeStep::Update, "Set Running".to_string()),
        LifecycleState::Success => (NodeStep::Success, "Finish (Success)".to_string()),
        LifecycleState::Failed => (NodeStep::Failed, "Finish (Failed)".to_string()),
        LifecycleState::Obsolete => (NodeStep::Obsolete, "Finish (Obsolete)".to_string()),
        LifecycleState::Unknown => (NodeStep::Update, format!("Set Status: {value}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_cond(var: &str, op: Option<CompareOp>, value: Option<&str>, negated: bool) -> Condition {
        Condition::Variable {
            variable_name: var.into(),
            operator: op,
            value: value.map(ScriptValue::from),
            negated,
        }
    }

    #[test]
    fn lifecycle_literals_match_codes_on_mis_variables() {
        let cond = var_cond("MIS_Q", Some(CompareOp::Eq), Some("LOG_SUCCESS"), false);
        let check = VarCheck::from_condition(&cond).unwrap();
        assert!(check.is_satisfied_by(&ScriptValue::Int(2)));
        assert!(!check.is_satisfied_by(&"LOG_RUNNING".into()));
    }

    #[test]
    fn range_and_negated_checks_evaluate_numerically() {
        let cond = var_cond("Kapitel", Some(CompareOp::Ge), Some("3"), false);
        let check = VarCheck::from_condition(&cond).unwrap();
        assert!(check.is_satisfied_by(&ScriptValue::Int(4)));
        assert!(!check.is_satisfied_by(&ScriptValue::Int(2)));
        assert!(!check.is_editable());

        let negated = var_cond("Kapitel", Some(CompareOp::Eq), Some("3"), true);
        let check = VarCheck::from_condition(&negated).unwrap();
        assert!(check.is_satisfied_by(&ScriptValue::Int(2)));
    }

    #[test]
    fn bare_flags_use_truthiness() {
        let cond = var_cond("Knows_Map", None, None, false);
        let check = VarCheck::from_condition(&cond).unwrap();
        assert!(check.is_satisfied_by(&"TRUE".into()));
        assert!(!check.is_satisfied_by(&"FALSE".into()));
        assert_eq!(check.label(), "Knows_Map");

        let negated = var_cond("Knows_Map", None, None, true);
        assert!(VarCheck::from_condition(&negated).unwrap().is_satisfied_by(&ScriptValue::Int(0)));
    }

    #[test]
    fn malformed_checks_are_skipped() {
        assert!(VarCheck::from_condition(&var_cond("", Some(CompareOp::Eq), Some("1"), false)).is_none());
        assert!(VarCheck::from_condition(&var_cond("X", Some(CompareOp::Eq), None, false)).is_none());
    }

    #[test]
    fn terminal_step_outranks_start() {
        let func = DialogFunction {
            actions: vec![
                Action::CreateTopic {
                    topic: "TOPIC_Q".into(),
                    topic_type: None,
                },
                Action::LogSetTopicStatus {
                    topic: "TOPIC_Q".into(),
                    status: "LOG_RUNNING".into(),
                },
                Action::LogSetTopicStatus {
                    topic: "TOPIC_Q".into(),
                    status: "LOG_FAILED".into(),
                },
            ],
            ..DialogFunction::new("F")
        };
        let member = classify(&func, "TOPIC_Q", "MIS_Q");
        assert_eq!(member.step, NodeStep::Failed);
        assert_eq!(member.description, "Finish (Failed)");
        assert_eq!(member.kind, NodeKind::State);
    }
}
