use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::*;

/// Structural problem found in a `SemanticModel`.
///
/// These are advisory. File-scoped models routinely reference symbols declared elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Two keys of the same kind differ only in casing.
    CaseCollision { kind: &'static str, names: Vec<String> },
    MissingReference { kind: &'static str, id: String, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CaseCollision { kind, names } => {
                write!(f, "{kind} names differ only by case: {}", names.join(", "))
            },
            ValidationError::MissingReference { kind, id, context } => {
                write!(f, "missing {kind} '{id}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check cross-references and basic invariants in a `SemanticModel`.
///
/// ```
/// use daedalus_data::{Dialog, DialogFunction, DialogProperties, SemanticModel, validate_model};
///
/// let mut model = SemanticModel::default();
/// model.functions.insert("DIA_Hello_Info".into(), DialogFunction::new("DIA_Hello_Info"));
/// model.dialogs.insert(
///     "DIA_Hello".into(),
///     Dialog {
///         name: "DIA_Hello".into(),
///         properties: DialogProperties {
///             information: Some("DIA_Hello_Info".into()),
///             ..DialogProperties::default()
///         },
///         ..Dialog::default()
///     },
/// );
/// assert!(validate_model(&model).is_empty());
/// ```
pub fn validate_model(model: &SemanticModel) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    track_case_collisions("dialog", model.dialogs.keys(), &mut errors);
    track_case_collisions("function", model.functions.keys(), &mut errors);
    track_case_collisions("constant", model.constants.keys(), &mut errors);
    track_case_collisions("variable", model.variables.keys(), &mut errors);

    let functions: BTreeSet<String> = model.functions.keys().map(|k| canonical_key(k)).collect();

    for (key, dialog) in &model.dialogs {
        if let Some(info) = dialog.information_function() {
            check_ref("function", info, &functions, format!("dialog '{key}' information"), &mut errors);
        }
        if let Some(cond) = dialog.condition_function() {
            check_ref("function", cond, &functions, format!("dialog '{key}' condition"), &mut errors);
        }
    }

    for (key, func) in &model.functions {
        for action in &func.actions {
            validate_action(action, &functions, &mut errors, key);
        }
        for cond in &func.conditions {
            validate_condition(cond, &mut errors, key);
        }
    }

    errors
}

fn track_case_collisions<'a>(
    kind: &'static str,
    keys: impl Iterator<Item = &'a String>,
    errors: &mut Vec<ValidationError>,
) {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for key in keys {
        groups.entry(canonical_key(key)).or_default().push(key.clone());
    }
    for names in groups.into_values().filter(|names| names.len() > 1) {
        errors.push(ValidationError::CaseCollision { kind, names });
    }
}

fn check_ref(
    kind: &'static str,
    id: &str,
    known: &BTreeSet<String>,
    context: String,
    errors: &mut Vec<ValidationError>,
) {
    if id.trim().is_empty() {
        errors.push(ValidationError::InvalidValue {
            context: format!("{context}: empty {kind} reference"),
        });
    } else if !known.contains(&canonical_key(id)) {
        errors.push(ValidationError::MissingReference {
            kind,
            id: id.to_string(),
            context,
        });
    }
}

fn validate_action(action: &Action, functions: &BTreeSet<String>, errors: &mut Vec<ValidationError>, owner: &str) {
    match action {
        Action::CreateTopic { topic, .. } | Action::LogSetTopicStatus { topic, .. } | Action::LogEntry { topic, .. }
            if topic.trim().is_empty() =>
        {
            errors.push(ValidationError::InvalidValue {
                context: format!("function '{owner}' has a topic action without a topic"),
            });
        },
        Action::SetVariable { variable_name, .. } if variable_name.trim().is_empty() => {
            errors.push(ValidationError::InvalidValue {
                context: format!("function '{owner}' assigns to an unnamed variable"),
            });
        },
        Action::Choice { target_function, .. } => {
            check_ref(
                "function",
                target_function,
                functions,
                format!("function '{owner}' choice"),
                errors,
            );
        },
        _ => {},
    }
}

fn validate_condition(cond: &Condition, errors: &mut Vec<ValidationError>, owner: &str) {
    match cond {
        Condition::Variable { variable_name, .. } if variable_name.trim().is_empty() => {
            errors.push(ValidationError::InvalidValue {
                context: format!("function '{owner}' has a variable condition without a variable name"),
            });
        },
        Condition::NpcKnowsInfo { dialog_ref, .. } if dialog_ref.trim().is_empty() => {
            errors.push(ValidationError::InvalidValue {
                context: format!("function '{owner}' has a knows-info condition without a dialog"),
            });
        },
        _ => {},
    }
}
