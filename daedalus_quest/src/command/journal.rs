//! Journal and quest state writes: topic status, `MIS_` assignments, log entries.

use daedalus_data::{Action, AssignOp, ScriptValue, SemanticModel};

use super::{CommandError, CommandResult, ErrorCode, edit_function, require_function, success};
use crate::identity::{is_case_insensitive_match, is_mis_variable};

fn require_topic(topic: &str) -> Result<&str, CommandError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(CommandError::new(ErrorCode::InvalidValue, "Topic is required."));
    }
    Ok(topic)
}

/// Appends `Log_SetTopicStatus(topic, status)`. Appending a status the function already
/// sets for that topic is a no-op.
pub(super) fn add_topic_status_handler(
    model: &SemanticModel,
    function_name: &str,
    topic: &str,
    status: &str,
) -> CommandResult {
    let status = status.trim();
    if status.is_empty() {
        return Err(CommandError::new(ErrorCode::InvalidStatus, "Topic status cannot be empty.").into());
    }
    let topic = require_topic(topic)?;
    let (key, func) = require_function(model, function_name, "Function")?;

    let present = func.actions.iter().any(|action| {
        matches!(action, Action::LogSetTopicStatus { topic: t, status: s }
            if is_case_insensitive_match(t, topic) && s.to_string().trim().eq_ignore_ascii_case(status))
    });
    if present {
        return success(model.clone(), &[key]);
    }

    let updated = edit_function(model, key, |func| {
        func.actions.push(Action::LogSetTopicStatus {
            topic: topic.to_string(),
            status: ScriptValue::from(status),
        });
    });
    success(updated, &[key])
}

/// Sets a quest state variable, replacing the function's first plain assignment to it.
pub(super) fn set_mis_state_handler(
    model: &SemanticModel,
    function_name: &str,
    variable_name: &str,
    value: &ScriptValue,
    operator: Option<&str>,
) -> CommandResult {
    let variable = variable_name.trim();
    if !is_mis_variable(variable) {
        return Err(CommandError::new(
            ErrorCode::InvalidVariableName,
            format!("Expected MIS_ variable name, received \"{variable_name}\"."),
        )
        .into());
    }
    let operator = operator.map_or("=", str::trim);
    if AssignOp::parse(operator) != Some(AssignOp::Assign) {
        return Err(CommandError::new(
            ErrorCode::InvalidOperator,
            format!("Unsupported operator \"{operator}\". Only \"=\" is currently supported."),
        )
        .into());
    }
    if value.is_blank() {
        return Err(CommandError::new(ErrorCode::InvalidValue, "MIS state value cannot be empty.").into());
    }
    let (key, func) = require_function(model, function_name, "Function")?;

    let existing = func.actions.iter().position(|action| {
        matches!(action, Action::SetVariable { variable_name, operator: AssignOp::Assign, .. }
            if is_case_insensitive_match(variable_name, variable))
    });
    let next = Action::SetVariable {
        variable_name: variable.to_string(),
        operator: AssignOp::Assign,
        value: value.clone(),
    };
    let updated = edit_function(model, key, |func| match existing {
        Some(index) => func.actions[index] = next,
        None => func.actions.push(next),
    });
    success(updated, &[key])
}

/// Appends `B_LogEntry(topic, text)`, unless the function already logs that exact text.
pub(super) fn add_log_entry_handler(model: &SemanticModel, function_name: &str, topic: &str, text: &str) -> CommandResult {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommandError::new(ErrorCode::InvalidText, "Log entry text cannot be empty.").into());
    }
    let topic = require_topic(topic)?;
    let (key, func) = require_function(model, function_name, "Function")?;

    let present = func.actions.iter().any(|action| {
        matches!(action, Action::LogEntry { topic: t, text: existing }
            if is_case_insensitive_match(t, topic) && existing.trim() == text)
    });
    if present {
        return success(model.clone(), &[key]);
    }

    let updated = edit_function(model, key, |func| {
        func.actions.push(Action::LogEntry {
            topic: topic.to_string(),
            text: text.to_string(),
        });
    });
    success(updated, &[key])
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_data::DialogFunction;

    fn model() -> SemanticModel {
        let mut model = SemanticModel::default();
        let mut func = DialogFunction::new("DIA_Q_Info");
        func.actions.push(Action::SetVariable {
            variable_name: "MIS_Q".into(),
            operator: AssignOp::Assign,
            value: "LOG_RUNNING".into(),
        });
        func.actions.push(Action::SetVariable {
            variable_name: "MIS_Q".into(),
            operator: AssignOp::Add,
            value: ScriptValue::Int(1),
        });
        model.functions.insert("DIA_Q_Info".into(), func);
        model
    }

    #[test]
    fn blank_status_is_rejected_before_lookup() {
        let err = add_topic_status_handler(&model(), "Missing", "TOPIC_Q", "  ").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidStatus));
    }

    #[test]
    fn topic_status_is_appended_once() {
        let model = model();
        let first = add_topic_status_handler(&model, "dia_q_info", "TOPIC_Q", " LOG_SUCCESS ").unwrap();
        assert_eq!(first.affected_function_names, vec!["DIA_Q_Info"]);
        let actions = &first.updated_model.functions["DIA_Q_Info"].actions;
        assert_eq!(
            actions.last(),
            Some(&Action::LogSetTopicStatus {
                topic: "TOPIC_Q".into(),
                status: "LOG_SUCCESS".into(),
            })
        );

        let again = add_topic_status_handler(&first.updated_model, "DIA_Q_Info", "topic_q", "LOG_SUCCESS").unwrap();
        assert_eq!(again.updated_model, first.updated_model);
    }

    #[test]
    fn mis_state_replaces_first_plain_assignment() {
        let result = set_mis_state_handler(&model(), "DIA_Q_Info", "MIS_Q", &"LOG_FAILED".into(), None).unwrap();
        let actions = &result.updated_model.functions["DIA_Q_Info"].actions;
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            Action::SetVariable {
                variable_name: "MIS_Q".into(),
                operator: AssignOp::Assign,
                value: "LOG_FAILED".into(),
            }
        );
        assert!(matches!(actions[1], Action::SetVariable { operator: AssignOp::Add, .. }));
    }

    #[test]
    fn mis_state_is_appended_for_new_variable() {
        let result = set_mis_state_handler(&model(), "DIA_Q_Info", "MIS_Other", &ScriptValue::Int(1), Some("=")).unwrap();
        assert_eq!(result.updated_model.functions["DIA_Q_Info"].actions.len(), 3);
    }

    #[test]
    fn mis_state_validation() {
        let model = model();
        let value = ScriptValue::from("LOG_RUNNING");
        let code = |r: CommandResult| r.unwrap_err().code();
        assert_eq!(
            code(set_mis_state_handler(&model, "DIA_Q_Info", "Kapitel", &value, None)),
            Some(ErrorCode::InvalidVariableName)
        );
        assert_eq!(
            code(set_mis_state_handler(&model, "DIA_Q_Info", "MIS_Q", &value, Some("+="))),
            Some(ErrorCode::InvalidOperator)
        );
        assert_eq!(
            code(set_mis_state_handler(&model, "DIA_Q_Info", "MIS_Q", &ScriptValue::from(" "), None)),
            Some(ErrorCode::InvalidValue)
        );
        assert_eq!(
            code(set_mis_state_handler(&model, "Nope", "MIS_Q", &value, None)),
            Some(ErrorCode::FunctionNotFound)
        );
    }

    #[test]
    fn log_entries_need_text() {
        let err = add_log_entry_handler(&model(), "DIA_Q_Info", "TOPIC_Q", "\t").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidText));
        let ok = add_log_entry_handler(&model(), "DIA_Q_Info", "TOPIC_Q", " Found the map. ").unwrap();
        assert_eq!(
            ok.updated_model.functions["DIA_Q_Info"].actions.last(),
            Some(&Action::LogEntry {
                topic: "TOPIC_Q".into(),
                text: "Found the map.".into(),
            })
        );
    }
}
