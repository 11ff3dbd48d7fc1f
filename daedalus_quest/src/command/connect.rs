//! Connecting two functions, either by a dialog choice or by a condition on the target.

use daedalus_data::{Action, Condition, SemanticModel};

use super::{
    CommandError, CommandResult, ErrorCode, LinkParts, edit_function, is_link_condition, require_function, success,
};
use crate::identity::is_case_insensitive_match;

const DEFAULT_CHOICE_TEXT: &str = "Continue";

/// Adds a `Choice` from the source to the target. Only the source must exist; the target
/// may live in another file.
pub(super) fn connect_transition_handler(
    model: &SemanticModel,
    source: &str,
    target: &str,
    choice_text: Option<&str>,
) -> CommandResult {
    let (key, func) = require_function(model, source, "Source function")?;
    let target = target.trim();
    if target.is_empty() {
        return Err(CommandError::new(ErrorCode::InvalidValue, "Target function name is required.").into());
    }
    if func.choices().any(|(_, existing)| is_case_insensitive_match(existing, target)) {
        return Err(CommandError::new(
            ErrorCode::TransitionAlreadyExists,
            format!("Transition from \"{source}\" to \"{target}\" already exists."),
        )
        .into());
    }

    let text = choice_text
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_CHOICE_TEXT);
    let updated = edit_function(model, key, |func| {
        func.actions.push(Action::Choice {
            dialog_ref: "self".to_string(),
            text: text.to_string(),
            target_function: target.to_string(),
        });
    });
    success(updated, &[key, target])
}

/// Adds a `variable op value` condition to the target. Re-adding an identical condition
/// succeeds without changing anything.
pub(super) fn connect_requirement_handler(
    model: &SemanticModel,
    source: &str,
    target: &str,
    link: &LinkParts<'_>,
) -> CommandResult {
    let (key, func) = require_function(model, target, "Target function")?;
    let (variable, value, operator) = link.validate("Condition links")?;

    if func
        .conditions
        .iter()
        .any(|cond| is_link_condition(cond, variable, operator, value))
    {
        return success(model.clone(), &[source, key]);
    }

    let updated = edit_function(model, key, |func| {
        func.conditions.push(Condition::Variable {
            variable_name: variable.to_string(),
            operator: Some(operator),
            value: Some(value.clone()),
            negated: false,
        });
    });
    success(updated, &[source, key])
}
