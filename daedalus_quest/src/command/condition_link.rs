//! Removing and rewriting variable conditions created through condition links.

use daedalus_data::{Condition, ScriptValue, SemanticModel};

use super::{
    CommandError, CommandResult, ErrorCode, LinkParts, edit_function, is_link_condition, link_operator,
    require_function, success,
};

/// Removes the first condition on the target matching the link. The source only names
/// the producer for the affected list and may be absent from the model.
pub(super) fn remove_requirement_handler(
    model: &SemanticModel,
    source: &str,
    target: &str,
    link: &LinkParts<'_>,
) -> CommandResult {
    let (key, func) = require_function(model, target, "Target function")?;
    let (variable, value, operator) = link.validate("Removing a condition link")?;

    let Some(index) = func
        .conditions
        .iter()
        .position(|cond| is_link_condition(cond, variable, operator, value))
    else {
        return Err(CommandError::new(
            ErrorCode::ConditionNotFound,
            format!("Condition \"{variable} {operator} {value}\" was not found on \"{target}\"."),
        )
        .into());
    };

    let updated = edit_function(model, key, |func| {
        func.conditions.remove(index);
    });
    success(updated, &[source, key])
}

/// Replaces the `old_variable old_operator old_value` condition on the target with the link.
///
/// `condition_index` is a hint from the graph; it is used when it points at the old
/// condition, otherwise the first match wins.
pub(super) fn update_condition_link_handler(
    model: &SemanticModel,
    target: &str,
    condition_index: Option<usize>,
    old: (&str, &ScriptValue, Option<&str>),
    link: &LinkParts<'_>,
) -> CommandResult {
    let (key, func) = require_function(model, target, "Target function")?;
    let (variable, value, operator) = link.validate("Condition link update")?;
    let (old_variable, old_value, old_operator) = old;
    let old_operator = link_operator(old_operator)?;

    let is_old = |cond: &Condition| is_link_condition(cond, old_variable.trim(), old_operator, old_value);
    let hinted = condition_index.filter(|&i| func.conditions.get(i).is_some_and(is_old));
    let Some(index) = hinted.or_else(|| func.conditions.iter().position(is_old)) else {
        return Err(CommandError::new(
            ErrorCode::ConditionNotFound,
            format!("Condition \"{old_variable} {old_operator} {old_value}\" was not found on \"{target}\"."),
        )
        .into());
    };

    let duplicate = func
        .conditions
        .iter()
        .enumerate()
        .any(|(i, cond)| i != index && is_link_condition(cond, variable, operator, value));
    if duplicate {
        return Err(CommandError::new(
            ErrorCode::ConditionAlreadyExists,
            format!("Condition \"{variable} {operator} {value}\" already exists on \"{target}\"."),
        )
        .into());
    }

    let replacement = Condition::Variable {
        variable_name: variable.to_string(),
        operator: Some(operator),
        value: Some(value.clone()),
        negated: false,
    };
    let updated = edit_function(model, key, |func| {
        func.conditions[index] = replacement;
    });
    success(updated, &[key])
}
