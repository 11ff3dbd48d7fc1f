//! Editing existing `Choice` transitions.

use daedalus_data::{Action, SemanticModel};

use super::{CommandError, CommandResult, ErrorCode, edit_function, require_function, success};
use crate::identity::is_case_insensitive_match;

fn is_choice_to(action: &Action, target: &str) -> bool {
    matches!(action, Action::Choice { target_function, .. } if is_case_insensitive_match(target_function, target))
}

fn not_found(source: &str, target: &str) -> CommandError {
    CommandError::new(
        ErrorCode::TransitionNotFound,
        format!("Transition from \"{source}\" to \"{target}\" does not exist."),
    )
}

/// Removes the first choice from the source to the target. Other choices, including
/// further ones to the same target, keep their place.
pub(super) fn remove_transition_handler(model: &SemanticModel, source: &str, target: &str) -> CommandResult {
    let (key, func) = require_function(model, source, "Source function")?;
    let Some(index) = func.actions.iter().position(|action| is_choice_to(action, target)) else {
        return Err(not_found(source, target).into());
    };
    let updated = edit_function(model, key, |func| {
        func.actions.remove(index);
    });
    success(updated, &[key, target])
}

pub(super) fn update_transition_text_handler(
    model: &SemanticModel,
    source: &str,
    target: &str,
    text: &str,
) -> CommandResult {
    let (key, func) = require_function(model, source, "Source function")?;
    let text = text.trim();
    if text.is_empty() {
        return Err(CommandError::new(ErrorCode::InvalidText, "Transition text cannot be empty.").into());
    }
    let Some(index) = func.actions.iter().position(|action| is_choice_to(action, target)) else {
        return Err(not_found(source, target).into());
    };
    let updated = edit_function(model, key, |func| {
        if let Some(Action::Choice { text: current, .. }) = func.actions.get_mut(index) {
            *current = text.to_string();
        }
    });
    success(updated, &[key, target])
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_data::DialogFunction;

    fn choice(text: &str, target: &str) -> Action {
        Action::Choice {
            dialog_ref: "self".into(),
            text: text.into(),
            target_function: target.into(),
        }
    }

    fn model() -> SemanticModel {
        let mut model = SemanticModel::default();
        let mut hub = DialogFunction::new("Hub");
        hub.actions = vec![choice("Left", "L"), choice("Middle", "M"), choice("Right", "R")];
        model.functions.insert("Hub".into(), hub);
        model
    }

    #[test]
    fn removes_only_the_matching_choice() {
        let result = remove_transition_handler(&model(), "Hub", "m").unwrap();
        assert_eq!(
            result.updated_model.functions["Hub"].actions,
            vec![choice("Left", "L"), choice("Right", "R")]
        );
        assert_eq!(result.affected_function_names, vec!["Hub", "m"]);

        let err = remove_transition_handler(&result.updated_model, "Hub", "M").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TransitionNotFound));
    }

    #[test]
    fn updates_choice_text_in_place() {
        let result = update_transition_text_handler(&model(), "Hub", "R", "  Go right ").unwrap();
        assert_eq!(result.updated_model.functions["Hub"].actions[2], choice("Go right", "R"));
        assert_eq!(
            update_transition_text_handler(&model(), "Hub", "R", " ").unwrap_err().code(),
            Some(ErrorCode::InvalidText)
        );
        assert_eq!(
            update_transition_text_handler(&model(), "Hub", "X", "Text").unwrap_err().code(),
            Some(ErrorCode::TransitionNotFound)
        );
        assert_eq!(
            update_transition_text_handler(&model(), "Nope", "R", "Text").unwrap_err().code(),
            Some(ErrorCode::FunctionNotFound)
        );
    }
}
