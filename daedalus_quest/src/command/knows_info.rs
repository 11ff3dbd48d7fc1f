//! `Npc_KnowsInfo` requirements on a function.

use daedalus_data::{Condition, DialogFunction, SemanticModel};

use super::{CommandError, CommandResult, ErrorCode, edit_function, require_function, success};
use crate::identity::is_case_insensitive_match;

const DEFAULT_NPC: &str = "self";

/// Validated target key, npc and dialog for a knows-info command.
fn prepare<'m, 'c>(
    model: &'m SemanticModel,
    target: &str,
    dialog_ref: &'c str,
    npc: Option<&'c str>,
    command: &str,
) -> Result<(&'m str, &'m DialogFunction, &'c str, &'c str), CommandError> {
    let (key, func) = require_function(model, target, "Target function")?;
    let dialog_ref = dialog_ref.trim();
    if dialog_ref.is_empty() {
        return Err(CommandError::new(
            ErrorCode::InvalidValue,
            format!("dialogRef is required for {command}."),
        ));
    }
    let npc = npc.map(str::trim).filter(|npc| !npc.is_empty()).unwrap_or(DEFAULT_NPC);
    Ok((key, func, npc, dialog_ref))
}

fn is_knows_info(cond: &Condition, npc: &str, dialog_ref: &str) -> bool {
    matches!(cond, Condition::NpcKnowsInfo { npc: n, dialog_ref: d }
        if is_case_insensitive_match(n, npc) && is_case_insensitive_match(d, dialog_ref))
}

/// Requires the target to follow `dialog_ref`. Adding an existing requirement is a no-op.
pub(super) fn add_knows_info_handler(
    model: &SemanticModel,
    target: &str,
    dialog_ref: &str,
    npc: Option<&str>,
) -> CommandResult {
    let (key, func, npc, dialog_ref) = prepare(model, target, dialog_ref, npc, "addKnowsInfoRequirement")?;
    if func.conditions.iter().any(|cond| is_knows_info(cond, npc, dialog_ref)) {
        return success(model.clone(), &[key]);
    }
    let updated = edit_function(model, key, |func| {
        func.conditions.push(Condition::NpcKnowsInfo {
            npc: npc.to_string(),
            dialog_ref: dialog_ref.to_string(),
        });
    });
    success(updated, &[key])
}

/// Drops the first matching requirement. Removing one that is not there is a no-op.
pub(super) fn remove_knows_info_handler(
    model: &SemanticModel,
    target: &str,
    dialog_ref: &str,
    npc: Option<&str>,
) -> CommandResult {
    let (key, func, npc, dialog_ref) = prepare(model, target, dialog_ref, npc, "removeKnowsInfoRequirement")?;
    let Some(index) = func
        .conditions
        .iter()
        .position(|cond| is_knows_info(cond, npc, dialog_ref))
    else {
        return success(model.clone(), &[key]);
    };
    let updated = edit_function(model, key, |func| {
        func.conditions.remove(index);
    });
    success(updated, &[key])
}
