//! Typed quest edit commands.
//!
//! Every edit the quest editor can make is one [`QuestCommand`]. [`execute_quest_command`]
//! validates it against the current model and, if it is acceptable, returns a new model
//! with the smallest possible change applied plus the functions it touched. The caller's
//! model is only ever borrowed, so a rejected or discarded command leaves nothing behind.
//!
//! Handlers live in the submodules, grouped by what they edit.

mod condition_link;
mod connect;
mod journal;
mod knows_info;
mod layout;
mod transition;

use std::fmt;

use daedalus_data::{CompareOp, Condition, DialogFunction, ScriptValue, SemanticModel};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use variantly::Variantly;

use crate::identity::is_case_insensitive_match;

/// Whether a link edits choices between functions or variable conditions on the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkMode {
    #[default]
    Transition,
    Requires,
}

/// Canvas position for layout-only commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
}

/// Operators arrive as raw text so an unsupported one is reported as `INVALID_OPERATOR`
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Variantly)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QuestCommand {
    AddTopicStatus {
        function_name: String,
        topic: String,
        status: String,
    },
    SetMisState {
        function_name: String,
        variable_name: String,
        value: ScriptValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
    },
    AddLogEntry {
        function_name: String,
        topic: String,
        text: String,
    },
    ConnectCondition {
        #[serde(default)]
        mode: LinkMode,
        #[serde(default)]
        source_function_name: String,
        target_function_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choice_text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ScriptValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
    },
    AddKnowsInfoRequirement {
        target_function_name: String,
        dialog_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        npc: Option<String>,
    },
    RemoveKnowsInfoRequirement {
        target_function_name: String,
        dialog_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        npc: Option<String>,
    },
    RemoveTransition {
        #[serde(default)]
        mode: LinkMode,
        #[serde(default)]
        source_function_name: String,
        target_function_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ScriptValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
    },
    RemoveConditionLink {
        target_function_name: String,
        variable_name: String,
        value: ScriptValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
    },
    UpdateConditionLink {
        target_function_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition_index: Option<usize>,
        old_variable_name: String,
        old_value: ScriptValue,
        /// Operator of the condition being replaced. Absent means `==`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_operator: Option<String>,
        variable_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ScriptValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
    },
    UpdateTransitionText {
        source_function_name: String,
        target_function_name: String,
        text: String,
    },
    MoveNode {
        node_id: String,
        position: NodePosition,
    },
}

impl QuestCommand {
    pub fn name(&self) -> &'static str {
        match self {
            QuestCommand::AddTopicStatus { .. } => "addTopicStatus",
            QuestCommand::SetMisState { .. } => "setMisState",
            QuestCommand::AddLogEntry { .. } => "addLogEntry",
            QuestCommand::ConnectCondition { .. } => "connectCondition",
            QuestCommand::AddKnowsInfoRequirement { .. } => "addKnowsInfoRequirement",
            QuestCommand::RemoveKnowsInfoRequirement { .. } => "removeKnowsInfoRequirement",
            QuestCommand::RemoveTransition { .. } => "removeTransition",
            QuestCommand::RemoveConditionLink { .. } => "removeConditionLink",
            QuestCommand::UpdateConditionLink { .. } => "updateConditionLink",
            QuestCommand::UpdateTransitionText { .. } => "updateTransitionText",
            QuestCommand::MoveNode { .. } => "moveNode",
        }
    }
}

/// The model a command is validated against, and the quest being edited.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub quest_name: &'a str,
    pub model: &'a SemanticModel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FunctionNotFound,
    InvalidVariableName,
    InvalidOperator,
    InvalidValue,
    InvalidStatus,
    InvalidText,
    TransitionAlreadyExists,
    TransitionNotFound,
    ConditionAlreadyExists,
    ConditionNotFound,
    InvalidConditionLink,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FunctionNotFound => "FUNCTION_NOT_FOUND",
            ErrorCode::InvalidVariableName => "INVALID_VARIABLE_NAME",
            ErrorCode::InvalidOperator => "INVALID_OPERATOR",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidStatus => "INVALID_STATUS",
            ErrorCode::InvalidText => "INVALID_TEXT",
            ErrorCode::TransitionAlreadyExists => "TRANSITION_ALREADY_EXISTS",
            ErrorCode::TransitionNotFound => "TRANSITION_NOT_FOUND",
            ErrorCode::ConditionAlreadyExists => "CONDITION_ALREADY_EXISTS",
            ErrorCode::ConditionNotFound => "CONDITION_NOT_FOUND",
            ErrorCode::InvalidConditionLink => "INVALID_CONDITION_LINK",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSuccess {
    pub updated_model: SemanticModel,
    /// Functions whose source must be regenerated, including endpoints outside the model.
    pub affected_function_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub errors: Vec<CommandError>,
}

impl CommandFailure {
    /// Code of the first reported error.
    pub fn code(&self) -> Option<ErrorCode> {
        self.errors.first().map(|e| e.code)
    }
}

impl From<CommandError> for CommandFailure {
    fn from(error: CommandError) -> Self {
        Self { errors: vec![error] }
    }
}

pub type CommandResult = Result<CommandSuccess, CommandFailure>;

/// Validate and apply one command.
///
/// Never panics and never mutates `context.model`.
///
/// # Errors
/// Returns a [`CommandFailure`] carrying one coded error when validation fails.
pub fn execute_quest_command(context: &CommandContext<'_>, command: &QuestCommand) -> CommandResult {
    #[allow(clippy::enum_glob_use)]
    use QuestCommand::*;
    let model = context.model;

    let result = match command {
        AddTopicStatus {
            function_name,
            topic,
            status,
        } => journal::add_topic_status_handler(model, function_name, topic, status),
        SetMisState {
            function_name,
            variable_name,
            value,
            operator,
        } => journal::set_mis_state_handler(model, function_name, variable_name, value, operator.as_deref()),
        AddLogEntry {
            function_name,
            topic,
            text,
        } => journal::add_log_entry_handler(model, function_name, topic, text),
        ConnectCondition {
            mode,
            source_function_name,
            target_function_name,
            choice_text,
            variable_name,
            value,
            operator,
        } => match mode {
            LinkMode::Transition => connect::connect_transition_handler(
                model,
                source_function_name,
                target_function_name,
                choice_text.as_deref(),
            ),
            LinkMode::Requires => connect::connect_requirement_handler(
                model,
                source_function_name,
                target_function_name,
                &LinkParts::new(variable_name.as_deref(), value.as_ref(), operator.as_deref()),
            ),
        },
        AddKnowsInfoRequirement {
            target_function_name,
            dialog_ref,
            npc,
        } => knows_info::add_knows_info_handler(model, target_function_name, dialog_ref, npc.as_deref()),
        RemoveKnowsInfoRequirement {
            target_function_name,
            dialog_ref,
            npc,
        } => knows_info::remove_knows_info_handler(model, target_function_name, dialog_ref, npc.as_deref()),
        RemoveTransition {
            mode,
            source_function_name,
            target_function_name,
            variable_name,
            value,
            operator,
        } => match mode {
            LinkMode::Transition => {
                transition::remove_transition_handler(model, source_function_name, target_function_name)
            },
            LinkMode::Requires => condition_link::remove_requirement_handler(
                model,
                source_function_name,
                target_function_name,
                &LinkParts::new(variable_name.as_deref(), value.as_ref(), operator.as_deref()),
            ),
        },
        RemoveConditionLink {
            target_function_name,
            variable_name,
            value,
            operator,
        } => condition_link::remove_requirement_handler(
            model,
            target_function_name,
            target_function_name,
            &LinkParts::new(Some(variable_name.as_str()), Some(value), operator.as_deref()),
        ),
        UpdateConditionLink {
            target_function_name,
            condition_index,
            old_variable_name,
            old_value,
            old_operator,
            variable_name,
            value,
            operator,
        } => condition_link::update_condition_link_handler(
            model,
            target_function_name,
            *condition_index,
            (old_variable_name.as_str(), old_value, old_operator.as_deref()),
            // A rewrite that names no operator keeps the old one.
            &LinkParts::new(
                Some(variable_name.as_str()),
                value.as_ref(),
                operator.as_deref().or(old_operator.as_deref()),
            ),
        ),
        UpdateTransitionText {
            source_function_name,
            target_function_name,
            text,
        } => transition::update_transition_text_handler(model, source_function_name, target_function_name, text),
        MoveNode { node_id, position } => layout::move_node_handler(model, node_id, *position),
    };

    match &result {
        Ok(success) => debug!(
            "quest '{}': {} applied, affected [{}]",
            context.quest_name,
            command.name(),
            success.affected_function_names.join(", ")
        ),
        Err(failure) => info!(
            "quest '{}': {} rejected: {}",
            context.quest_name,
            command.name(),
            failure
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
    result
}

/// The variable condition a requires-mode command names, before validation.
pub(crate) struct LinkParts<'a> {
    variable: Option<&'a str>,
    value: Option<&'a ScriptValue>,
    operator: Option<&'a str>,
}

impl<'a> LinkParts<'a> {
    fn new(variable: Option<&'a str>, value: Option<&'a ScriptValue>, operator: Option<&'a str>) -> Self {
        Self {
            variable,
            value,
            operator,
        }
    }

    /// Variable name, value and operator, or the error explaining which part is missing.
    fn validate(&self, what: &str) -> Result<(&'a str, &'a ScriptValue, CompareOp), CommandError> {
        let (Some(variable), Some(value)) = (self.variable.map(str::trim), self.value) else {
            return Err(CommandError::new(
                ErrorCode::InvalidConditionLink,
                format!("{what} requires variableName and value."),
            ));
        };
        if variable.is_empty() {
            return Err(CommandError::new(
                ErrorCode::InvalidConditionLink,
                format!("{what} requires variableName and value."),
            ));
        }
        Ok((variable, value, link_operator(self.operator)?))
    }
}

/// Only `==` and `!=` can be written through a condition link. Absent means `==`.
fn link_operator(operator: Option<&str>) -> Result<CompareOp, CommandError> {
    let Some(raw) = operator.map(str::trim).filter(|op| !op.is_empty()) else {
        return Ok(CompareOp::Eq);
    };
    match CompareOp::parse(raw) {
        Some(op) if op.is_discrete() => Ok(op),
        _ => Err(CommandError::new(
            ErrorCode::InvalidOperator,
            format!("Unsupported operator \"{raw}\". Condition links support only == and !=."),
        )),
    }
}

/// A non-negated variable condition comparing `variable` against `value` with `operator`.
fn is_link_condition(cond: &Condition, variable: &str, operator: CompareOp, value: &ScriptValue) -> bool {
    match cond {
        Condition::Variable {
            variable_name,
            operator: Some(op),
            value: Some(existing),
            negated: false,
        } => {
            *op == operator
                && is_case_insensitive_match(variable_name, variable)
                && same_value(existing, value)
        },
        _ => false,
    }
}

fn same_value(left: &ScriptValue, right: &ScriptValue) -> bool {
    left.to_string().trim().eq_ignore_ascii_case(right.to_string().trim())
}

/// Stored key and function for `name`, or `FUNCTION_NOT_FOUND` naming its `role`.
fn require_function<'m>(
    model: &'m SemanticModel,
    name: &str,
    role: &str,
) -> Result<(&'m str, &'m DialogFunction), CommandError> {
    model
        .function_key(name)
        .and_then(|key| model.functions.get_key_value(key))
        .map(|(key, func)| (key.as_str(), func))
        .ok_or_else(|| {
            CommandError::new(
                ErrorCode::FunctionNotFound,
                format!("{role} \"{name}\" was not found in the active semantic model."),
            )
        })
}

/// Clones the model and edits one function in the copy.
fn edit_function(model: &SemanticModel, key: &str, edit: impl FnOnce(&mut DialogFunction)) -> SemanticModel {
    let mut updated = model.clone();
    if let Some(func) = updated.functions.get_mut(key) {
        edit(func);
    }
    updated
}

/// Deduplicated, non-blank affected names in the order given.
fn affected(names: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if !out.iter().any(|seen| is_case_insensitive_match(seen, name)) {
            out.push(name.to_string());
        }
    }
    out
}

fn success(updated_model: SemanticModel, names: &[&str]) -> CommandResult {
    Ok(CommandSuccess {
        updated_model,
        affected_function_names: affected(names),
    })
}
