//! Layout-only commands. These validate against the model but never change it.

use daedalus_data::SemanticModel;

use super::{CommandError, CommandResult, ErrorCode, NodePosition, success};
use crate::graph::{EXTERNAL_PREFIX, SWIMLANE_PREFIX};

pub(super) fn move_node_handler(model: &SemanticModel, node_id: &str, position: NodePosition) -> CommandResult {
    let node_id = node_id.trim();
    if node_id.is_empty() {
        return Err(CommandError::new(ErrorCode::InvalidValue, "Node id is required for moveNode.").into());
    }
    if !position.x.is_finite() || !position.y.is_finite() {
        return Err(CommandError::new(
            ErrorCode::InvalidValue,
            "Node position must contain finite x/y coordinates.",
        )
        .into());
    }

    if let Some(key) = model.function_key(node_id) {
        return success(model.clone(), &[key]);
    }
    if node_id.starts_with(EXTERNAL_PREFIX) || node_id.starts_with(SWIMLANE_PREFIX) {
        return success(model.clone(), &[]);
    }
    Err(CommandError::new(
        ErrorCode::FunctionNotFound,
        format!("Cannot move unknown quest node \"{node_id}\"."),
    )
    .into())
}
