//! Quest graph reconstruction.
//!
//! Scripts never declare a quest's state machine. It is implied by choices between
//! dialogs, by conditions reading variables other functions write, and by checks on the
//! world that nothing in the scripts produces. [`build_quest_graph`] recovers that
//! machine as a node/edge set ready for a canvas:
//!
//! 1. explicit `Choice` transitions between quest functions,
//! 2. `requires` edges from producers of the quest's `MIS_` values to their consumers,
//! 3. dependency edges through any other variable, pulling in one level of indirect producers,
//! 4. external nodes for prerequisites with no producer in the model.
//!
//! Rules 2 to 4 are inferred. Under [`GraphOptions::hide_inferred_edges`] they vanish together
//! with the knows-info followers and indirect producers that only they connect.
//! Real quest data contains mutual state toggles, so every walk over the graph cuts
//! back-edges instead of recursing blindly.

mod edges;
mod layout;
mod nodes;

use std::collections::BTreeSet;

use daedalus_data::{CompareOp, SemanticModel};
use log::debug;
use serde::{Deserialize, Serialize};
use variantly::Variantly;

use crate::identity::quest_mis_variable_name;

pub const SWIMLANE_PREFIX: &str = "swimlane-";
pub const EXTERNAL_PREFIX: &str = "external-";
/// Swimlane for functions no dialog owns.
pub const GLOBAL_NPC: &str = "Global/Other";
/// Swimlane holding synthesized external prerequisites.
pub const EXTERNAL_NPC: &str = "External/World";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
    pub hide_inferred_edges: bool,
    pub show_external_conditions: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            hide_inferred_edges: false,
            show_external_conditions: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Layout group of one NPC's nodes.
    Swimlane,
    /// Touches the quest without writing its state.
    Trigger,
    /// Writes the quest's state.
    State,
    /// Gates quest functions without touching the quest itself.
    Condition,
    /// Synthesized prerequisite with no producer in the model.
    External,
}

/// Display step of a node, driving its icon and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStep {
    Check,
    Update,
    Start,
    Success,
    Failed,
    Obsolete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestGraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Absent on swimlanes.
    pub step: Option<NodeStep>,
    pub label: String,
    pub npc: String,
    pub parent: Option<String>,
    pub description: String,
    pub expression: Option<String>,
    pub touches_selected_quest: bool,
    /// Longest-path depth from the graph's roots, for column layout.
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Transition,
    Requires,
    Dependency,
    External,
}

/// The condition an inferred edge stands for, so editors can rewrite it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeExpression {
    pub variable: String,
    pub operator: CompareOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestGraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub label: String,
    pub inferred: bool,
    pub editable: bool,
    pub source_handle: String,
    pub target_handle: String,
    pub expression: Option<EdgeExpression>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestGraph {
    pub nodes: Vec<QuestGraphNode>,
    pub edges: Vec<QuestGraphEdge>,
}

impl QuestGraph {
    pub fn node(&self, id: &str) -> Option<&QuestGraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&QuestGraphEdge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn edges_into<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a QuestGraphEdge> {
        self.edges.iter().filter(move |edge| edge.target == id)
    }

    /// Every transitive predecessor of `id`, not including `id` itself.
    pub fn upstream_of(&self, id: &str) -> BTreeSet<String> {
        layout::upstream_of(&self.edges, id)
    }
}

/// Reconstruct the state machine of one quest.
///
/// Ids are derived from function and dialog names, so repeated calls on the same model
/// return identical graphs.
pub fn build_quest_graph(model: &SemanticModel, token: &str, options: &GraphOptions) -> QuestGraph {
    if token.trim().is_empty() {
        return QuestGraph::default();
    }
    let mis_name = quest_mis_variable_name(token);

    let producers = nodes::ProducerIndex::build(model, token, &mis_name);
    // Knows-info followers and indirect producers only exist to anchor inferred edges.
    let infer = !options.hide_inferred_edges;
    let mut members = nodes::collect_members(model, token, &mis_name, infer);
    if infer {
        nodes::pull_in_indirect_producers(model, &producers, &mut members);
    }

    let built = edges::build_edges(model, &members, &producers, &mis_name, options);
    let graph = layout::assemble(model, members, built);

    debug!(
        "quest graph for '{token}': {} nodes, {} edges",
        graph.nodes.len(),
        graph.edges.len()
    );
    graph
}
