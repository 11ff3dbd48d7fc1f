//! Edge inference over the graph members.

use std::collections::BTreeMap;

use daedalus_data::{Action, Condition, SemanticModel};

use super::nodes::{Members, ProducerIndex, VarCheck, resolve_knows_producer};
use super::{
    EXTERNAL_NPC, EXTERNAL_PREFIX, EdgeKind, GraphOptions, NodeKind, NodeStep, QuestGraphEdge, QuestGraphNode,
    SWIMLANE_PREFIX,
};
use crate::identity::{canonical_quest_key, is_case_insensitive_match};

const OUT_STATE: &str = "out-state";
const OUT_FINISHED: &str = "out-finished";
const OUT_BOOL: &str = "out-bool";
const IN_TRIGGER: &str = "in-trigger";
const IN_CONDITION: &str = "in-condition";

/// A synthesized prerequisite node, completed with layout data later.
pub(super) struct ExternalNode {
    pub label: String,
    pub description: String,
    pub expression: String,
}

pub(super) struct BuiltEdges {
    pub edges: Vec<QuestGraphEdge>,
    pub externals: BTreeMap<String, ExternalNode>,
}

impl BuiltEdges {
    /// Adds an edge, folding it into an existing edge with the same id. Two different
    /// conditions behind one edge join their labels and can no longer be edited as one link.
    fn push(&mut self, edge: QuestGraphEdge) {
        let Some(existing) = self.edges.iter_mut().find(|e| e.id == edge.id) else {
            self.edges.push(edge);
            return;
        };
        if !existing
            .label
            .split("; ")
            .any(|part| part.eq_ignore_ascii_case(&edge.label))
        {
            existing.label = format!("{}; {}", existing.label, edge.label);
            existing.editable = false;
            existing.expression = None;
        }
    }

    fn external(&mut self, id: String, node: ExternalNode, consumer: &str, label: &str) {
        let edge_id = format!("{id}-{consumer}");
        self.externals.entry(id.clone()).or_insert(node);
        self.push(QuestGraphEdge {
            id: edge_id,
            source: id,
            target: consumer.to_string(),
            kind: EdgeKind::External,
            label: label.to_string(),
            inferred: true,
            editable: false,
            source_handle: OUT_BOOL.to_string(),
            target_handle: IN_CONDITION.to_string(),
            expression: None,
        });
    }
}

pub(super) fn build_edges(
    model: &SemanticModel,
    members: &Members,
    producers: &ProducerIndex,
    mis_name: &str,
    options: &GraphOptions,
) -> BuiltEdges {
    let infer = !options.hide_inferred_edges;
    let synthesize = infer && options.show_external_conditions;
    let mut built = BuiltEdges {
        edges: Vec::new(),
        externals: BTreeMap::new(),
    };

    for (consumer, member) in members.iter() {
        let Some(func) = model.functions.get(consumer) else {
            continue;
        };

        for action in &func.actions {
            if let Action::Choice {
                text, target_function, ..
            } = action
                && let Some(target) = members.resolve(target_function)
            {
                let target_is_state = members.get(target).is_some_and(|m| m.kind == NodeKind::State);
                built.push(QuestGraphEdge {
                    id: format!("choice-{consumer}-{target}"),
                    source: consumer.clone(),
                    target: target.to_string(),
                    kind: EdgeKind::Transition,
                    label: text.clone(),
                    inferred: false,
                    editable: true,
                    source_handle: if member.kind == NodeKind::State { OUT_STATE } else { OUT_FINISHED }.to_string(),
                    target_handle: if target_is_state { IN_TRIGGER } else { IN_CONDITION }.to_string(),
                    expression: None,
                });
            }
        }

        if !infer {
            continue;
        }
        // External prerequisites only matter for functions that actually belong to the quest.
        let synthesize_here = synthesize && member.touches;

        for cond in &func.conditions {
            match cond {
                Condition::NpcKnowsInfo { npc, dialog_ref } if !dialog_ref.trim().is_empty() => {
                    match resolve_knows_producer(model, dialog_ref).and_then(|f| members.resolve(f)) {
                        Some(producer) if producer != consumer.as_str() => built.push(QuestGraphEdge {
                            id: format!("knows-{producer}-{consumer}"),
                            source: producer.to_string(),
                            target: consumer.clone(),
                            kind: EdgeKind::Requires,
                            label: "Knows Info".to_string(),
                            inferred: true,
                            editable: true,
                            source_handle: OUT_FINISHED.to_string(),
                            target_handle: IN_CONDITION.to_string(),
                            expression: None,
                        }),
                        Some(_) => {},
                        None if synthesize_here => built.external(
                            format!("{EXTERNAL_PREFIX}knows-{consumer}-{dialog_ref}"),
                            ExternalNode {
                                label: format!("Knows {dialog_ref}"),
                                description: "Implicit prerequisite".to_string(),
                                expression: format!("Npc_KnowsInfo({npc}, {dialog_ref})"),
                            },
                            consumer,
                            "Unresolved knows-info",
                        ),
                        None => {},
                    }
                },
                Condition::Variable { .. } => {
                    let Some(check) = VarCheck::from_condition(cond) else {
                        continue;
                    };
                    variable_edges(&mut built, members, producers, &check, consumer, mis_name, synthesize_here);
                },
                Condition::NpcHasItems {
                    npc,
                    item,
                    operator,
                    value,
                } if synthesize_here && !item.trim().is_empty() => {
                    let mut expression = format!("{npc} has {item}");
                    if let (Some(op), Some(value)) = (operator, value) {
                        expression.push_str(&format!(" {op} {value}"));
                    }
                    built.external(
                        format!("{EXTERNAL_PREFIX}item-{consumer}-{npc}-{item}"),
                        ExternalNode {
                            label: item.clone(),
                            description: "Item possession prerequisite".to_string(),
                            expression,
                        },
                        consumer,
                        "Has item",
                    );
                },
                Condition::Predicate { condition } if synthesize_here => {
                    if let Some(name) = cond.predicate_name() {
                        built.external(
                            format!("{EXTERNAL_PREFIX}pred-{consumer}-{name}"),
                            ExternalNode {
                                label: name.to_string(),
                                description: "World state prerequisite".to_string(),
                                expression: condition.trim().to_string(),
                            },
                            consumer,
                            "World check",
                        );
                    }
                },
                _ => {},
            }
        }
    }

    built.edges.sort_by(|a, b| a.id.cmp(&b.id));
    built
}

/// One inferred edge per in-graph producer satisfying the check; an external node when the
/// model has no producer at all.
fn variable_edges(
    built: &mut BuiltEdges,
    members: &Members,
    producers: &ProducerIndex,
    check: &VarCheck<'_>,
    consumer: &str,
    mis_name: &str,
    synthesize: bool,
) {
    let is_quest_state = is_case_insensitive_match(check.variable, mis_name);
    let mut any_producer = false;

    for producer in producers.satisfying(check) {
        any_producer = true;
        let Some(source) = members.resolve(&producer.function) else {
            continue;
        };
        if source == consumer {
            continue;
        }
        let (kind, label) = if is_quest_state {
            (EdgeKind::Requires, check.label())
        } else {
            (EdgeKind::Dependency, format!("requires {}", check.label()))
        };
        built.push(QuestGraphEdge {
            id: format!("var-{}-{source}-{consumer}", producers.display_name(check.variable)),
            source: source.to_string(),
            target: consumer.to_string(),
            kind,
            label,
            inferred: true,
            editable: check.is_editable(),
            source_handle: OUT_STATE.to_string(),
            target_handle: IN_TRIGGER.to_string(),
            expression: check.expression(),
        });
    }

    if !any_producer && synthesize {
        let label = check.label();
        built.external(
            format!(
                "{EXTERNAL_PREFIX}cond-{consumer}-{}-{}",
                canonical_quest_key(check.variable),
                check.id_fragment()
            ),
            ExternalNode {
                label: label.clone(),
                description: "Unresolved condition source".to_string(),
                expression: label,
            },
            consumer,
            "Unresolved source",
        );
    }
}

/// Completes an external node with the layout fields every node carries.
pub(super) fn external_node(id: String, node: ExternalNode) -> QuestGraphNode {
    QuestGraphNode {
        id,
        kind: NodeKind::External,
        step: Some(NodeStep::Check),
        label: node.label,
        npc: EXTERNAL_NPC.to_string(),
        parent: Some(format!("{SWIMLANE_PREFIX}{EXTERNAL_NPC}")),
        description: node.description,
        expression: Some(node.expression),
        touches_selected_quest: false,
        rank: 0,
    }
}
