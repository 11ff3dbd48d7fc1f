//! Swimlanes, layout ranks and reachability over a built graph.

use std::collections::{BTreeMap, BTreeSet};

use daedalus_data::SemanticModel;

use super::edges::{BuiltEdges, external_node};
use super::nodes::{Member, Members};
use super::{GLOBAL_NPC, NodeKind, QuestGraph, QuestGraphEdge, QuestGraphNode, SWIMLANE_PREFIX};

pub(super) fn assemble(model: &SemanticModel, members: Members, built: BuiltEdges) -> QuestGraph {
    let BuiltEdges { edges, externals } = built;

    let mut nodes: Vec<QuestGraphNode> = members
        .into_entries()
        .into_iter()
        .map(|(key, member)| function_node(model, key, member))
        .chain(externals.into_iter().map(|(id, node)| external_node(id, node)))
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let ranks = compute_ranks(nodes.iter().map(|node| node.id.as_str()), &edges);
    for node in &mut nodes {
        node.rank = ranks.get(&node.id).copied().unwrap_or_default();
    }

    let lanes: BTreeSet<String> = nodes.iter().map(|node| node.npc.clone()).collect();
    let mut all: Vec<QuestGraphNode> = lanes.into_iter().map(swimlane_node).collect();
    all.extend(nodes);

    QuestGraph { nodes: all, edges }
}

fn function_node(model: &SemanticModel, key: String, member: Member) -> QuestGraphNode {
    let label = model
        .information_owner(&key)
        .map_or_else(|| key.clone(), |(dialog, _)| dialog.clone());
    let npc = match model.owning_dialog(&key) {
        Some((_, dialog)) => dialog.npc().unwrap_or("Unknown").to_string(),
        None => GLOBAL_NPC.to_string(),
    };
    QuestGraphNode {
        id: key,
        kind: member.kind,
        step: Some(member.step),
        label,
        parent: Some(format!("{SWIMLANE_PREFIX}{npc}")),
        npc,
        description: member.description,
        expression: None,
        touches_selected_quest: member.touches,
        rank: 0,
    }
}

fn swimlane_node(npc: String) -> QuestGraphNode {
    QuestGraphNode {
        id: format!("{SWIMLANE_PREFIX}{npc}"),
        kind: NodeKind::Swimlane,
        step: None,
        label: npc.clone(),
        npc,
        parent: None,
        description: String::new(),
        expression: None,
        touches_selected_quest: false,
        rank: 0,
    }
}

/// Longest-path depth of every node from the graph's roots.
///
/// Nodes on the current path are skipped so a cycle `A -> B -> A` ends at the back-edge.
/// Each node remembers the deepest depth it was explored at and is only revisited when a
/// longer path reaches it, which keeps diamonds `A -> B -> D`, `A -> C -> D` fully ranked
/// without re-walking shallower paths.
fn compute_ranks<'a>(ids: impl Iterator<Item = &'a str>, edges: &'a [QuestGraphEdge]) -> BTreeMap<String, usize> {
    let ids: Vec<&str> = ids.collect();
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut has_incoming: BTreeSet<&str> = BTreeSet::new();
    for edge in edges {
        if edge.source != edge.target {
            adjacency.entry(&edge.source).or_default().insert(&edge.target);
            has_incoming.insert(&edge.target);
        }
    }

    let mut best = BTreeMap::new();
    let mut on_path = BTreeSet::new();
    let roots = ids.iter().filter(|id| !has_incoming.contains(*id));
    for &root in roots {
        deepen(root, 0, &adjacency, &mut on_path, &mut best);
    }
    // Whatever is left sits only on cycles.
    for &id in &ids {
        if !best.contains_key(id) {
            deepen(id, 0, &adjacency, &mut on_path, &mut best);
        }
    }
    best.into_iter().map(|(id, rank)| (id.to_string(), rank)).collect()
}

fn deepen<'a>(
    node: &'a str,
    depth: usize,
    adjacency: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    on_path: &mut BTreeSet<&'a str>,
    best: &mut BTreeMap<&'a str, usize>,
) {
    if on_path.contains(node) || best.get(node).is_some_and(|&seen| seen >= depth) {
        return;
    }
    best.insert(node, depth);
    on_path.insert(node);
    if let Some(next) = adjacency.get(node) {
        for &target in next {
            deepen(target, depth + 1, adjacency, on_path, best);
        }
    }
    on_path.remove(node);
}

/// Every node with a path into `id`, walking edges backwards with a visited set.
pub(super) fn upstream_of(edges: &[QuestGraphEdge], id: &str) -> BTreeSet<String> {
    let mut incoming: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in edges {
        incoming.entry(&edge.target).or_default().push(&edge.source);
    }

    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        for &source in incoming.get(current).into_iter().flatten() {
            if visited.insert(source) {
                stack.push(source);
            }
        }
    }
    visited.remove(id);
    visited.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKind;

    fn edge(source: &str, target: &str) -> QuestGraphEdge {
        QuestGraphEdge {
            id: format!("{source}-{target}"),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Transition,
            label: String::new(),
            inferred: false,
            editable: true,
            source_handle: String::new(),
            target_handle: String::new(),
            expression: None,
        }
    }

    #[test]
    fn mutual_toggle_terminates() {
        let edges = vec![edge("A", "B"), edge("B", "A")];
        let ranks = compute_ranks(["A", "B"].into_iter(), &edges);
        assert_eq!(ranks.get("A"), Some(&0));
        assert_eq!(ranks.get("B"), Some(&1));
    }

    #[test]
    fn diamond_is_fully_explored() {
        let edges = vec![edge("A", "B"), edge("A", "C"), edge("B", "D"), edge("C", "D"), edge("C", "E"), edge("E", "D")];
        let ranks = compute_ranks(["A", "B", "C", "D", "E"].into_iter(), &edges);
        assert_eq!(ranks.get("D"), Some(&3));
        assert_eq!(ranks.get("B"), Some(&1));
    }

    #[test]
    fn cycle_hanging_off_a_root_is_ranked() {
        let edges = vec![edge("R", "A"), edge("A", "B"), edge("B", "A"), edge("B", "C")];
        let ranks = compute_ranks(["A", "B", "C", "R"].into_iter(), &edges);
        assert_eq!((ranks["R"], ranks["A"], ranks["B"], ranks["C"]), (0, 1, 2, 3));
    }

    #[test]
    fn upstream_walk_survives_cycles() {
        let edges = vec![edge("A", "B"), edge("B", "A"), edge("X", "A"), edge("B", "C")];
        let upstream: Vec<_> = upstream_of(&edges, "C").into_iter().collect();
        assert_eq!(upstream, vec!["A", "B", "X"]);
        let around: Vec<_> = upstream_of(&edges, "A").into_iter().collect();
        assert_eq!(around, vec!["B", "X"]);
    }
}
