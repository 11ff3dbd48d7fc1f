use daedalus_data::{Action, SemanticModel};
use daedalus_quest as dq;
use dq::analysis::{LifecycleSource, LogicMethod, QuestStatus, ReferenceKind};
use dq::graph::{EdgeKind, NodeKind, NodeStep};
use dq::guardrails::GuardrailId;
use dq::{GraphOptions, QuestUsageIndex};

const QUEST: &str = "TOPIC_DRAGONHUNT";

fn dragonhunt() -> SemanticModel {
    let json = r#"{
        "dialogs": {
            "DIA_DragonHunt_Start": {
                "name": "DIA_DragonHunt_Start",
                "parent": "C_INFO",
                "properties": {
                    "npc": "PAL_200_Hagen",
                    "nr": 3,
                    "information": "DIA_DragonHunt_Start_Info",
                    "description": "\"I want to hunt dragons.\""
                },
                "filePath": "Story/Dialoge/DIA_PAL_200_Hagen.d"
            },
            "DIA_DragonHunt_Fail": {
                "name": "DIA_DragonHunt_Fail",
                "parent": "C_INFO",
                "properties": {
                    "npc": "PAL_200_Hagen",
                    "information": { "name": "DIA_DragonHunt_Fail_Info", "returnType": "VOID" },
                    "important": true
                },
                "filePath": "Story/Dialoge/DIA_PAL_200_Hagen.d"
            }
        },
        "functions": {
            "DIA_DragonHunt_Start_Info": {
                "name": "DIA_DragonHunt_Start_Info",
                "actions": [
                    { "type": "DialogLine", "speaker": "other", "text": "Dragons, you say?", "id": "DIA_DragonHunt_Start_15_00" },
                    { "type": "CreateTopic", "topic": "TOPIC_DRAGONHUNT", "topicType": "LOG_MISSION" },
                    { "type": "LogSetTopicStatus", "topic": "TOPIC_DRAGONHUNT", "status": "LOG_RUNNING" },
                    { "type": "LogEntry", "topic": "TOPIC_DRAGONHUNT", "text": "Hagen wants the dragons dead." }
                ],
                "filePath": "Story/Dialoge/DIA_PAL_200_Hagen.d"
            },
            "DIA_DragonHunt_Fail_Info": {
                "name": "DIA_DragonHunt_Fail_Info",
                "conditions": [
                    { "type": "VariableCondition", "variableName": "MIS_DRAGONHUNT", "operator": "==", "value": "LOG_RUNNING" }
                ],
                "actions": [
                    { "type": "LogSetTopicStatus", "topic": "TOPIC_DRAGONHUNT", "status": "LOG_FAILED" },
                    { "type": "LogEntry", "topic": "TOPIC_DRAGONHUNT", "text": "Too late." }
                ],
                "filePath": "Story/Dialoge/DIA_PAL_200_Hagen.d"
            }
        },
        "constants": {
            "TOPIC_DRAGONHUNT": { "name": "TOPIC_DRAGONHUNT", "type": "string", "value": "\"Dragon Hunt\"", "filePath": "Story/Log_Constants.d" }
        },
        "variables": {
            "MIS_DRAGONHUNT": { "name": "MIS_DRAGONHUNT", "type": "int", "filePath": "Story/Story_Globals.d" }
        }
    }"#;
    serde_json::from_str(json).expect("fixture parses")
}

#[test]
fn dragonhunt_is_implemented_through_the_topic_channel() {
    let model = dragonhunt();
    let analysis = dq::analyze_quest(&model, QUEST, None);

    assert_eq!(analysis.status, QuestStatus::Implemented);
    assert!(analysis.has_start);
    assert!(analysis.has_failed);
    assert!(!analysis.has_success && !analysis.has_obsolete);
    assert_eq!(analysis.lifecycle_source, LifecycleSource::Topic);
    assert!(!analysis.has_lifecycle_conflict);
    assert_eq!(analysis.logic_method, LogicMethod::Explicit);
    assert!(analysis.mis_variable_exists);
    assert_eq!(analysis.description, "Dragon Hunt");
    assert_eq!(analysis.file_paths.topic.as_deref(), Some("Story/Log_Constants.d"));
    assert_eq!(analysis.file_paths.variable.as_deref(), Some("Story/Story_Globals.d"));

    let index = QuestUsageIndex::build(&model);
    assert_eq!(dq::analyze_quest(&model, QUEST, Some(&index)), analysis);
}

#[test]
fn dragonhunt_references_name_their_dialogs() {
    let model = dragonhunt();
    let references = dq::get_quest_references(&model, QUEST, None);

    let conditions: Vec<_> = references
        .iter()
        .filter(|r| r.kind == ReferenceKind::Condition)
        .collect();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].function_name, "DIA_DragonHunt_Fail_Info");
    assert_eq!(conditions[0].dialog_name.as_deref(), Some("DIA_DragonHunt_Fail"));
    assert_eq!(conditions[0].npc_name.as_deref(), Some("PAL_200_Hagen"));
    assert!(references.iter().any(|r| r.kind == ReferenceKind::Create));
}

#[test]
fn dragonhunt_graph_links_start_to_failure() {
    let model = dragonhunt();
    let graph = dq::build_quest_graph(&model, QUEST, &GraphOptions::default());

    let start = graph.node("DIA_DragonHunt_Start_Info").expect("start node");
    assert_eq!(start.kind, NodeKind::State);
    assert_eq!(start.step, Some(NodeStep::Start));
    assert_eq!(start.label, "DIA_DragonHunt_Start");
    assert_eq!(start.parent.as_deref(), Some("swimlane-PAL_200_Hagen"));

    let fail = graph.node("DIA_DragonHunt_Fail_Info").expect("fail node");
    assert_eq!(fail.step, Some(NodeStep::Failed));
    assert!(fail.rank > start.rank);

    let edge = graph
        .edge("var-MIS_DRAGONHUNT-DIA_DragonHunt_Start_Info-DIA_DragonHunt_Fail_Info")
        .expect("requires edge from the topic start");
    assert_eq!(edge.kind, EdgeKind::Requires);
    assert_eq!(edge.label, "MIS_DRAGONHUNT == LOG_RUNNING");
    assert!(edge.editable);
    assert_eq!(graph.edges.len(), 1);

    let lanes: Vec<_> = graph.nodes.iter().filter(|n| n.kind.is_swimlane()).collect();
    assert_eq!(lanes.len(), 1);
}

#[test]
fn dropping_the_failed_status_is_a_regression() {
    let before = dragonhunt();
    let preserved = dq::analyze_quest_guardrails(&before, QUEST);
    assert_eq!(preserved.len(), 1);
    assert_eq!(preserved[0].id, GuardrailId::FailureStatusPreservation);

    let mut after = before.clone();
    after
        .functions
        .get_mut("DIA_DragonHunt_Fail_Info")
        .expect("fail function")
        .actions
        .retain(|action| !matches!(action, Action::LogSetTopicStatus { .. }));

    let warnings = dq::get_quest_guardrail_delta_warnings(&before, &after, QUEST);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].id, GuardrailId::FailureStatusRegression);
    assert_eq!(warnings[0].provenance.function_names, vec!["DIA_DragonHunt_Fail_Info"]);

    let analysis = dq::analyze_quest(&after, QUEST, None);
    assert_eq!(analysis.status, QuestStatus::Wip);
}
