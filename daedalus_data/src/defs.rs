use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a dialog, function, constant or variable exactly as written in the script.
pub type Symbol = String;

/// Folds a script identifier to the form used for every case-insensitive comparison.
///
/// Daedalus identifiers are case-insensitive, but the model keeps the original casing
/// so the code generator can write files back untouched.
pub fn canonical_key(value: &str) -> String {
    value.to_lowercase()
}

/// Top-level result of parsing one or more script files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SemanticModel {
    #[serde(default)]
    pub dialogs: BTreeMap<Symbol, Dialog>,
    #[serde(default)]
    pub functions: BTreeMap<Symbol, DialogFunction>,
    #[serde(default)]
    pub constants: BTreeMap<Symbol, GlobalSymbol>,
    #[serde(default)]
    pub variables: BTreeMap<Symbol, GlobalSymbol>,
}

/// Exact key first, then the first case-insensitive match in key order.
fn lookup<'a, T>(map: &'a BTreeMap<Symbol, T>, name: &str) -> Option<(&'a Symbol, &'a T)> {
    if let Some(entry) = map.get_key_value(name) {
        return Some(entry);
    }
    let wanted = canonical_key(name);
    map.iter().find(|(key, _)| canonical_key(key) == wanted)
}

impl SemanticModel {
    pub fn function(&self, name: &str) -> Option<&DialogFunction> {
        lookup(&self.functions, name).map(|(_, func)| func)
    }

    /// Returns the stored key for `name`, which may differ from it in casing.
    pub fn function_key(&self, name: &str) -> Option<&str> {
        lookup(&self.functions, name).map(|(key, _)| key.as_str())
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut DialogFunction> {
        let key = self.function_key(name)?.to_string();
        self.functions.get_mut(&key)
    }

    pub fn dialog(&self, name: &str) -> Option<&Dialog> {
        lookup(&self.dialogs, name).map(|(_, dialog)| dialog)
    }

    pub fn constant(&self, name: &str) -> Option<&GlobalSymbol> {
        lookup(&self.constants, name).map(|(_, symbol)| symbol)
    }

    pub fn variable(&self, name: &str) -> Option<&GlobalSymbol> {
        lookup(&self.variables, name).map(|(_, symbol)| symbol)
    }

    /// Finds the dialog whose `information` property points at `function_name`, with its key.
    pub fn information_owner(&self, function_name: &str) -> Option<(&Symbol, &Dialog)> {
        self.dialogs.iter().find(|(_, dialog)| {
            dialog
                .properties
                .information
                .as_ref()
                .is_some_and(|info| info.refers_to(function_name))
        })
    }

    /// Finds the dialog using `function_name` as either its information or condition function.
    ///
    /// Information ownership wins when both exist.
    pub fn owning_dialog(&self, function_name: &str) -> Option<(&Symbol, &Dialog)> {
        self.information_owner(function_name).or_else(|| {
            self.dialogs.iter().find(|(_, dialog)| {
                dialog
                    .properties
                    .condition
                    .as_ref()
                    .is_some_and(|cond| cond.refers_to(function_name))
            })
        })
    }
}

/// A `C_INFO` style dialog instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Dialog {
    pub name: Symbol,
    /// Class the instance derives from, usually `C_INFO`.
    #[serde(default, alias = "parent")]
    pub category: Option<String>,
    #[serde(default)]
    pub properties: DialogProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Dialog {
    pub fn npc(&self) -> Option<&str> {
        self.properties.npc.as_deref()
    }

    pub fn information_function(&self) -> Option<&str> {
        self.properties.information.as_ref().map(FunctionRef::function_name)
    }

    pub fn condition_function(&self) -> Option<&str> {
        self.properties.condition.as_ref().map(FunctionRef::function_name)
    }
}

/// Property bag of a dialog instance. Well-known keys are typed, everything else lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DialogProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc: Option<String>,
    /// Sort priority (`nr`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nr: Option<ScriptValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<FunctionRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information: Option<FunctionRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, PropertyValue>,
}

impl DialogProperties {
    pub fn priority(&self) -> Option<i64> {
        self.nr.as_ref().and_then(ScriptValue::as_integer)
    }
}

/// Any untyped dialog property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Scalar(ScriptValue),
    Function(FunctionDescriptor),
}

/// Reference from a dialog or choice to a function, either by bare name or as the
/// embedded descriptor the parser emits after linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionRef {
    Name(Symbol),
    Embedded(FunctionDescriptor),
}

impl FunctionRef {
    pub fn function_name(&self) -> &str {
        match self {
            FunctionRef::Name(name) => name,
            FunctionRef::Embedded(descriptor) => &descriptor.name,
        }
    }

    pub fn refers_to(&self, function_name: &str) -> bool {
        canonical_key(self.function_name()) == canonical_key(function_name)
    }
}

impl From<&str> for FunctionRef {
    fn from(name: &str) -> Self {
        FunctionRef::Name(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
    pub name: Symbol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

/// A script function with its decoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogFunction {
    pub name: Symbol,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    /// Execution order matters here.
    #[serde(default, deserialize_with = "lenient_list")]
    pub actions: Vec<Action>,
    /// Conjunction of guards; order carries no meaning for analysis.
    #[serde(default, deserialize_with = "lenient_list")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub calls: Vec<Symbol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Reads a statement list entry by entry, dropping entries the parser emitted in a shape
/// this model does not know. A malformed statement never costs the rest of the model.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry<T> {
        Known(T),
        Unknown(IgnoredAny),
    }

    let entries = Vec::<Entry<T>>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Known(item) => Some(item),
            Entry::Unknown(_) => None,
        })
        .collect())
}

fn default_return_type() -> String {
    "VOID".to_string()
}

impl DialogFunction {
    pub fn new(name: impl Into<Symbol>) -> Self {
        Self {
            name: name.into(),
            return_type: default_return_type(),
            actions: Vec::new(),
            conditions: Vec::new(),
            calls: Vec::new(),
            file_path: None,
        }
    }

    /// Every `Choice` action in execution order.
    pub fn choices(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().filter_map(|action| match action {
            Action::Choice {
                text, target_function, ..
            } => Some((text.as_str(), target_function.as_str())),
            _ => None,
        })
    }
}

/// One decoded statement of a function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename = "DialogLine")]
    DialogLine {
        #[serde(default)]
        speaker: String,
        #[serde(default)]
        text: String,
        #[serde(default)]
        id: String,
    },
    #[serde(rename = "CreateTopic", rename_all = "camelCase")]
    CreateTopic {
        #[serde(default)]
        topic: Symbol,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic_type: Option<String>,
    },
    #[serde(rename = "LogSetTopicStatus")]
    LogSetTopicStatus {
        #[serde(default)]
        topic: Symbol,
        #[serde(default)]
        status: ScriptValue,
    },
    #[serde(rename = "LogEntry")]
    LogEntry {
        #[serde(default)]
        topic: Symbol,
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "SetVariableAction", rename_all = "camelCase")]
    SetVariable {
        #[serde(default)]
        variable_name: Symbol,
        #[serde(default)]
        operator: AssignOp,
        #[serde(default)]
        value: ScriptValue,
    },
    #[serde(rename = "Choice", rename_all = "camelCase")]
    Choice {
        #[serde(default)]
        dialog_ref: String,
        #[serde(default)]
        text: String,
        #[serde(default)]
        target_function: Symbol,
    },
    #[serde(rename = "CreateInventoryItems")]
    CreateInventoryItems {
        #[serde(default)]
        target: String,
        #[serde(default)]
        item: String,
        #[serde(default)]
        quantity: i64,
    },
    #[serde(rename = "GiveInventoryItems")]
    GiveInventoryItems {
        #[serde(default)]
        giver: String,
        #[serde(default)]
        receiver: String,
        #[serde(default)]
        item: String,
        #[serde(default)]
        quantity: i64,
    },
    #[serde(rename = "AttackAction", rename_all = "camelCase")]
    Attack {
        #[serde(default)]
        attacker: String,
        #[serde(default)]
        target: String,
        #[serde(default)]
        attack_reason: String,
        #[serde(default)]
        damage: i64,
    },
    #[serde(rename = "SetAttitudeAction")]
    SetAttitude {
        #[serde(default)]
        target: String,
        #[serde(default)]
        attitude: String,
    },
    #[serde(rename = "ExchangeRoutineAction")]
    ExchangeRoutine {
        #[serde(default)]
        target: String,
        #[serde(default)]
        routine: String,
    },
    #[serde(rename = "ChapterTransitionAction")]
    ChapterTransition {
        #[serde(default)]
        chapter: i64,
        #[serde(default)]
        world: String,
    },
    /// Statement kept verbatim because the parser could not decompose it.
    #[serde(rename = "Action")]
    Custom {
        #[serde(default)]
        action: String,
    },
}

impl Action {
    /// Topic touched by journal actions (create, status, entry).
    pub fn topic(&self) -> Option<&str> {
        match self {
            Action::CreateTopic { topic, .. }
            | Action::LogSetTopicStatus { topic, .. }
            | Action::LogEntry { topic, .. } => Some(topic.as_str()),
            _ => None,
        }
    }

    /// Variable written by a `SetVariable` action.
    pub fn assigned_variable(&self) -> Option<&str> {
        match self {
            Action::SetVariable { variable_name, .. } => Some(variable_name.as_str()),
            _ => None,
        }
    }
}

/// One guard in a function's condition set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Condition {
    /// `MIS_X == LOG_RUNNING`, or a bare `flag` / `!flag` truthiness check when no operator is present.
    #[serde(rename = "VariableCondition", rename_all = "camelCase")]
    Variable {
        #[serde(default)]
        variable_name: Symbol,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<CompareOp>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ScriptValue>,
        #[serde(default)]
        negated: bool,
    },
    #[serde(rename = "NpcKnowsInfoCondition", rename_all = "camelCase")]
    NpcKnowsInfo {
        #[serde(default)]
        npc: String,
        #[serde(default)]
        dialog_ref: Symbol,
    },
    #[serde(rename = "NpcHasItemsCondition")]
    NpcHasItems {
        #[serde(default)]
        npc: String,
        #[serde(default)]
        item: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<CompareOp>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ScriptValue>,
    },
    /// Any other NPC or world predicate, kept as written.
    #[serde(rename = "Condition")]
    Predicate {
        #[serde(default)]
        condition: String,
    },
}

impl Condition {
    /// Variable read by a `Variable` condition, if it names one.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Condition::Variable { variable_name, .. } if !variable_name.trim().is_empty() => {
                Some(variable_name.as_str())
            },
            _ => None,
        }
    }

    /// Leading call name of an opaque predicate, e.g. `Npc_IsDead` for `Npc_IsDead(Bandit_01)`.
    pub fn predicate_name(&self) -> Option<&str> {
        match self {
            Condition::Predicate { condition } => {
                let trimmed = condition.trim().trim_start_matches('!').trim_start();
                let name = trimmed.split('(').next().unwrap_or_default().trim();
                if name.is_empty() { None } else { Some(name) }
            },
            _ => None,
        }
    }
}

/// Comparison operators accepted in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">=" => Some(CompareOp::Ge),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            _ => None,
        }
    }

    /// `==` and `!=` compare against one discrete value; the range operators do not.
    pub fn is_discrete(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    /// Applies the operator as `lhs <op> rhs`.
    #[allow(clippy::float_cmp)]
    pub fn evaluate(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Lt => lhs < rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment operators of `SetVariable` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AssignOp {
    #[default]
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Subtract,
    #[serde(rename = "*=")]
    Multiply,
    #[serde(rename = "/=")]
    Divide,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Subtract => "-=",
            AssignOp::Multiply => "*=",
            AssignOp::Divide => "/=",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "=" => Some(AssignOp::Assign),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Subtract),
            "*=" => Some(AssignOp::Multiply),
            "/=" => Some(AssignOp::Divide),
            _ => None,
        }
    }
}

/// Literal operand as the parser emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Default for ScriptValue {
    fn default() -> Self {
        ScriptValue::Text(String::new())
    }
}

impl ScriptValue {
    /// True for empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        matches!(self, ScriptValue::Text(text) if text.trim().is_empty())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Bool(_) => None,
            #[allow(clippy::cast_precision_loss)]
            ScriptValue::Int(n) => Some(*n as f64),
            ScriptValue::Float(n) => Some(*n),
            ScriptValue::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(n) => Some(*n),
            ScriptValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Bool(b) => write!(f, "{b}"),
            ScriptValue::Int(n) => write!(f, "{n}"),
            ScriptValue::Float(n) => write!(f, "{n}"),
            ScriptValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::Text(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::Text(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Int(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

/// Global constant or variable declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSymbol {
    pub name: Symbol,
    #[serde(default, rename = "type")]
    pub type_name: String,
    /// Initial value; constants always carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScriptValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_fall_back_to_case_insensitive_match() {
        let mut model = SemanticModel::default();
        model
            .functions
            .insert("DIA_Xardas_Hello_Info".into(), DialogFunction::new("DIA_Xardas_Hello_Info"));

        assert!(model.function("DIA_Xardas_Hello_Info").is_some());
        assert_eq!(model.function_key("dia_xardas_hello_info"), Some("DIA_Xardas_Hello_Info"));
        assert!(model.function("DIA_Unknown").is_none());
    }

    #[test]
    fn exact_key_wins_over_case_collision() {
        let mut model = SemanticModel::default();
        model.functions.insert("B_Func".into(), DialogFunction::new("B_Func"));
        model.functions.insert("b_func".into(), DialogFunction::new("b_func"));

        assert_eq!(model.function_key("b_func"), Some("b_func"));
        assert_eq!(model.function_key("B_FUNC"), Some("B_Func"));
    }

    #[test]
    fn function_ref_extracts_name_from_both_shapes() {
        let by_name: FunctionRef = serde_json::from_str(r#""DIA_A_Info""#).unwrap();
        let embedded: FunctionRef = serde_json::from_str(r#"{"name":"DIA_B_Info","returnType":"VOID"}"#).unwrap();

        assert_eq!(by_name.function_name(), "DIA_A_Info");
        assert_eq!(embedded.function_name(), "DIA_B_Info");
        assert!(embedded.refers_to("dia_b_info"));
    }

    #[test]
    fn parser_json_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "dialogs": {
                "DIA_Lares_Hallo": {
                    "name": "DIA_Lares_Hallo",
                    "parent": "C_INFO",
                    "properties": { "npc": "VLK_449_Lares", "nr": 1, "information": "DIA_Lares_Hallo_Info", "permanent": false, "trade": 0 }
                }
            },
            "functions": {
                "DIA_Lares_Hallo_Info": {
                    "name": "DIA_Lares_Hallo_Info",
                    "actions": [
                        { "type": "CreateTopic", "topic": "TOPIC_Lares", "topicType": "LOG_MISSION" },
                        { "type": "SetVariableAction", "variableName": "MIS_Lares", "operator": "=", "value": "LOG_RUNNING" }
                    ],
                    "conditions": [ { "type": "VariableCondition", "variableName": "Kapitel", "operator": ">=", "value": 2 } ]
                },
                "DIA_Empty": { "name": "DIA_Empty" }
            },
            "hasErrors": false
        }"#;

        let model: SemanticModel = serde_json::from_str(json).unwrap();
        let dialog = model.dialog("DIA_Lares_Hallo").unwrap();
        assert_eq!(dialog.category.as_deref(), Some("C_INFO"));
        assert_eq!(dialog.properties.priority(), Some(1));
        assert_eq!(dialog.information_function(), Some("DIA_Lares_Hallo_Info"));
        assert_eq!(dialog.properties.permanent, Some(false));
        assert!(dialog.properties.extra.contains_key("trade"));

        let empty = model.function("DIA_Empty").unwrap();
        assert!(empty.actions.is_empty() && empty.conditions.is_empty());
        assert_eq!(empty.return_type, "VOID");

        let info = model.function("DIA_Lares_Hallo_Info").unwrap();
        assert_eq!(info.actions[1].assigned_variable(), Some("MIS_Lares"));
        assert_eq!(info.conditions[0].variable(), Some("Kapitel"));
    }

    #[test]
    fn malformed_statements_are_dropped_without_losing_the_model() {
        let json = r#"{
            "functions": {
                "DIA_Bad_Info": {
                    "name": "DIA_Bad_Info",
                    "conditions": [
                        { "variableName": "MIS_Q", "value": "LOG_RUNNING" },
                        { "type": "VariableCondition", "variableName": "MIS_Q", "operator": "=<", "value": "LOG_RUNNING" },
                        { "type": "NpcKnowsInfoCondition", "npc": "other", "dialogRef": "DIA_Good" }
                    ],
                    "actions": [
                        { "type": "TeleportAction", "target": "self" },
                        { "type": "LogEntry", "topic": "TOPIC_Q", "text": "Still here." }
                    ]
                },
                "DIA_Good_Info": {
                    "name": "DIA_Good_Info",
                    "conditions": [ { "type": "VariableCondition", "variableName": "MIS_Q", "operator": "==", "value": "LOG_RUNNING" } ],
                    "actions": [ { "type": "LogSetTopicStatus", "topic": "TOPIC_Q", "status": "LOG_SUCCESS" } ]
                }
            }
        }"#;

        let model: SemanticModel = serde_json::from_str(json).unwrap();
        let bad = model.function("DIA_Bad_Info").unwrap();
        assert_eq!(bad.conditions.len(), 1);
        assert!(matches!(bad.conditions[0], Condition::NpcKnowsInfo { .. }));
        assert_eq!(bad.actions.len(), 1);
        assert_eq!(bad.actions[0].topic(), Some("TOPIC_Q"));

        let good = model.function("DIA_Good_Info").unwrap();
        assert_eq!(good.conditions[0].variable(), Some("MIS_Q"));
        assert_eq!(good.actions.len(), 1);
    }

    #[test]
    fn owning_dialog_prefers_information_over_condition() {
        let mut model = SemanticModel::default();
        let mut cond_owner = Dialog {
            name: "DIA_A".into(),
            ..Dialog::default()
        };
        cond_owner.properties.condition = Some("Shared_Func".into());
        let mut info_owner = Dialog {
            name: "DIA_B".into(),
            ..Dialog::default()
        };
        info_owner.properties.information = Some("shared_func".into());
        model.dialogs.insert("DIA_A".into(), cond_owner);
        model.dialogs.insert("DIA_B".into(), info_owner);

        let (key, _) = model.owning_dialog("SHARED_FUNC").unwrap();
        assert_eq!(key, "DIA_B");
        assert!(model.information_owner("Other").is_none());
    }

    #[test]
    fn predicate_name_strips_negation_and_arguments() {
        let cond = Condition::Predicate {
            condition: "!Npc_IsDead(Bandit_01)".into(),
        };
        assert_eq!(cond.predicate_name(), Some("Npc_IsDead"));
    }

    #[test]
    fn script_values_compare_through_display() {
        assert_eq!(ScriptValue::Int(2).to_string(), "2");
        assert_eq!(ScriptValue::from("LOG_FAILED").to_string(), "LOG_FAILED");
        assert_eq!(ScriptValue::from(" 3 ").as_number(), Some(3.0));
        assert!(ScriptValue::from("  ").is_blank());
    }
}
