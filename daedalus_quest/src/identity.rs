//! Quest identity rules.
//!
//! A quest is named by its topic constant (`TOPIC_Dragonhunt`). Its optional state variable
//! replaces the topic prefix with `MIS_`. Every component compares quest tokens through
//! [`canonical_quest_key`] so they cannot disagree about what "the same quest" means.

use daedalus_data::{ScriptValue, canonical_key};
use serde::{Deserialize, Serialize};
use variantly::Variantly;

const TOPIC_PREFIX: &str = "topic_";
const MIS_PREFIX: &str = "MIS_";

/// Canonical form of a quest token, topic, or variable name.
pub fn canonical_quest_key(value: &str) -> String {
    canonical_key(value)
}

/// Case-insensitive equality. Empty strings never match.
pub fn is_case_insensitive_match(left: &str, right: &str) -> bool {
    !left.is_empty() && !right.is_empty() && canonical_quest_key(left) == canonical_quest_key(right)
}

/// Derives the state variable name for a topic, e.g. `Topic_Bandits` -> `MIS_Bandits`.
///
/// Names without a topic prefix are returned unchanged.
pub fn quest_mis_variable_name(topic: &str) -> String {
    match topic.get(..TOPIC_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(TOPIC_PREFIX) => {
            format!("{MIS_PREFIX}{}", &topic[TOPIC_PREFIX.len()..])
        },
        _ => topic.to_string(),
    }
}

pub fn is_mis_variable(name: &str) -> bool {
    name.get(..MIS_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MIS_PREFIX))
}

/// Which topic constants count as quests when listing them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicFilterPolicy {
    /// Only `TOPIC_` constants.
    MissionsOnly,
    /// `TOPIC_` plus the lowercase-prefixed `Topic_` notes.
    #[default]
    MissionsAndNotes,
}

impl TopicFilterPolicy {
    pub fn is_quest_topic_constant(self, constant_name: &str) -> bool {
        if constant_name.starts_with("TOPIC_") {
            return true;
        }
        self == TopicFilterPolicy::MissionsAndNotes && constant_name.starts_with("Topic_")
    }
}

/// Lifecycle state normalized from a status literal or its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Variantly)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Running,
    Success,
    Failed,
    Obsolete,
    /// Touched, but with a value we cannot classify.
    Unknown,
}

impl LifecycleState {
    pub fn normalize(value: &ScriptValue) -> Self {
        Self::normalize_str(&value.to_string())
    }

    pub fn normalize_str(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "LOG_RUNNING" | "1" => LifecycleState::Running,
            "LOG_SUCCESS" | "2" => LifecycleState::Success,
            "LOG_FAILED" | "3" => LifecycleState::Failed,
            "LOG_OBSOLETE" | "4" => LifecycleState::Obsolete,
            _ => LifecycleState::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Success | LifecycleState::Failed | LifecycleState::Obsolete
        )
    }

    /// Failed and obsolete both end the quest unsuccessfully.
    pub fn is_failure(self) -> bool {
        matches!(self, LifecycleState::Failed | LifecycleState::Obsolete)
    }

    /// Integer code the scripts use for this state.
    pub fn code(self) -> Option<i64> {
        match self {
            LifecycleState::Running => Some(1),
            LifecycleState::Success => Some(2),
            LifecycleState::Failed => Some(3),
            LifecycleState::Obsolete => Some(4),
            LifecycleState::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Running => "running",
            LifecycleState::Success => "success",
            LifecycleState::Failed => "failed",
            LifecycleState::Obsolete => "obsolete",
            LifecycleState::Unknown => "unknown",
        }
    }
}

/// Canonical comparison string for a value assigned to or compared against a quest variable.
///
/// Lifecycle literals collapse to their integer code so `LOG_RUNNING` and `1` compare equal.
pub fn lifecycle_value_key(value: &ScriptValue) -> String {
    match LifecycleState::normalize(value).code() {
        Some(code) => code.to_string(),
        None => value.to_string().trim().to_string(),
    }
}
