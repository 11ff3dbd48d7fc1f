//! Quest reconstruction and editing engine for Daedalus dialog scripts.
//!
//! Every entry point is a pure function over a [`daedalus_data::SemanticModel`] snapshot.
//! Edits produce new snapshots; indexes and graphs are rebuilt from them, never patched.
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod analysis;
pub mod command;
pub mod config;
pub mod graph;
pub mod guardrails;
pub mod identity;
pub mod service;
pub mod usage;

// Re-exports for convenience
pub use analysis::{QuestAnalysis, analyze_quest, get_quest_references, list_quest_topics};
pub use command::{CommandContext, CommandResult, QuestCommand, execute_quest_command};
pub use config::EngineConfig;
pub use graph::{GraphOptions, QuestGraph, build_quest_graph};
pub use guardrails::{QuestGuardrailWarning, analyze_quest_guardrails, get_quest_guardrail_delta_warnings};
pub use identity::{LifecycleState, TopicFilterPolicy, canonical_quest_key, quest_mis_variable_name};
pub use service::QuestEditingService;
pub use usage::QuestUsageIndex;
