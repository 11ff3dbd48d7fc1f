use anyhow::Result;
use daedalus_quest as dq;
use dq::config::EngineConfig;
use dq::guardrails::{GuardrailId, GuardrailPolicy};
use dq::identity::TopicFilterPolicy;
use std::fs;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn config_is_loaded_from_disk() -> Result<()> {
    init_logging();
    let dir = tempdir()?;
    let path = dir.path().join("quest_engine.toml");
    fs::write(
        &path,
        r#"
topic_filter = "missions_only"

[graph]
showExternalConditions = false

[guardrails.multi-topic-side-effects]
blocking = true
"#,
    )?;

    let config = EngineConfig::try_load(&path)?;
    assert_eq!(config.topic_filter, TopicFilterPolicy::MissionsOnly);
    assert!(!config.graph.show_external_conditions);
    assert!(!config.graph.hide_inferred_edges);
    assert!(GuardrailPolicy::for_id(GuardrailId::MultiTopicSideEffects, &config).blocking);
    assert_eq!(EngineConfig::load(&path), config);
    Ok(())
}

#[test]
fn missing_file_falls_back_to_defaults() -> Result<()> {
    init_logging();
    let dir = tempdir()?;
    let path = dir.path().join("absent.toml");

    assert!(EngineConfig::try_load(&path).is_err());
    assert_eq!(EngineConfig::load(&path), EngineConfig::default());
    Ok(())
}

#[test]
fn invalid_file_falls_back_to_defaults() -> Result<()> {
    init_logging();
    let dir = tempdir()?;
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[guardrails.not-a-guardrail]\nblocking = false\n")?;

    let err = EngineConfig::try_load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("not-a-guardrail"));
    assert_eq!(EngineConfig::load(&path), EngineConfig::default());
    Ok(())
}
