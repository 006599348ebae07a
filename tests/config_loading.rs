use std::io::Write;
use std::time::Duration;

use flowwatch_core::config::AppConfig;
use flowwatch_core::error::FlowwatchError;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write toml");
    tmp
}

#[test]
fn test_load_full_config_from_file() {
    let tmp = write_config(
        r#"
[engine]
base_url = "http://engine.internal:9000/"
timeout_secs = 10

[watch]
poll_interval_ms = 500
highlight_ms = 2000
notice_ms = 1000

[output]
summarizer_node_id = "summarizer-7"
output_node_type = "result"
trigger_node_type = "webhook"

[log]
file = "/tmp/flowwatch-test.log"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.timeout_secs, 10);
    assert_eq!(config.watch.poll_interval(), Duration::from_millis(500));
    assert_eq!(config.watch.highlight_duration(), Duration::from_secs(2));
    assert_eq!(config.watch.notice_duration(), Duration::from_secs(1));
    assert_eq!(config.output.summarizer_node_id, "summarizer-7");
    assert_eq!(config.output.output_node_type, "result");
    assert_eq!(config.output.trigger_node_type, "webhook");
    assert_eq!(
        config.log_file(),
        std::path::PathBuf::from("/tmp/flowwatch-test.log")
    );
}

#[test]
fn test_partial_config_uses_defaults() {
    let tmp = write_config(
        r#"
[watch]
highlight_ms = 5000
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.watch.poll_interval(), Duration::from_millis(1500));
    assert_eq!(config.watch.highlight_duration(), Duration::from_secs(5));
    assert_eq!(config.watch.notice_duration(), Duration::from_secs(3));
    assert_eq!(config.engine.timeout_secs, 30);
    assert_eq!(config.output.summarizer_node_id, "ai-agent-1");
    assert_eq!(config.output.output_node_type, "output");
    assert!(config.log.is_none());
}

#[test]
fn test_env_var_expansion_and_override() {
    std::env::set_var("FLOWWATCH_TEST_SUMMARIZER", "agent-from-env");
    std::env::set_var("FLOWWATCH_API_URL", "http://override:8000");

    let tmp = write_config(
        r#"
[engine]
base_url = "http://from-file:8000"

[output]
summarizer_node_id = "${FLOWWATCH_TEST_SUMMARIZER}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    std::env::remove_var("FLOWWATCH_TEST_SUMMARIZER");
    std::env::remove_var("FLOWWATCH_API_URL");

    assert_eq!(config.output.summarizer_node_id, "agent-from-env");
    assert_eq!(config.engine.base_url, "http://override:8000");
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let missing = dir.path().join("nope.toml");

    let err = AppConfig::load(&missing).unwrap_err();
    assert!(matches!(err, FlowwatchError::ConfigNotFound(_)));

    let config = AppConfig::load_or_default(&missing).expect("defaults");
    assert_eq!(config.watch.poll_interval(), Duration::from_millis(1500));
}

#[test]
fn test_invalid_values_are_rejected() {
    let tmp = write_config(
        r#"
[watch]
poll_interval_ms = 0
"#,
    );
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(FlowwatchError::Config(_))
    ));

    let tmp = write_config("[engine\nbase_url = ");
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(FlowwatchError::Config(_))
    ));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = AppConfig::default();
    let rendered = toml::to_string_pretty(&config).expect("serialize");
    assert!(rendered.contains("poll_interval_ms = 1500"));
    assert!(rendered.contains("summarizer_node_id = \"ai-agent-1\""));
}
