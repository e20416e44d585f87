use std::io::Write;

use atelier_core::config::AppConfig;

#[test]
fn loads_minimal_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[model]
model = "gpt-4o-mini"
"#
    )
    .unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.model.model, "gpt-4o-mini");
    assert_eq!(config.engine.max_steps, 1000);
    assert_eq!(config.reflection.db_path, "reflections.json");
}

#[test]
fn loads_overridden_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[model]
base_url = "http://localhost:11434/v1"
model = "llama3"
temperature = 0.4

[reflection]
db_path = "state/reflections.json"

[engine]
max_steps = 32
"#
    )
    .unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.model.base_url, "http://localhost:11434/v1");
    assert_eq!(config.model.temperature, Some(0.4));
    assert_eq!(config.reflection.db_path, "state/reflections.json");
    assert_eq!(config.engine.max_steps, 32);
}

#[test]
fn missing_config_file_is_an_error() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/atelier.toml")).unwrap_err();
    assert!(err.to_string().contains("config error"));
}
