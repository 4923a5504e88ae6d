use std::{env, fs};

use kubeteach_controller::config::loader::load_config;
use kubeteach_controller::{ConfigError, UpdateStrategy};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("kubeteach.toml");

    let toml_content = r#"
[controller]
requeue_interval_secs = 5
update_strategy = "separate"
reconcile_timeout_secs = 0
error_backoff_base_ms = 100
error_backoff_max_ms = 2000

[logging]
level = "debug"

[seed]
manifests_dir = "manifests"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.controller.requeue_interval_secs, 5);
    assert_eq!(cfg.controller.update_strategy, UpdateStrategy::Separate);
    assert!(cfg.controller.reconcile_timeout().is_none());
    assert_eq!(cfg.controller.error_backoff_max_ms, 2000);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(
        cfg.seed.manifests_dir.as_deref(),
        Some(std::path::Path::new("manifests"))
    );

    // 2) Env override should win over file
    unsafe {
        env::set_var("KUBETEACH__CONTROLLER__REQUEUE_INTERVAL_SECS", "9");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.controller.requeue_interval_secs, 9);
    unsafe {
        env::remove_var("KUBETEACH__CONTROLLER__REQUEUE_INTERVAL_SECS");
    }

    // 3) Missing file falls back to defaults
    let missing = dir.path().join("absent.toml");
    let cfg_default = load_config(missing.to_str()).expect("defaults");
    assert_eq!(cfg_default.controller.requeue_interval_secs, 10);
    assert_eq!(cfg_default.controller.update_strategy, UpdateStrategy::Combined);
    assert_eq!(cfg_default.logging.level, "info");

    // 4) Invalid config (base > max backoff) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[controller]
error_backoff_base_ms = 5000
error_backoff_max_ms = 100
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("error_backoff_base_ms must be <="));

    // 5) Unknown strategy does not deserialize
    let bad_strategy = dir.path().join("strategy.toml");
    fs::write(&bad_strategy, "[controller]\nupdate_strategy = \"atomic\"\n").unwrap();
    let err = load_config(bad_strategy.to_str()).expect_err("expected deserialize error");
    assert!(matches!(err, ConfigError::Deserialize(_)));
}
