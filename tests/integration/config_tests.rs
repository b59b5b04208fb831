use figment::providers::Serialized;
use pathfingerprint::config::{Config, ConfigError};
use pathfingerprint::digest::DigestAlgorithm;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.algorithm, DigestAlgorithm::Sha1);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("PATHFP_TEST_ALGORITHM", "blake3");
    std::env::set_var("PATHFP_TEST_REPORT_QUEUE_DEPTH", "16");
    std::env::set_var("PATHFP_TEST_PROGRESS", "false");

    use figment::{providers::Env, Figment};
    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("PATHFP_TEST_"));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.algorithm, DigestAlgorithm::Blake3);
    assert_eq!(config.report_queue_depth, 16);
    assert!(!config.progress);

    std::env::remove_var("PATHFP_TEST_ALGORITHM");
    std::env::remove_var("PATHFP_TEST_REPORT_QUEUE_DEPTH");
    std::env::remove_var("PATHFP_TEST_PROGRESS");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
algorithm = "sha256"
catalog_dir = "/srv/catalogs"
read_buffer_size = 4096
"#,
    )
    .unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    assert_eq!(config.algorithm, DigestAlgorithm::Sha256);
    assert_eq!(config.catalog_dir, Some(PathBuf::from("/srv/catalogs")));
    assert_eq!(config.read_buffer_size, 4096);
    // Unset keys keep their defaults.
    assert_eq!(config.report_queue_depth, 1000);
    assert!(config.progress);
    assert_eq!(
        config.resolved_catalog_dir().unwrap(),
        PathBuf::from("/srv/catalogs")
    );
}

#[test]
fn test_config_unknown_algorithm_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "algorithm = \"md5\"\n").unwrap();

    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Extract(_))
    ));
}

#[test]
fn test_config_zero_buffer_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "read_buffer_size = 0\n").unwrap();

    assert!(matches!(
        Config::load(Some(&config_path)),
        Err(ConfigError::Invalid {
            key: "read_buffer_size",
            ..
        })
    ));
}

#[test]
fn test_config_missing_explicit_file() {
    let temp_dir = tempdir().unwrap();
    let err = Config::load(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}
