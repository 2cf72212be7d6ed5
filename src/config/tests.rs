use super::*;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_reflex_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("REFLEX_MODEL_PATH");
        env::remove_var("REFLEX_QDRANT_URL");
        env::remove_var("REFLEX_RETRIEVAL_CACHE_MAX_SIZE");
        env::remove_var("REFLEX_BATCH_MAX_SIZE");
        env::remove_var("REFLEX_BATCH_TIMEOUT_MS");
        env::remove_var("REFLEX_CIRCUIT_FAILURE_THRESHOLD");
        env::remove_var("REFLEX_CHUNKER_DEFAULT_SIZE");
        env::remove_var("REFLEX_CHUNKER_DEFAULT_OVERLAP");
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(config.model_path.is_none());
    assert_eq!(config.qdrant_url, "http://localhost:6334");
    assert_eq!(config.retrieval_cache.max_size, 1_000);
    assert_eq!(config.batch.max_batch_size, 20);
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_reflex_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.qdrant_url, "http://localhost:6334");
    assert_eq!(config.circuit_breaker.failure_threshold, 5);
}

#[test]
#[serial]
fn test_from_env_custom_paths() {
    clear_reflex_env();

    with_env_vars(&[("REFLEX_MODEL_PATH", "/models/qwen3-8b-q4.gguf")], || {
        let config = Config::from_env().expect("should parse");

        assert_eq!(
            config.model_path,
            Some(PathBuf::from("/models/qwen3-8b-q4.gguf"))
        );
    });
}

#[test]
#[serial]
fn test_invalid_batch_max_size_not_number() {
    clear_reflex_env();

    with_env_vars(&[("REFLEX_BATCH_MAX_SIZE", "not_a_number")], || {
        let result = Config::from_env();
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::IntParseError { .. }
        ));
    });
}

#[test]
#[serial]
fn test_from_env_retrieval_cache_size() {
    clear_reflex_env();

    with_env_vars(&[("REFLEX_RETRIEVAL_CACHE_MAX_SIZE", "50000")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.retrieval_cache.max_size, 50_000);
    });
}

#[test]
#[serial]
fn test_from_env_circuit_breaker_overrides() {
    clear_reflex_env();

    with_env_vars(&[("REFLEX_CIRCUIT_FAILURE_THRESHOLD", "3")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
    });
}

#[test]
fn test_validate_nonexistent_model_path() {
    let config = Config {
        model_path: Some(PathBuf::from("/nonexistent/path/to/model.gguf")),
        ..Default::default()
    };

    let result = config.validate();
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), ConfigError::PathNotFound { .. }));
}

#[test]
fn test_validate_model_path_is_directory() {
    let config = Config {
        model_path: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src")),
        ..Default::default()
    };

    let result = config.validate();
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), ConfigError::NotAFile { .. }));
}

#[test]
fn test_validate_success_with_defaults() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_chunker_config_rejects_overlap_not_less_than_size() {
    let config = ChunkerConfig {
        default_chunk_size: 100,
        default_chunk_overlap: 100,
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_chunker_config_accepts_valid_overlap() {
    let config = ChunkerConfig {
        default_chunk_size: 100,
        default_chunk_overlap: 20,
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_error_messages_are_descriptive() {
    let err = ConfigError::PathNotFound {
        path: PathBuf::from("/some/path"),
    };
    assert!(err.to_string().contains("/some/path"));

    let err = ConfigError::MissingEnvVar {
        name: "REFLEX_MODEL_PATH",
    };
    assert!(err.to_string().contains("REFLEX_MODEL_PATH"));
}

#[test]
#[serial]
fn test_health_check_exclude_components_parses_csv() {
    clear_reflex_env();

    with_env_vars(
        &[("REFLEX_HEALTH_EXCLUDE_COMPONENTS", "a, b ,c")],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(
                config.health_check.exclude_components,
                vec!["a".to_string(), "b".to_string(), "c".to_string()]
            );
        },
    );
}

#[test]
#[serial]
fn test_auth_scopes_parses_csv() {
    clear_reflex_env();

    with_env_vars(&[("REFLEX_AUTH_SCOPES", "read,write")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(
            config.auth.scopes,
            vec!["read".to_string(), "write".to_string()]
        );
    });
}
