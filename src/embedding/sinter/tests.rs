use super::*;

mod config_tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::path::PathBuf;

    #[test]
    fn test_sinter_config_default_is_stub() {
        let config = SinterConfig::default();
        assert_eq!(config.embedding_dim, SINTER_EMBEDDING_DIM);
        assert_eq!(config.max_seq_len, SINTER_MAX_SEQ_LEN);
        assert!(config.testing_stub);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn test_sinter_config_new_sets_model_path() {
        let config = SinterConfig::new("/models/local-embedder.bin");
        assert_eq!(
            config.model_path,
            Some(PathBuf::from("/models/local-embedder.bin"))
        );
        assert!(!config.testing_stub);
    }

    #[test]
    fn test_sinter_config_stub() {
        let config = SinterConfig::stub();
        assert!(config.testing_stub);
        assert!(config.model_path.is_none());
        assert_eq!(config.embedding_dim, SINTER_EMBEDDING_DIM);
    }

    #[test]
    #[serial]
    fn test_from_env_without_model_path_is_stub() {
        // SAFETY: test code, accepted thread-safety risk.
        unsafe { env::remove_var(SinterConfig::ENV_MODEL_PATH) };
        let config = SinterConfig::from_env().unwrap();
        assert!(config.testing_stub);
        assert!(config.model_path.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_with_model_path_disables_stub() {
        // SAFETY: test code, accepted thread-safety risk.
        unsafe { env::set_var(SinterConfig::ENV_MODEL_PATH, "/models/local-embedder.bin") };
        let config = SinterConfig::from_env().unwrap();
        assert!(!config.testing_stub);
        assert_eq!(
            config.model_path,
            Some(PathBuf::from("/models/local-embedder.bin"))
        );
        // SAFETY: test code, accepted thread-safety risk.
        unsafe { env::remove_var(SinterConfig::ENV_MODEL_PATH) };
    }

    #[test]
    fn test_validate_rejects_zero_dim() {
        let config = SinterConfig {
            embedding_dim: 0,
            ..SinterConfig::stub()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_nonstub_missing_path_errors() {
        let config = SinterConfig {
            model_path: Some(PathBuf::from("/nonexistent/local-embedder.bin")),
            testing_stub: false,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EmbeddingError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_model_available_false_without_path() {
        let config = SinterConfig::stub();
        assert!(!config.model_available());
    }
}

mod embedder_tests {
    use super::*;

    #[test]
    fn test_load_with_stub_config_succeeds() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        assert!(embedder.is_stub());
        assert_eq!(embedder.embedding_dim(), SINTER_EMBEDDING_DIM);
    }

    #[test]
    fn test_embed_produces_expected_dimension() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        let v = embedder.embed("hello world").unwrap();
        assert_eq!(v.len(), SINTER_EMBEDDING_DIM);
    }

    #[test]
    fn test_embed_is_normalized() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        let v = embedder.embed("hello world").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embed_is_deterministic() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        let a = embedder.embed("same text").unwrap();
        let b = embedder.embed("same text").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_embed_differs_for_different_text() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        let a = embedder.embed("alpha").unwrap();
        let b = embedder.embed("beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_embed_batch_matches_individual_calls() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        let batch = embedder.embed_batch(&["one", "two"]).unwrap();
        let one = embedder.embed("one").unwrap();
        let two = embedder.embed("two").unwrap();
        assert_eq!(batch, vec![one, two]);
    }

    #[test]
    fn test_embed_batch_empty_input() {
        let embedder = SinterEmbedder::load(SinterConfig::stub()).unwrap();
        let batch = embedder.embed_batch(&[]).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_load_with_missing_nonstub_model_path_fails() {
        let config = SinterConfig {
            model_path: Some(std::path::PathBuf::from("/nonexistent/local-embedder.bin")),
            testing_stub: false,
            ..Default::default()
        };
        assert!(SinterEmbedder::load(config).is_err());
    }

    #[test]
    fn test_custom_embedding_dim_is_respected() {
        let config = SinterConfig {
            embedding_dim: 8,
            ..SinterConfig::stub()
        };
        let embedder = SinterEmbedder::load(config).unwrap();
        assert_eq!(embedder.embed("x").unwrap().len(), 8);
    }
}
