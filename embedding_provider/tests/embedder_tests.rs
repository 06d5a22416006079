use embedding_provider::config::{default_hash_config, default_onnx_config, ONNX_LOCAL_DEFAULTS};
use embedding_provider::embedder::{
    Embedder, EmbedderError, HashEmbedder, HashEmbedderConfig, OnnxLocalEmbedder, ProviderKind,
};

fn hash_config(dimension: usize) -> HashEmbedderConfig {
    HashEmbedderConfig {
        dimension,
        max_input_length: 1024,
        model_id: "test-hash".into(),
    }
}

fn assert_vectors_close(lhs: &[f32], rhs: &[f32]) {
    assert_eq!(lhs.len(), rhs.len(), "vector lengths differ");
    for (index, (a, b)) in lhs.iter().zip(rhs.iter()).enumerate() {
        let diff = (a - b).abs();
        assert!(
            diff <= 1e-6,
            "vectors diverge at position {index}: {a} vs {b} (diff {diff})"
        );
    }
}

#[test]
fn hash_embedder_is_deterministic_per_model_id() {
    let embedder = HashEmbedder::new(hash_config(64)).expect("configuration is valid");
    let sentence = "Polls open at 6:00 a.m. on Election Day.";

    let a = embedder.embed(sentence).expect("first embedding succeeds");
    let b = embedder.embed(sentence).expect("second embedding succeeds");
    assert_eq!(a.len(), 64);
    assert_vectors_close(&a, &b);
    assert!(a.iter().any(|component| component.abs() > 1e-3));

    let other = embedder.embed("a different sentence").unwrap();
    assert!(a.iter().zip(other.iter()).any(|(x, y)| (x - y).abs() > 1e-3));
}

#[test]
fn different_model_ids_seed_different_spaces() {
    let a = HashEmbedder::new(hash_config(16)).unwrap();
    let mut other = hash_config(16);
    other.model_id = "another-model".into();
    let b = HashEmbedder::new(other).unwrap();

    let va = a.embed("same text").unwrap();
    let vb = b.embed("same text").unwrap();
    assert!(va.iter().zip(vb.iter()).any(|(x, y)| (x - y).abs() > 1e-3));
}

#[test]
fn embed_batch_matches_individual_embeddings() {
    let embedder = HashEmbedder::new(hash_config(32)).unwrap();
    let inputs = [
        "embeddings unlock semantic search",
        "hybrid ranking mixes bm25 and vectors",
    ];
    let batch = embedder.embed_batch(&inputs).expect("batch embedding succeeds");
    assert_eq!(batch.len(), inputs.len());
    for (input, batch_vector) in inputs.iter().zip(batch.iter()) {
        let single = embedder.embed(input).expect("single embedding succeeds");
        assert_vectors_close(&single, batch_vector);
    }

    let empty: [&str; 0] = [];
    assert!(embedder.embed_batch(&empty).unwrap().is_empty());
}

#[test]
fn enforcing_max_input_length_returns_error() {
    let mut config = hash_config(8);
    config.max_input_length = 8;
    let embedder = HashEmbedder::new(config).unwrap();

    let err = embedder
        .embed("rust rust rust rust")
        .expect_err("inputs exceeding max length should fail");
    match err {
        EmbedderError::InputTooLong {
            max_length,
            actual_length,
        } => {
            assert_eq!(max_length, 8);
            assert!(actual_length > max_length);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn provider_metadata_is_reported() {
    let embedder = HashEmbedder::new(default_hash_config()).unwrap();
    let info = embedder.info();
    assert_eq!(info.provider, ProviderKind::SeededHash);
    assert_eq!(info.dimension, ONNX_LOCAL_DEFAULTS.embedding_dimension);
    assert!(info.model_id.ends_with("-hash"));
}

#[test]
fn zero_dimension_is_rejected() {
    let err = HashEmbedder::new(hash_config(0)).unwrap_err();
    assert!(matches!(err, EmbedderError::InvalidConfiguration { .. }));
}

#[test]
fn onnx_embedder_rejects_missing_assets() {
    let mut config = default_onnx_config();
    config.runtime_library_path = std::path::PathBuf::from("does/not/exist.so");
    let err = OnnxLocalEmbedder::new(config).expect_err("missing runtime should fail");
    assert!(matches!(err, EmbedderError::InvalidConfiguration { .. }));
}
