use docrag_core::config::Settings;
use docrag_embed::{get_default_embedder, Embedder, HashEmbedder};

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Select the hashing embedder to avoid loading model weights
    let settings = Settings { use_fake_embeddings: true, ..Settings::default() };

    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(embedder.dim(), 1024);
    assert_eq!(embedder.name(), "hash-xxh64");
    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hash_embedder_preserves_batch_order() {
    let embedder = HashEmbedder::new(64);
    let texts = vec!["alpha".to_string(), "bravo".to_string(), "charlie".to_string()];
    let batch = embedder.embed_batch(&texts).expect("batch");
    for (i, text) in texts.iter().enumerate() {
        let single = embedder.embed_batch(&[text.clone()]).expect("single");
        assert_eq!(batch[i], single[0]);
    }
}

#[test]
fn hash_embedder_shared_tokens_score_positive() {
    let embedder = HashEmbedder::new(256);
    let texts = vec![
        "The sky is blue.".to_string(),
        "Sky color".to_string(),
    ];
    let embs = embedder.embed_batch(&texts).expect("embed");
    let related = dot(&embs[0], &embs[1]);
    assert!(related > 0.0, "shared token 'sky' gives positive similarity");
    assert!(related <= 1.0 + 1e-5);
}

#[test]
fn hash_embedder_empty_text_is_zero_vector() {
    let embedder = HashEmbedder::new(8);
    let embs = embedder.embed_batch(&[String::new()]).expect("embed");
    assert!(embs[0].iter().all(|x| *x == 0.0));
}
