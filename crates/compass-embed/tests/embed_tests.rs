use compass_core::config::EmbeddingSettings;
use compass_embed::{get_default_embedder, Embedder, FakeEmbedder, FAKE_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { model_dir: None, use_fake: true };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), FAKE_DIM);
    assert_eq!(embedder.dim(), FAKE_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_are_closer_than_disjoint_ones() {
    let e = FakeEmbedder::new(256);
    let q = e.embed_one("required textbook").expect("embed");
    let near = e.embed_one("the required textbook for the course").expect("embed");
    let far = e.embed_one("lab safety goggles").expect("embed");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_still_has_unit_length() {
    let e = FakeEmbedder::new(8);
    let v = e.embed_one("   ").expect("embed");
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
    assert!(e.embed_batch(&[]).expect("empty batch").is_empty());
}
