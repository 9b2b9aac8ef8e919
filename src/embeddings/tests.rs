use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct LetterCounts;

impl EmbeddingModel for LetterCounts {
    fn model_id(&self) -> &str {
        "letter-counts"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; 26];
                for c in text.to_ascii_lowercase().bytes() {
                    if c.is_ascii_lowercase() {
                        vector[usize::from(c - b'a')] += 1.0;
                    }
                }
                vector
            })
            .collect())
    }
}

struct Misbehaving {
    drop_last: bool,
}

impl EmbeddingModel for Misbehaving {
    fn model_id(&self) -> &str {
        "misbehaving"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Vec<f32>> = texts
            .iter()
            .enumerate()
            .map(|(i, _)| vec![1.0; if self.drop_last { 3 } else { 3 + i }])
            .collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn encode_preserves_order_and_count() {
    let encoder = EmbeddingEncoder::new(Arc::new(LetterCounts));

    let vectors = encoder
        .encode(&texts(&["aaa", "b", "zz"]))
        .expect("encoding succeeds");

    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0][0], 3.0);
    assert_eq!(vectors[1][1], 1.0);
    assert_eq!(vectors[2][25], 2.0);
}

#[test]
fn query_encoding_matches_batch_encoding() {
    let encoder = EmbeddingEncoder::new(Arc::new(LetterCounts));

    let batch = encoder
        .encode(&texts(&["Alpha Beta"]))
        .expect("encoding succeeds");
    let query = encoder.encode_query("Alpha Beta").expect("query encodes");

    assert_eq!(batch[0], query);
}

#[test]
fn empty_input_does_not_load_model() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let encoder = EmbeddingEncoder::lazy(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(LetterCounts) as Arc<dyn EmbeddingModel>)
    });

    assert!(encoder.encode(&[]).expect("empty input").is_empty());
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[test]
fn lazy_model_is_initialized_once() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let encoder = EmbeddingEncoder::lazy(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(LetterCounts) as Arc<dyn EmbeddingModel>)
    });

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                encoder.encode_query("concurrent").expect("query encodes");
            });
        }
    });
    encoder.encode(&texts(&["again"])).expect("encoding succeeds");

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(
        encoder.model_id().expect("model is loaded"),
        "letter-counts"
    );
}

#[test]
fn failed_initialization_is_retried_on_next_call() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let encoder = EmbeddingEncoder::lazy(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("ollama is not running");
        }
        Ok(Arc::new(LetterCounts) as Arc<dyn EmbeddingModel>)
    });

    let first = encoder.encode_query("hello");
    assert!(matches!(first, Err(RagError::Embedding(message)) if message.contains("ollama is not running")));

    encoder.encode_query("hello").expect("second attempt loads the model");
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn count_mismatch_is_rejected() {
    let encoder = EmbeddingEncoder::new(Arc::new(Misbehaving { drop_last: true }));

    let result = encoder.encode(&texts(&["one", "two"]));
    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[test]
fn ragged_dimensions_are_rejected() {
    let encoder = EmbeddingEncoder::new(Arc::new(Misbehaving { drop_last: false }));

    let result = encoder.encode(&texts(&["one", "two"]));
    assert!(matches!(result, Err(RagError::Embedding(message)) if message.contains("dimensions")));
}
