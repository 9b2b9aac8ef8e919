use super::*;
use tempfile::TempDir;

fn sample_index() -> VectorIndex {
    VectorIndex::build(&[
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 3.0],
        vec![1.0, 0.0],
    ])
    .expect("index builds")
}

#[test]
fn build_preserves_row_order() {
    let index = sample_index();

    assert_eq!(index.len(), 4);
    assert_eq!(index.dimension(), 2);
    assert_eq!(index.vector(2), Some([0.0, 3.0].as_slice()));
    assert_eq!(index.vector(4), None);
}

#[test]
fn build_rejects_ragged_embeddings() {
    let result = VectorIndex::build(&[vec![1.0, 2.0], vec![1.0]]);
    assert!(result.is_err());
}

#[test]
fn search_orders_by_distance_then_id() {
    let index = sample_index();

    let hits = index.search(&[1.0, 0.0], 3).expect("search succeeds");
    let ids: Vec<usize> = hits.iter().map(|hit| hit.chunk_id).collect();

    // Rows 1 and 3 are identical, the lower id wins the tie
    assert_eq!(ids, vec![1, 3, 0]);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[2].distance, 1.0);
}

#[test]
fn search_reports_squared_distances() {
    let index = sample_index();

    let hits = index.search(&[0.0, 0.0], 4).expect("search succeeds");
    let distances: Vec<f32> = hits.iter().map(|hit| hit.distance).collect();

    assert_eq!(distances, vec![0.0, 1.0, 1.0, 9.0]);
}

#[test]
fn search_returns_at_most_index_size() {
    let index = sample_index();

    let hits = index.search(&[0.0, 0.0], 100).expect("search succeeds");
    assert_eq!(hits.len(), 4);
}

#[test]
fn search_with_zero_k_is_empty() {
    let index = sample_index();
    assert!(index.search(&[0.0, 0.0], 0).expect("search succeeds").is_empty());
}

#[test]
fn search_rejects_wrong_query_dimension() {
    let index = sample_index();
    assert!(index.search(&[0.0, 0.0, 0.0], 1).is_err());
}

#[test]
fn empty_index_search_is_empty() {
    let index = VectorIndex::build(&[]).expect("empty index builds");

    assert!(index.is_empty());
    assert!(index.search(&[1.0], 3).expect("search succeeds").is_empty());
}

#[test]
fn byte_encoding_layout() {
    let index = VectorIndex::build(&[vec![1.5, -2.0]]).expect("index builds");
    let bytes = index.to_bytes();

    assert_eq!(&bytes[0..4], b"DQVI");
    assert_eq!(bytes.len(), HEADER_LEN + 2 * 4);
    assert_eq!(VectorIndex::from_bytes(&bytes).expect("decodes"), index);
}

#[test]
fn truncated_bytes_are_rejected() {
    let bytes = sample_index().to_bytes();

    assert!(VectorIndex::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    assert!(VectorIndex::from_bytes(&bytes[..10]).is_err());
}

#[test]
fn foreign_bytes_are_rejected() {
    let mut bytes = sample_index().to_bytes();
    bytes[0] = b'X';
    assert!(VectorIndex::from_bytes(&bytes).is_err());

    let mut bytes = sample_index().to_bytes();
    bytes[4] = 99;
    assert!(VectorIndex::from_bytes(&bytes).is_err());
}

#[test]
fn persist_and_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("vector_db").join("index.bin");
    let index = sample_index();

    index.persist(&path).expect("index persists");
    let loaded = VectorIndex::load(&path).expect("index loads");

    assert_eq!(loaded, index);
    assert_eq!(
        loaded.search(&[0.0, 3.0], 1).expect("search succeeds")[0].chunk_id,
        2
    );
}
