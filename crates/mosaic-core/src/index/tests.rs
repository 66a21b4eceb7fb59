//! Tests for nearest-neighbour search

use super::*;
use approx::assert_abs_diff_eq;
use mosaic_corpus::Corpus;

fn three_window_corpus() -> Corpus {
    let mut corpus = Corpus::new(2);
    corpus.push("a.wav", 0.0, &[0.0, 0.0]);
    corpus.push("a.wav", 1.0, &[1.0, 1.0]);
    corpus.push("b.wav", 0.0, &[10.0, 10.0]);
    corpus
}

#[test]
fn test_three_window_scenario() {
    let corpus = three_window_corpus();
    let index = NearestNeighborIndex::train(&corpus.table);

    let hits = index.search(&[0.9, 0.9], 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1);
    assert_abs_diff_eq!(hits[0].distance, 0.1414, epsilon = 1e-3);

    let all = index.search(&[0.9, 0.9], 3).unwrap();
    let ids: Vec<usize> = all.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 0, 2]);
    assert_abs_diff_eq!(all[1].distance, 1.2728, epsilon = 1e-3);
    assert_abs_diff_eq!(all[2].distance, 12.869, epsilon = 1e-2);
}

#[test]
fn test_ties_prefer_lowest_id() {
    let mut table = FeatureTable::new(1);
    table.push_row(&[2.0]);
    table.push_row(&[0.0]);
    table.push_row(&[2.0]);
    table.push_row(&[0.0]);
    let index = NearestNeighborIndex::train(&table);

    let ids: Vec<usize> = index
        .search(&[1.0], 4)
        .unwrap()
        .iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    let top: Vec<usize> = index.search(&[1.0], 2).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(top, vec![0, 1]);
}

#[test]
fn test_results_are_sorted_and_first_is_closest() {
    let mut table = FeatureTable::new(3);
    for i in 0..200 {
        let x = ((i * 37) % 101) as f32 / 10.0;
        let y = ((i * 53) % 97) as f32 / 10.0;
        table.push_row(&[x, y, x - y]);
    }
    let index = NearestNeighborIndex::train(&table);
    let query = [4.2, 3.3, 0.7];

    let hits = index.search(&query, 10).unwrap();
    assert_eq!(hits.len(), 10);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let best = hits[0].distance;
    for row in table.rows() {
        assert!(squared_distance(row, &query).sqrt() >= best);
    }
}

#[test]
fn test_parallel_scan_matches_sequential_order() {
    let mut table = FeatureTable::new(2);
    for i in 0..PARALLEL_THRESHOLD + 10 {
        table.push_row(&[(i % 50) as f32, (i / 50) as f32]);
    }
    let index = NearestNeighborIndex::train(&table);

    let hits = index.search(&[3.0, 7.0], 3).unwrap();
    assert_eq!(hits[0].id, 7 * 50 + 3);
    assert_eq!(hits[0].distance, 0.0);
    // Four neighbours at distance 1; the two lowest ids win.
    assert_eq!(hits[1].id, 6 * 50 + 3);
    assert_eq!(hits[2].id, 7 * 50 + 2);
}

#[test]
fn test_k_larger_than_index() {
    let index = NearestNeighborIndex::train(&three_window_corpus().table);
    assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
    assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn test_wrong_query_width_is_rejected() {
    let index = NearestNeighborIndex::train(&three_window_corpus().table);
    assert_eq!(
        index.search(&[0.0], 1).unwrap_err(),
        DimensionMismatch {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn test_explicit_labels() {
    let corpus = three_window_corpus();
    let index = NearestNeighborIndex::train_with_ids(&corpus.table, &[30, 20, 10]);
    assert_eq!(index.search(&[10.0, 10.0], 1).unwrap()[0].id, 10);
}
