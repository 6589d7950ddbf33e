use std::collections::BTreeSet;

use smartcore::dataset::iris;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::builder::KnnGraphBuilder;
use crate::core::PointSet;
use crate::distance::DistanceKind;
use crate::error::GraphError;
use crate::graph::{KnnGraph, NO_NEIGHBOR};
use crate::progress::ProgressTracker;
use crate::tests::test_data::{
    blob_centers, brute_force_knn, gaussian_blobs, line_points, random_unit_vectors,
};
use crate::tests::TEST_SEED;

/// Universal output invariants: entries in `[0, n) ∪ {−1}`, never the point
/// itself, non-sentinel entries pairwise distinct.
fn assert_invariants(graph: &KnnGraph, n: usize) {
    assert_eq!(graph.npoints(), n);
    for i in 0..n {
        let mut seen = BTreeSet::new();
        for &j in graph.column(i) {
            if j == NO_NEIGHBOR {
                continue;
            }
            assert!(j >= 0 && (j as usize) < n, "column {} holds out-of-range {}", i, j);
            assert_ne!(j as usize, i, "column {} contains the point itself", i);
            assert!(seen.insert(j), "column {} holds duplicate {}", i, j);
        }
    }
}

fn column_set(graph: &KnnGraph, i: usize) -> BTreeSet<usize> {
    graph.neighbors(i).collect()
}

/// Graph neighbor of `i` with the smallest recomputed distance.
fn nearest(graph: &KnnGraph, points: &PointSet, distance: DistanceKind, i: usize) -> usize {
    graph
        .neighbors(i)
        .min_by(|&a, &b| {
            distance
                .eval(points.point(i), points.point(a))
                .total_cmp(&distance.eval(points.point(i), points.point(b)))
        })
        .expect("empty neighbor column")
}

#[test]
fn trivial_square_plus_outlier() {
    let points = PointSet::from_points(vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![10.0, 10.0],
    ]);
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(5)
        .with_trees(3)
        .with_neighbors(2)
        .with_max_depth(4)
        .with_refine_iters(1)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();

    assert_eq!((graph.k(), graph.npoints()), (2, 4));
    assert_invariants(&graph, 4);
    assert!(graph.column(3).iter().all(|&j| j != NO_NEIGHBOR));

    // The three corner points pick each other; the outlier reaches for the
    // two corners nearest to it.
    assert_eq!(column_set(&graph, 0), BTreeSet::from([1, 2]));
    assert_eq!(column_set(&graph, 1), BTreeSet::from([0, 2]));
    assert_eq!(column_set(&graph, 2), BTreeSet::from([0, 1]));
    assert_eq!(column_set(&graph, 3), BTreeSet::from([1, 2]));
}

#[test]
fn all_duplicates_exhaust_the_pools() {
    // Three copies of one point: the forest cannot produce three distinct
    // candidates per pool, which is a hard failure once two trees merged.
    let points = PointSet::from_points(vec![vec![5.0, 5.0]; 3]);
    let result = KnnGraphBuilder::new()
        .with_leaf_threshold(3)
        .with_trees(2)
        .with_neighbors(1)
        .with_refine_iters(1)
        .with_seed(TEST_SEED)
        .build(&points);
    assert_eq!(result, Err(GraphError::PoolExhausted));
}

#[test]
fn all_duplicates_fail_neighborhood_exploration() {
    // With a single tree the pool size check never runs, so the failure
    // surfaces in refinement instead: every candidate sits at distance zero.
    let points = PointSet::from_points(vec![vec![5.0, 5.0]; 3]);
    let result = KnnGraphBuilder::new()
        .with_leaf_threshold(3)
        .with_trees(1)
        .with_neighbors(1)
        .with_refine_iters(1)
        .with_seed(TEST_SEED)
        .build(&points);
    assert_eq!(result, Err(GraphError::ExplorationFailure));
}

#[test]
fn line_recovers_local_windows() {
    let n = 100;
    let points = PointSet::from_points(line_points(n));
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(12)
        .with_trees(10)
        .with_neighbors(4)
        .with_max_depth(20)
        .with_refine_iters(3)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();

    assert_eq!((graph.k(), graph.npoints()), (4, n));
    assert_invariants(&graph, n);
    // No duplicate columns and n >= K+1: every slot is filled.
    assert!(graph.column(0).iter().all(|&j| j != NO_NEIGHBOR));
    for i in 0..n {
        for j in graph.neighbors(i) {
            assert!(
                (j as i64 - i as i64).unsigned_abs() <= 8,
                "point {} got distant neighbor {}",
                i,
                j
            );
        }
    }

    // The forest partitions a line into contiguous blocks whose boundaries
    // mostly jitter between trees; refinement then recovers the exact
    // {i−2, i−1, i+1, i+2} window away from the few stable block edges.
    let exact = (4..n - 4)
        .filter(|&i| {
            column_set(&graph, i)
                == BTreeSet::from([i - 2, i - 1, i + 1, i + 2])
        })
        .count();
    assert!(exact >= 70, "only {}/92 interior points recovered their window", exact);
}

#[test]
fn preset_abort_yields_the_empty_graph() {
    let points = PointSet::from_points(line_points(50));
    let builder = KnnGraphBuilder::new()
        .with_leaf_threshold(8)
        .with_trees(4)
        .with_neighbors(3)
        .with_seed(TEST_SEED);

    let progress = ProgressTracker::new(builder.work_estimate(&points), false);
    progress.cancel();

    let graph = builder.build_with_progress(&points, &progress).unwrap();
    assert!(graph.is_empty());
    assert_eq!((graph.k(), graph.npoints()), (0, 0));
}

#[test]
fn cosine_pairs_scaled_duplicates_where_euclidean_does_not() {
    let mut items = random_unit_vectors(40, 10, TEST_SEED);
    // A copy of point 0 scaled by three and nudged off the exact ray, so the
    // pair is directionally identical but Euclidean-far.
    let scaled: Vec<f64> = items[0].iter().map(|&x| 3.0 * x + 1e-3).collect();
    items.push(scaled);
    let points = PointSet::from_points(items);
    let (a, b) = (0, 40);

    let builder = |distance| {
        KnnGraphBuilder::new()
            .with_leaf_threshold(15)
            .with_trees(25)
            .with_neighbors(6)
            .with_max_depth(16)
            .with_refine_iters(2)
            .with_distance(distance)
            .with_seed(TEST_SEED)
    };

    let by_cosine = builder(DistanceKind::Cosine).build(&points).unwrap();
    assert_invariants(&by_cosine, 41);
    assert_eq!(nearest(&by_cosine, &points, DistanceKind::Cosine, a), b);
    assert_eq!(nearest(&by_cosine, &points, DistanceKind::Cosine, b), a);

    let by_euclid = builder(DistanceKind::Euclidean).build(&points).unwrap();
    assert_invariants(&by_euclid, 41);
    assert_ne!(nearest(&by_euclid, &points, DistanceKind::Euclidean, a), b);
}

#[test]
fn high_k_recovers_the_full_permutation() {
    let n = 20;
    let points =
        PointSet::from_points(gaussian_blobs(&[vec![0.0; 6]], n, 1.0, TEST_SEED));
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(19)
        .with_trees(5)
        .with_neighbors(19)
        .with_max_depth(10)
        .with_refine_iters(2)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();

    assert_eq!((graph.k(), graph.npoints()), (19, n));
    for i in 0..n {
        let expected: BTreeSet<usize> = (0..n).filter(|&j| j != i).collect();
        assert_eq!(column_set(&graph, i), expected, "column {} incomplete", i);
    }
}

#[test]
fn fixed_seed_is_byte_identical() {
    let points = PointSet::from_points(gaussian_blobs(
        &blob_centers(3, 8, 10.0),
        40,
        1.0,
        TEST_SEED,
    ));
    let build = || {
        KnnGraphBuilder::new()
            .with_leaf_threshold(15)
            .with_trees(8)
            .with_neighbors(6)
            .with_refine_iters(2)
            .with_seed(91)
            .build(&points)
            .unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn blobs_fill_every_slot() {
    let points = PointSet::from_points(gaussian_blobs(
        &blob_centers(3, 8, 10.0),
        40,
        1.0,
        TEST_SEED,
    ));
    let n = points.npoints();
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(15)
        .with_trees(8)
        .with_neighbors(6)
        .with_refine_iters(2)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();

    assert_invariants(&graph, n);
    assert!(graph.column(0).len() == 6);
    for i in 0..n {
        assert!(
            graph.column(i).iter().all(|&j| j != NO_NEIGHBOR),
            "column {} holds a sentinel on duplicate-free input",
            i
        );
    }
}

#[test]
fn recall_against_brute_force() {
    let points = PointSet::from_points(gaussian_blobs(
        &blob_centers(5, 16, 10.0),
        100,
        1.0,
        TEST_SEED,
    ));
    let n = points.npoints();
    let k = 10;
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(30)
        .with_trees(25)
        .with_neighbors(k)
        .with_refine_iters(2)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();
    assert_invariants(&graph, n);

    let exact = brute_force_knn(&points, DistanceKind::Euclidean, k);
    let mut hits = 0usize;
    for i in 0..n {
        let truth: BTreeSet<usize> = exact[i].iter().copied().collect();
        hits += graph.neighbors(i).filter(|j| truth.contains(j)).count();
    }
    let recall = hits as f64 / (n * k) as f64;
    assert!(recall >= 0.8, "recall {:.3} below threshold", recall);
}

#[test]
fn refinement_never_worsens_the_kth_neighbor() {
    let points = PointSet::from_points(gaussian_blobs(
        &blob_centers(3, 8, 10.0),
        100,
        1.0,
        TEST_SEED,
    ));
    let n = points.npoints();

    let mean_kth = |graph: &KnnGraph| -> f64 {
        (0..n)
            .map(|i| {
                graph
                    .neighbors(i)
                    .map(|j| DistanceKind::Euclidean.eval(points.point(i), points.point(j)))
                    .fold(0.0f64, f64::max)
            })
            .sum::<f64>()
            / n as f64
    };

    let build = |iters| {
        KnnGraphBuilder::new()
            .with_leaf_threshold(20)
            .with_trees(15)
            .with_neighbors(8)
            .with_refine_iters(iters)
            .with_seed(TEST_SEED)
            .build(&points)
            .unwrap()
    };

    // Same seed: each build replays the same forest, so the sequence is the
    // iterate chain of one construction.
    let m1 = mean_kth(&build(1));
    let m2 = mean_kth(&build(2));
    let m3 = mean_kth(&build(3));
    assert!(m2 <= m1 + 1e-9, "iteration 2 regressed: {} -> {}", m1, m2);
    assert!(m3 <= m2 + 1e-9, "iteration 3 regressed: {} -> {}", m2, m3);
}

#[test]
fn zero_refinement_iterations_emit_k_wide() {
    let points = PointSet::from_points(gaussian_blobs(
        &blob_centers(2, 6, 10.0),
        30,
        1.0,
        TEST_SEED,
    ));
    let n = points.npoints();
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(15)
        .with_trees(8)
        .with_neighbors(6)
        .with_refine_iters(0)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();

    assert_eq!((graph.k(), graph.npoints()), (6, n));
    assert_invariants(&graph, n);
    for i in 0..n {
        assert!(graph.column(i).iter().all(|&j| j != NO_NEIGHBOR));
    }
}

#[test]
fn iris_dataset_builds_a_full_graph() {
    let dataset = iris::load_dataset();
    let items: Vec<Vec<f64>> = dataset
        .as_matrix()
        .into_iter()
        .map(|row| row.into_iter().map(|val| *val as f64).collect())
        .collect();
    let n = items.len();
    let points = PointSet::from_points(items);

    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(15)
        .with_trees(10)
        .with_neighbors(5)
        .with_refine_iters(1)
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();

    assert_eq!((graph.k(), graph.npoints()), (5, n));
    assert_invariants(&graph, n);
}

#[test]
fn dense_matrix_input_matches_row_input() {
    let items = gaussian_blobs(&blob_centers(2, 4, 8.0), 10, 0.5, TEST_SEED);
    let matrix = DenseMatrix::from_2d_vec(&items).unwrap();

    let from_rows = PointSet::from_points(items.clone());
    let from_matrix = PointSet::from_dense_matrix(&matrix);
    assert_eq!(from_rows.npoints(), from_matrix.npoints());
    assert_eq!(from_rows.nfeatures(), from_matrix.nfeatures());
    for i in 0..from_rows.npoints() {
        assert_eq!(from_rows.point(i), from_matrix.point(i));
    }
}

#[test]
fn parameters_are_validated() {
    let points = PointSet::from_points(line_points(10));

    let err = |b: KnnGraphBuilder| match b.build(&points) {
        Err(GraphError::InvalidParameter(_)) => (),
        other => panic!("expected InvalidParameter, got {:?}", other),
    };

    err(KnnGraphBuilder::new().with_leaf_threshold(2));
    err(KnnGraphBuilder::new().with_trees(0));
    err(KnnGraphBuilder::new().with_neighbors(0));
    err(KnnGraphBuilder::new().with_leaf_threshold(5).with_neighbors(6));
    err(KnnGraphBuilder::new().with_max_depth(0));

    let single = PointSet::from_points(vec![vec![1.0]]);
    match KnnGraphBuilder::new().build(&single) {
        Err(GraphError::InvalidParameter(_)) => (),
        other => panic!("expected InvalidParameter, got {:?}", other),
    }
}

#[test]
fn unknown_distance_name_builds_with_euclidean() {
    let points = PointSet::from_points(line_points(20));
    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(6)
        .with_trees(4)
        .with_neighbors(2)
        .with_refine_iters(1)
        .with_distance_name("Mahalanobis")
        .with_seed(TEST_SEED)
        .build(&points)
        .unwrap();
    assert_eq!((graph.k(), graph.npoints()), (2, 20));
}
