//! Build an approximate k-NN graph over synthetic Gaussian blobs and print
//! fill statistics plus the exported Laplacian size.
//!
//! Run with `RUST_LOG=info cargo run --example build_blobs` to watch the
//! phase logging.

use rand::prelude::*;
use rand_distr::{Distribution, Normal};

use rpforest::builder::KnnGraphBuilder;
use rpforest::core::PointSet;
use rpforest::distance::DistanceKind;

fn main() {
    env_logger::init();

    let d = 16;
    let per_blob = 400;
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 1.0).unwrap();

    let mut items: Vec<Vec<f64>> = Vec::new();
    for blob in 0..4 {
        let mut center = vec![0.0; d];
        center[blob] = 12.0;
        for _ in 0..per_blob {
            items.push(center.iter().map(|&c| c + noise.sample(&mut rng)).collect());
        }
    }
    let points = PointSet::from_points(items);

    let graph = KnnGraphBuilder::new()
        .with_leaf_threshold(30)
        .with_trees(20)
        .with_neighbors(10)
        .with_refine_iters(2)
        .with_seed(42)
        .with_verbose(true)
        .build(&points)
        .expect("graph construction failed");

    println!("{}", graph.statistics());
    println!("first point's neighbors: {:?}", graph.neighbors(0).collect::<Vec<_>>());

    let laplacian = graph.to_laplacian(&points, DistanceKind::Euclidean, None, 2.0);
    println!(
        "Laplacian: {}x{} with {} non-zeros",
        laplacian.shape().0,
        laplacian.shape().1,
        laplacian.nnz()
    );
}
