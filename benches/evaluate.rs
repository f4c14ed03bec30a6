use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hdnnp::preprocess::{Pca, Standardization};
use hdnnp::*;

fn matrix(rows: usize, cols: usize, seed: usize) -> DMatrix {
    DMatrix::from_fn(rows, cols, |i, j| {
        0.5 * ((1 + i * cols + j + 17 * seed) as f64 * 0.91).sin()
    })
}

/// Two-element potential with G1, G2 and G4 functions, standardization and PCA
fn potential() -> NeuralNetworkPotential {
    let elements = ElementTable::new(["H", "O"]).unwrap();
    let symmetry = SymmetryFunctionSet::from_grid(
        &[6.0],
        &[0.01, 0.1, 0.5],
        &[0.0, 1.0, 2.0],
        &[1.0, -1.0],
        &[1.0, 4.0],
    );
    let n_features = symmetry.n_features(&elements);
    let n_components = 20;
    let preprocessing = vec![
        Preprocessor::Standardization(
            (0..2)
                .map(|_| {
                    Standardization::new(
                        DVector::zeros(n_features),
                        DVector::from_element(n_features, 2.0),
                    )
                })
                .collect(),
        ),
        Preprocessor::Pca(
            (0..2)
                .map(|e| Pca::new(matrix(n_components, n_features, e), DVector::zeros(n_features)))
                .collect(),
        ),
    ];
    let networks = (0..2)
        .map(|e| {
            Network::new(vec![
                Layer::new(
                    matrix(25, n_components, e + 2),
                    DVector::zeros(25),
                    Activation::Tanh,
                ),
                Layer::new(matrix(25, 25, e + 4), DVector::zeros(25), Activation::Tanh),
                Layer::new(matrix(1, 25, e + 6), DVector::zeros(1), Activation::Identity),
            ])
            .unwrap()
        })
        .collect();
    NeuralNetworkPotential::new(PotentialParameters {
        elements,
        symmetry,
        preprocessing,
        networks,
    })
    .unwrap()
}

/// Simple cubic lattice of `n`³ atoms with alternating elements
fn lattice(n: usize, spacing: f64) -> (Vec<Vector3>, Vec<usize>) {
    let positions: Vec<_> = (0..n * n * n)
        .map(|i| Vector3::new((i % n) as f64, ((i / n) % n) as f64, (i / (n * n)) as f64) * spacing)
        .collect();
    let elements = (0..positions.len()).map(|i| i % 2).collect();
    (positions, elements)
}

/// Single-atom benchmarks for growing neighbor counts
fn bench_atom(c: &mut Criterion) {
    let mut group = c.benchmark_group("atom");
    let potential = potential();
    for n_neighbors in [8, 32, 64] {
        let displacements: Vec<_> = (0..n_neighbors)
            .map(|j| {
                let t = j as f64;
                let direction = Vector3::new((1.3 * t).cos(), (0.7 * t).sin(), (0.37 * t).cos());
                direction * (1.0 + 4.5 * t / n_neighbors as f64)
            })
            .collect();
        let types: Vec<_> = (0..n_neighbors).map(|j| j % 2).collect();
        group.bench_with_input(
            BenchmarkId::new("energy", n_neighbors),
            &displacements,
            |b, r| b.iter(|| potential.energy(0, black_box(r), &types)),
        );
        group.bench_with_input(
            BenchmarkId::new("energy_and_forces", n_neighbors),
            &displacements,
            |b, r| b.iter(|| potential.evaluate(0, black_box(r), &types)),
        );
    }
    group.finish();
}

/// Whole-system benchmark, evaluated in parallel
fn bench_system(c: &mut Criterion) {
    let mut group = c.benchmark_group("system");
    let potential = potential();
    let (positions, elements) = lattice(6, 1.5);
    let rc2 = potential.cutoff_squared();
    let neighbors: Vec<Vec<usize>> = (0..positions.len())
        .map(|i| {
            (0..positions.len())
                .filter(|&j| j != i && (positions[j] - positions[i]).norm_squared() < rc2)
                .collect()
        })
        .collect();
    group.bench_function(BenchmarkId::new("lattice", positions.len()), |b| {
        b.iter(|| {
            potential.evaluate_system(
                black_box(&positions),
                &elements,
                &neighbors,
                EvaluationOptions::default(),
            )
        })
    });
    group.finish();
}

criterion_group!(benches, bench_atom, bench_system);
criterion_main!(benches);
