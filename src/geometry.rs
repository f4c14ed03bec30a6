// Copyright 2023 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! # Local geometry
//!
//! Distances, unit vectors and bond-angle cosines of a central atom's
//! neighborhood together with their derivatives with respect to the
//! neighbor coordinates.
//!
//! For a displacement $\mathbf{r}_j$ from the central atom to neighbor $j$,
//! $$ R_j = |\mathbf{r}_j|, \quad \hat{\mathbf{u}}_j = \mathbf{r}_j / R_j, \quad \cos\theta_{jk} = \hat{\mathbf{u}}_j \cdot \hat{\mathbf{u}}_k $$
//! and, for axis $a$ of neighbor $j$,
//! $$ \frac{\partial R_j}{\partial x_j^a} = \hat{u}_j^a, \quad
//!    \frac{\partial \cos\theta_{jk}}{\partial x_j^a} = \frac{\hat{u}_k^a - \cos\theta_{jk} \hat{u}_j^a}{R_j} $$

use crate::{DMatrix, DVector, Vector3};

/// Geometry tensors of one neighborhood
///
/// Columns (and rows of the cosine matrices) follow the neighbor order
/// given on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalGeometry {
    /// Neighbor distances, $R_j$
    pub distances: DVector,
    /// Unit displacement vectors as a 3 × n matrix
    pub unit_vectors: DMatrix,
    /// Symmetric n × n matrix of $\cos\theta_{jk}$ with unit diagonal
    pub cosines: DMatrix,
    /// Per axis: $\partial R_j / \partial x_j^a$
    pub distance_derivatives: [DVector; 3],
    /// Per axis: element (j, k) is $\partial \cos\theta_{jk} / \partial x_j^a$
    pub cosine_derivatives: [DMatrix; 3],
}

impl LocalGeometry {
    /// Compute the geometry of neighbors at the given displacements from the central atom.
    ///
    /// # Panics
    /// If any displacement has zero or non-finite length. Coincident atoms
    /// must be excluded by the caller.
    pub fn new(displacements: &[Vector3]) -> Self {
        let n = displacements.len();
        let mut distances = DVector::zeros(n);
        let mut unit_vectors = DMatrix::zeros(3, n);
        for (j, r) in displacements.iter().enumerate() {
            let distance = r.norm();
            assert!(
                distance > 0.0 && distance.is_finite(),
                "neighbor {} is at invalid distance {}",
                j,
                distance
            );
            distances[j] = distance;
            unit_vectors.set_column(j, &(r / distance));
        }

        let mut cosines = unit_vectors.tr_mul(&unit_vectors);
        cosines.apply(|c| *c = c.clamp(-1.0, 1.0));
        cosines.fill_diagonal(1.0);

        let inverse_distances = distances.map(f64::recip);
        let distance_derivatives: [DVector; 3] =
            std::array::from_fn(|axis| unit_vectors.row(axis).transpose());
        let cosine_derivatives: [DMatrix; 3] = std::array::from_fn(|axis| {
            let unit = &distance_derivatives[axis];
            let mut derivative = DMatrix::from_fn(n, n, |j, k| {
                (unit[k] - cosines[(j, k)] * unit[j]) * inverse_distances[j]
            });
            derivative.fill_diagonal(0.0);
            derivative
        });

        Self {
            distances,
            unit_vectors,
            cosines,
            distance_derivatives,
            cosine_derivatives,
        }
    }

    /// Number of neighbors
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn neighbors() -> Vec<Vector3> {
        vec![
            Vector3::new(1.1, 0.2, -0.3),
            Vector3::new(-0.4, 1.6, 0.5),
            Vector3::new(0.3, -0.7, 2.1),
        ]
    }

    #[test]
    fn test_distances_and_cosines() {
        let r = neighbors();
        let geometry = LocalGeometry::new(&r);
        for j in 0..r.len() {
            assert_relative_eq!(geometry.distances[j], r[j].norm());
            assert_eq!(geometry.cosines[(j, j)], 1.0);
            for k in 0..r.len() {
                let expected = r[j].dot(&r[k]) / (r[j].norm() * r[k].norm());
                assert_relative_eq!(geometry.cosines[(j, k)], expected, epsilon = 1e-14);
                assert_eq!(geometry.cosines[(j, k)], geometry.cosines[(k, j)]);
            }
        }
    }

    #[test]
    fn test_derivatives_match_central_difference() {
        const EPS: f64 = 1e-6;
        let r = neighbors();
        let geometry = LocalGeometry::new(&r);
        for j in 0..r.len() {
            for axis in 0..3 {
                let mut plus = r.clone();
                let mut minus = r.clone();
                plus[j][axis] += EPS;
                minus[j][axis] -= EPS;
                let (plus, minus) = (LocalGeometry::new(&plus), LocalGeometry::new(&minus));
                let d_distance = (plus.distances[j] - minus.distances[j]) / (2.0 * EPS);
                assert_relative_eq!(
                    geometry.distance_derivatives[axis][j],
                    d_distance,
                    epsilon = 1e-8
                );
                for k in 0..r.len() {
                    let d_cos = (plus.cosines[(j, k)] - minus.cosines[(j, k)]) / (2.0 * EPS);
                    assert_relative_eq!(
                        geometry.cosine_derivatives[axis][(j, k)],
                        d_cos,
                        epsilon = 1e-8
                    );
                }
            }
        }
    }

    #[test]
    fn test_parallel_neighbors() {
        let geometry =
            LocalGeometry::new(&[Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)]);
        assert_eq!(geometry.cosines[(0, 1)], 1.0);
        let geometry =
            LocalGeometry::new(&[Vector3::new(1.0, 1.0, 0.0), Vector3::new(-3.0, -3.0, 0.0)]);
        assert!(geometry.cosines[(0, 1)] >= -1.0);
        assert_relative_eq!(geometry.cosines[(0, 1)], -1.0, epsilon = 1e-15);
    }

    #[test]
    #[should_panic]
    fn test_coincident_neighbor_panics() {
        LocalGeometry::new(&[Vector3::new(1.0, 0.0, 0.0), Vector3::zeros()]);
    }
}
