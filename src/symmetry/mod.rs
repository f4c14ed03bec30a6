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

//! # Atom-centered symmetry functions
//!
//! Rotation, translation and permutation invariant descriptors of an atomic
//! neighborhood, following Behler and Parrinello,
//! [doi:10/bj6hrz](https://doi.org/10.1103/PhysRevLett.98.146401).
//!
//! Three families are supported: the cutoff-only radial function G1
//! ([`RadialCutoff`]), the Gaussian radial function G2 ([`RadialGaussian`]) and
//! the angular three-body function G4 ([`Angular`]). Every function is
//! evaluated separately for each neighbor element (G1, G2) or unordered
//! neighbor element pair (G4) so that the feature vector has the layout
//!
//! | block | size | index within block |
//! |-------|------|--------------------|
//! | G1 | n_elements × \|G1\| | p × n_elements + element |
//! | G2 | n_elements × \|G2\| | p × n_elements + element |
//! | G4 | n_pairs × \|G4\| | p × n_pairs + pair |

mod angular;
mod radial;

pub use angular::{Angular, AngularTerm};
pub use radial::{RadialCutoff, RadialGaussian, RadialSymmetryFunction};

use crate::element::ElementTable;
use crate::geometry::LocalGeometry;
use crate::{Cutoff, DMatrix, DVector};
use anyhow::{ensure, Context, Result};
use itertools::iproduct;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

fn check_cutoff(rc: f64) -> Result<()> {
    ensure!(
        rc.is_finite() && rc > 0.0,
        "cutoff radius must be positive, got {}",
        rc
    );
    Ok(())
}

/// Feature vector of one atom and its Jacobian with respect to the neighbor coordinates
///
/// `jacobian[axis]` is an n_features × n_neighbors matrix where element (f, j)
/// is $\partial G_f / \partial x_j^{axis}$.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub values: DVector,
    pub jacobian: [DMatrix; 3],
}

impl Descriptor {
    pub fn zeros(n_features: usize, n_neighbors: usize) -> Self {
        Self {
            values: DVector::zeros(n_features),
            jacobian: std::array::from_fn(|_| DMatrix::zeros(n_features, n_neighbors)),
        }
    }

    pub fn n_features(&self) -> usize {
        self.values.len()
    }

    pub fn n_neighbors(&self) -> usize {
        self.jacobian[0].ncols()
    }
}

/// The symmetry functions of a potential
///
/// # Examples
/// ~~~
/// use hdnnp::*;
/// let elements = ElementTable::new(["H", "O"]).unwrap();
/// let set = SymmetryFunctionSet::new(
///     vec![RadialCutoff::new(5.0)],
///     vec![RadialGaussian::new(5.0, 0.5, 1.0)],
///     vec![Angular::new(5.0, 0.1, 1.0, 2.0)],
/// );
/// // 2 elements × (1 + 1) + 3 pairs × 1
/// assert_eq!(set.n_features(&elements), 7);
/// ~~~
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct SymmetryFunctionSet {
    #[cfg_attr(feature = "serde", serde(rename = "type1", default))]
    radial_cutoff: Vec<RadialCutoff>,
    #[cfg_attr(feature = "serde", serde(rename = "type2", default))]
    radial_gaussian: Vec<RadialGaussian>,
    #[cfg_attr(feature = "serde", serde(rename = "type4", default))]
    angular: Vec<Angular>,
}

impl SymmetryFunctionSet {
    pub fn new(
        radial_cutoff: Vec<RadialCutoff>,
        radial_gaussian: Vec<RadialGaussian>,
        angular: Vec<Angular>,
    ) -> Self {
        Self {
            radial_cutoff,
            radial_gaussian,
            angular,
        }
    }

    /// Expand parameter grids into all combinations.
    ///
    /// G1 takes every `rc`, G2 every (`rc`, `eta`, `rs`) and G4 every
    /// (`rc`, `eta`, `lambda`, `zeta`) combination, with the last parameter
    /// varying fastest.
    pub fn from_grid(rc: &[f64], eta: &[f64], rs: &[f64], lambda: &[f64], zeta: &[f64]) -> Self {
        Self {
            radial_cutoff: rc.iter().map(|&rc| RadialCutoff::new(rc)).collect(),
            radial_gaussian: iproduct!(rc, eta, rs)
                .map(|(&rc, &eta, &rs)| RadialGaussian::new(rc, eta, rs))
                .collect(),
            angular: iproduct!(rc, eta, lambda, zeta)
                .map(|(&rc, &eta, &lambda, &zeta)| Angular::new(rc, eta, lambda, zeta))
                .collect(),
        }
    }

    pub fn radial_cutoff(&self) -> &[RadialCutoff] {
        &self.radial_cutoff
    }

    pub fn radial_gaussian(&self) -> &[RadialGaussian] {
        &self.radial_gaussian
    }

    pub fn angular(&self) -> &[Angular] {
        &self.angular
    }

    /// Total number of symmetry functions, not counting element resolution
    pub fn len(&self) -> usize {
        self.radial_cutoff.len() + self.radial_gaussian.len() + self.angular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the feature vector for the given elements
    pub fn n_features(&self, elements: &ElementTable) -> usize {
        elements.len() * (self.radial_cutoff.len() + self.radial_gaussian.len())
            + elements.n_pairs() * self.angular.len()
    }

    /// Check all parameters, reporting the offending function
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.is_empty(), "no symmetry functions are defined");
        for (i, g) in self.radial_cutoff.iter().enumerate() {
            g.validate().with_context(|| format!("type1 function {}", i + 1))?;
        }
        for (i, g) in self.radial_gaussian.iter().enumerate() {
            g.validate().with_context(|| format!("type2 function {}", i + 1))?;
        }
        for (i, g) in self.angular.iter().enumerate() {
            g.validate().with_context(|| format!("type4 function {}", i + 1))?;
        }
        Ok(())
    }

    fn cutoffs(&self) -> impl Iterator<Item = f64> + '_ {
        self.radial_cutoff
            .iter()
            .map(Cutoff::cutoff)
            .chain(self.radial_gaussian.iter().map(Cutoff::cutoff))
            .chain(self.angular.iter().map(Cutoff::cutoff))
    }

    /// Whether all functions share the same cutoff radius
    pub fn has_uniform_cutoff(&self) -> bool {
        let mut cutoffs = self.cutoffs();
        match cutoffs.next() {
            Some(first) => cutoffs.all(|rc| rc == first),
            None => true,
        }
    }

    /// Feature vector and Jacobian of a neighborhood
    ///
    /// `neighbor_elements[j]` is the element index of the neighbor in column `j` of `geometry`.
    pub fn compute(
        &self,
        elements: &ElementTable,
        geometry: &LocalGeometry,
        neighbor_elements: &[usize],
    ) -> Descriptor {
        assert_eq!(
            geometry.len(),
            neighbor_elements.len(),
            "one element index per neighbor is required"
        );
        let n_elements = elements.len();
        assert!(
            neighbor_elements.iter().all(|&e| e < n_elements),
            "neighbor element index out of range"
        );
        let mut descriptor = Descriptor::zeros(self.n_features(elements), geometry.len());
        let g2_offset = n_elements * self.radial_cutoff.len();
        let g4_offset = g2_offset + n_elements * self.radial_gaussian.len();
        radial::accumulate(
            &self.radial_cutoff,
            0,
            n_elements,
            geometry,
            neighbor_elements,
            &mut descriptor,
        );
        radial::accumulate(
            &self.radial_gaussian,
            g2_offset,
            n_elements,
            geometry,
            neighbor_elements,
            &mut descriptor,
        );
        angular::accumulate(
            &self.angular,
            g4_offset,
            elements,
            geometry,
            neighbor_elements,
            &mut descriptor,
        );
        descriptor
    }
}

impl Cutoff for SymmetryFunctionSet {
    /// Largest cutoff radius of all functions; zero if there are none
    fn cutoff(&self) -> f64 {
        self.cutoffs().fold(0.0, f64::max)
    }
}
