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

//! # HDNNP
//!
//! Evaluation of high-dimensional neural network potentials (HDNNP).
//!
//! The energy of an atom is predicted by a per-element feed-forward network
//! whose input is a vector of atom-centered symmetry functions computed from
//! the atom's neighborhood. Forces follow analytically by carrying the
//! Jacobian of the symmetry functions through the optional preprocessing
//! steps and contracting it with the back-propagated network gradient:
//!
//! $$ \mathbf{F}_j = -\sum_f \frac{\partial E}{\partial G_f} \frac{\partial G_f}{\partial \mathbf{r}_j} $$
//!
//! ## Examples
//! ~~~
//! use hdnnp::*;
//! let elements = ElementTable::new(["H"]).unwrap();
//! let symmetry = SymmetryFunctionSet::new(vec![RadialCutoff::new(6.0)], vec![], vec![]);
//! let network = Network::new(vec![Layer::new(
//!     nalgebra::DMatrix::from_element(1, 1, 2.0),
//!     nalgebra::DVector::from_element(1, 0.5),
//!     Activation::Identity,
//! )]).unwrap();
//! let parameters = PotentialParameters {
//!     elements,
//!     symmetry,
//!     preprocessing: vec![],
//!     networks: vec![network],
//! };
//! let potential = NeuralNetworkPotential::new(parameters).unwrap();
//! let result = potential.evaluate(0, &[Vector3::new(3.0, 0.0, 0.0)], &[0]);
//! assert!((result.energy - (2.0 * 0.5_f64.tanh().powi(3) + 0.5)).abs() < 1e-12);
//! ~~~

#[cfg(test)]
extern crate approx;

/// A point in 3D space
pub type Vector3 = nalgebra::Vector3<f64>;
/// Heap-allocated column vector
pub type DVector = nalgebra::DVector<f64>;
/// Heap-allocated matrix
pub type DMatrix = nalgebra::DMatrix<f64>;

mod cutoff;
mod element;
pub mod file;
pub mod geometry;
pub mod network;
mod potential;
pub mod preprocess;
pub mod symmetry;

pub use cutoff::CutoffFunction;
pub use element::ElementTable;
pub use geometry::LocalGeometry;
pub use network::{Activation, Layer, Network};
pub use potential::{
    AtomicContribution, EvaluationOptions, NeuralNetworkPotential, PotentialParameters,
    SystemEvaluation,
};
pub use preprocess::{Preprocessor, PreprocessingChain};
pub use symmetry::{Angular, Descriptor, RadialCutoff, RadialGaussian, SymmetryFunctionSet};

/// Defines a cutoff distance
pub trait Cutoff {
    /// Squared cutoff distance
    fn cutoff_squared(&self) -> f64 {
        self.cutoff().powi(2)
    }

    /// Cutoff distance
    fn cutoff(&self) -> f64;
}
