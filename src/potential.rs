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

//! Per-atom and system-wide evaluation of a neural network potential.

use crate::element::ElementTable;
use crate::geometry::LocalGeometry;
use crate::network::Network;
use crate::preprocess::{PreprocessingChain, Preprocessor};
use crate::symmetry::{Descriptor, SymmetryFunctionSet};
use crate::{Cutoff, DVector, Vector3};
use anyhow::{ensure, Context, Result};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameter tables of a trained potential
///
/// This is what a potential file contains; see [`crate::file`] for reading
/// it and [`NeuralNetworkPotential::new`] for turning it into a potential.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct PotentialParameters {
    pub elements: ElementTable,
    pub symmetry: SymmetryFunctionSet,
    /// Preprocessing steps in the order they are applied
    #[cfg_attr(feature = "serde", serde(default))]
    pub preprocessing: Vec<Preprocessor>,
    /// One network per element, in the order of `elements`
    pub networks: Vec<Network>,
}

/// Energy and forces due to one atom's network
///
/// Forces obey Newton's third law: `central_force` is exactly the negative sum
/// of `neighbor_forces`.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicContribution {
    /// Atomic energy, the network output
    pub energy: f64,
    /// Force on each neighbor, in input order
    pub neighbor_forces: Vec<Vector3>,
    /// Force on the central atom
    pub central_force: Vector3,
}

/// Options for [`NeuralNetworkPotential::evaluate_system`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields, default)
)]
pub struct EvaluationOptions {
    /// Also report the energy of each atom
    pub atomic_energies: bool,
}

/// Energy and forces of a whole system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEvaluation {
    pub energy: f64,
    /// Total force on each atom
    pub forces: Vec<Vector3>,
    /// Energy of each atom if requested in [`EvaluationOptions`]
    pub atomic_energies: Option<Vec<f64>>,
}

impl SystemEvaluation {
    fn zeros(n_atoms: usize, options: EvaluationOptions) -> Self {
        Self {
            energy: 0.0,
            forces: vec![Vector3::zeros(); n_atoms],
            atomic_energies: options.atomic_energies.then(|| vec![0.0; n_atoms]),
        }
    }

    /// Merge partial sums from another thread
    fn merge(mut self, other: Self) -> Self {
        self.energy += other.energy;
        for (force, partial) in self.forces.iter_mut().zip(&other.forces) {
            *force += partial;
        }
        if let (Some(energies), Some(partial)) = (&mut self.atomic_energies, &other.atomic_energies)
        {
            for (energy, partial) in energies.iter_mut().zip(partial) {
                *energy += partial;
            }
        }
        self
    }
}

/// High-dimensional neural network potential
///
/// Immutable after construction and safe to share between threads.
#[derive(Debug, Clone)]
pub struct NeuralNetworkPotential {
    elements: ElementTable,
    symmetry: SymmetryFunctionSet,
    preprocessing: PreprocessingChain,
    networks: Vec<Network>,
    n_features: usize,
}

impl NeuralNetworkPotential {
    /// Validate parameter tables and build the potential.
    ///
    /// Fails if any parameter is out of range or if the feature vector length
    /// after preprocessing differs from the input size of a network.
    pub fn new(parameters: PotentialParameters) -> Result<Self> {
        let PotentialParameters {
            elements,
            symmetry,
            preprocessing,
            networks,
        } = parameters;
        symmetry.validate().context("invalid symmetry functions")?;
        ensure!(
            networks.len() == elements.len(),
            "expected {} networks, one per element, found {}",
            elements.len(),
            networks.len()
        );
        let n_features = symmetry.n_features(&elements);
        let preprocessing = PreprocessingChain::new(preprocessing);
        let sizes = preprocessing.validate(elements.len(), n_features)?;
        for (element, (network, size)) in networks.iter().zip(sizes).enumerate() {
            ensure!(
                network.input_size() == size,
                "network of element '{}' takes {} inputs but receives {} features",
                elements.name(element),
                network.input_size(),
                size
            );
        }
        if !symmetry.has_uniform_cutoff() {
            warn!(
                "symmetry functions use different cutoffs; features vanish inside the largest cutoff {}",
                symmetry.cutoff()
            );
        }
        info!(
            "neural network potential for {} with {} features, {} preprocessing steps and {} layers",
            elements.names().join(", "),
            n_features,
            preprocessing.steps().len(),
            networks[0].depth()
        );
        Ok(Self {
            elements,
            symmetry,
            preprocessing,
            networks,
            n_features,
        })
    }

    pub fn elements(&self) -> &ElementTable {
        &self.elements
    }

    pub fn symmetry_functions(&self) -> &SymmetryFunctionSet {
        &self.symmetry
    }

    pub fn preprocessing(&self) -> &PreprocessingChain {
        &self.preprocessing
    }

    /// Network of `element`
    pub fn network(&self, element: usize) -> &Network {
        &self.networks[element]
    }

    /// Length of the feature vector before preprocessing
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Parameter tables the potential was built from
    pub fn to_parameters(&self) -> PotentialParameters {
        PotentialParameters {
            elements: self.elements.clone(),
            symmetry: self.symmetry.clone(),
            preprocessing: self.preprocessing.steps().to_vec(),
            networks: self.networks.clone(),
        }
    }

    fn check_element(&self, element: usize) {
        assert!(
            element < self.elements.len(),
            "element index {} out of range",
            element
        );
    }

    /// Preprocessed feature vector and Jacobian of a neighborhood, i.e. the network input
    pub fn descriptor(
        &self,
        element: usize,
        displacements: &[Vector3],
        neighbor_elements: &[usize],
    ) -> Descriptor {
        self.check_element(element);
        let geometry = LocalGeometry::new(displacements);
        let descriptor = self
            .symmetry
            .compute(&self.elements, &geometry, neighbor_elements);
        self.preprocessing.transform(element, descriptor)
    }

    /// Energy of an atom of `element`, without forces
    ///
    /// `displacements` are neighbor positions relative to the atom and
    /// `neighbor_elements` the element index of each neighbor.
    pub fn energy(
        &self,
        element: usize,
        displacements: &[Vector3],
        neighbor_elements: &[usize],
    ) -> f64 {
        self.check_element(element);
        let geometry = LocalGeometry::new(displacements);
        let values: DVector = self
            .symmetry
            .compute(&self.elements, &geometry, neighbor_elements)
            .values;
        let values = self.preprocessing.transform_values(element, values);
        self.networks[element].energy(&values)
    }

    /// Energy of an atom of `element` and the resulting forces on it and its neighbors
    ///
    /// # Panics
    /// If a neighbor coincides with the atom, if the slices differ in length,
    /// or if an element index is out of range.
    pub fn evaluate(
        &self,
        element: usize,
        displacements: &[Vector3],
        neighbor_elements: &[usize],
    ) -> AtomicContribution {
        let descriptor = self.descriptor(element, displacements, neighbor_elements);
        let (energy, gradient) = self.networks[element].energy_and_gradient(&descriptor.values);
        // dE/dr_j for each axis
        let [dx, dy, dz]: [DVector; 3] =
            std::array::from_fn(|axis| descriptor.jacobian[axis].tr_mul(&gradient));
        let neighbor_forces: Vec<Vector3> = (0..displacements.len())
            .map(|j| -Vector3::new(dx[j], dy[j], dz[j]))
            .collect();
        let central_force = -neighbor_forces.iter().sum::<Vector3>();
        AtomicContribution {
            energy,
            neighbor_forces,
            central_force,
        }
    }

    /// Energy and forces of all atoms in a system.
    ///
    /// `neighbors[i]` is the full neighbor list of atom `i` (every neighbor
    /// within [`Cutoff::cutoff`], not including `i` itself). Atoms are
    /// evaluated in parallel and forces are summed via per-thread partial sums.
    pub fn evaluate_system<N>(
        &self,
        positions: &[Vector3],
        elements: &[usize],
        neighbors: &[N],
        options: EvaluationOptions,
    ) -> SystemEvaluation
    where
        N: AsRef<[usize]> + Sync,
    {
        let n_atoms = positions.len();
        assert_eq!(n_atoms, elements.len(), "one element index per atom is required");
        assert_eq!(n_atoms, neighbors.len(), "one neighbor list per atom is required");
        let result = (0..n_atoms)
            .into_par_iter()
            .fold(
                || SystemEvaluation::zeros(n_atoms, options),
                |mut partial, i| {
                    let list = neighbors[i].as_ref();
                    assert!(!list.contains(&i), "atom {} is listed as its own neighbor", i);
                    let displacements: Vec<Vector3> =
                        list.iter().map(|&j| positions[j] - positions[i]).collect();
                    let neighbor_elements: Vec<usize> =
                        list.iter().map(|&j| elements[j]).collect();
                    let contribution =
                        self.evaluate(elements[i], &displacements, &neighbor_elements);
                    trace!("atom {}: energy {}", i, contribution.energy);
                    partial.energy += contribution.energy;
                    partial.forces[i] += contribution.central_force;
                    for (&j, force) in list.iter().zip(&contribution.neighbor_forces) {
                        partial.forces[j] += force;
                    }
                    if let Some(energies) = partial.atomic_energies.as_mut() {
                        energies[i] = contribution.energy;
                    }
                    partial
                },
            )
            .reduce(
                || SystemEvaluation::zeros(n_atoms, options),
                SystemEvaluation::merge,
            );
        debug!("evaluated {} atoms, total energy {}", n_atoms, result.energy);
        result
    }
}

impl Cutoff for NeuralNetworkPotential {
    /// Largest symmetry function cutoff; neighbor lists must include all atoms within this distance
    fn cutoff(&self) -> f64 {
        self.symmetry.cutoff()
    }
}
