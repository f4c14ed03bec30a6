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

//! # Feed-forward networks
//!
//! Each element has its own network mapping the (preprocessed) feature vector
//! of an atom to its energy. Besides the plain forward pass, the network
//! provides the gradient of the energy with respect to its input by
//! back-propagation:
//!
//! $$ \frac{\partial E}{\partial \mathbf{G}} = W_1^T \left( \sigma_1' \odot W_2^T \left( \sigma_2' \odot \cdots W_L^T \sigma_L' \right) \right) $$

mod activation;

pub use activation::Activation;

use crate::{DMatrix, DVector};
use anyhow::{ensure, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fully connected layer, out = f(W·in + b)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct Layer {
    /// Weight matrix, output size × input size
    weights: DMatrix,
    bias: DVector,
    activation: Activation,
}

impl Layer {
    /// # Panics
    /// If the bias length differs from the number of weight rows
    pub fn new(weights: DMatrix, bias: DVector, activation: Activation) -> Self {
        assert_eq!(
            weights.nrows(),
            bias.len(),
            "bias length must equal the layer output size"
        );
        Self {
            weights,
            bias,
            activation,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &DMatrix {
        &self.weights
    }

    pub fn bias(&self) -> &DVector {
        &self.bias
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn affine(&self, input: &DVector) -> DVector {
        &self.weights * input + &self.bias
    }

    pub fn forward(&self, input: &DVector) -> DVector {
        let mut output = self.affine(input);
        output.apply(|x| *x = self.activation.value(*x));
        output
    }

    /// Output and element-wise derivative of the activation
    pub fn forward_with_derivative(&self, input: &DVector) -> (DVector, DVector) {
        let mut output = self.affine(input);
        let mut derivative = DVector::zeros(output.len());
        for (x, d) in output.iter_mut().zip(derivative.iter_mut()) {
            (*x, *d) = self.activation.evaluate(*x);
        }
        (output, derivative)
    }
}

/// Stack of layers ending in a single output, the atomic energy
///
/// # Examples
/// ~~~
/// use hdnnp::*;
/// use nalgebra::{dmatrix, dvector};
/// let layer = Layer::new(dmatrix![2.0], dvector![0.5], Activation::Identity);
/// let network = Network::new(vec![layer]).unwrap();
/// let (energy, gradient) = network.energy_and_gradient(&dvector![1.0]);
/// assert_eq!(energy, 2.5);
/// assert_eq!(gradient, dvector![2.0]);
/// ~~~
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(try_from = "Vec<Layer>", into = "Vec<Layer>")
)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// Build from layers, checking that consecutive sizes match and that the output is scalar.
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        ensure!(!layers.is_empty(), "a network needs at least one layer");
        for (i, layer) in layers.iter().enumerate() {
            ensure!(
                layer.bias.len() == layer.output_size(),
                "layer {}: bias length {} differs from output size {}",
                i + 1,
                layer.bias.len(),
                layer.output_size()
            );
            ensure!(
                layer.input_size() > 0 && layer.output_size() > 0,
                "layer {} has zero width",
                i + 1
            );
        }
        for (i, pair) in layers.windows(2).enumerate() {
            ensure!(
                pair[0].output_size() == pair[1].input_size(),
                "output size {} of layer {} differs from input size {} of layer {}",
                pair[0].output_size(),
                i + 1,
                pair[1].input_size(),
                i + 2
            );
        }
        let last = layers.len();
        ensure!(
            layers[last - 1].output_size() == 1,
            "the last layer must have a single output, found {}",
            layers[last - 1].output_size()
        );
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Expected length of the feature vector
    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    fn check_input(&self, input: &DVector) {
        assert_eq!(
            input.len(),
            self.input_size(),
            "feature vector length differs from the network input size"
        );
    }

    /// Energy from a forward pass
    pub fn energy(&self, input: &DVector) -> f64 {
        self.check_input(input);
        let output = self
            .layers
            .iter()
            .fold(input.clone(), |signal, layer| layer.forward(&signal));
        output[0]
    }

    /// Energy and its gradient with respect to the input, dE/dG
    pub fn energy_and_gradient(&self, input: &DVector) -> (f64, DVector) {
        self.check_input(input);
        let mut derivatives = Vec::with_capacity(self.depth());
        let mut signal = input.clone();
        for layer in &self.layers {
            let (output, derivative) = layer.forward_with_derivative(&signal);
            derivatives.push(derivative);
            signal = output;
        }
        let energy = signal[0];

        let mut gradient = DVector::from_element(1, 1.0);
        for (layer, derivative) in self.layers.iter().zip(&derivatives).rev() {
            gradient.component_mul_assign(derivative);
            gradient = layer.weights.tr_mul(&gradient);
        }
        (energy, gradient)
    }
}

impl TryFrom<Vec<Layer>> for Network {
    type Error = anyhow::Error;
    fn try_from(layers: Vec<Layer>) -> Result<Self> {
        Self::new(layers)
    }
}

impl From<Network> for Vec<Layer> {
    fn from(network: Network) -> Self {
        network.layers
    }
}
