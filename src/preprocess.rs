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

//! # Feature preprocessing
//!
//! Affine transformations applied to the feature vector before it enters the
//! network. Since every transformation is affine, $\mathbf{G}' = A\mathbf{G} + \mathbf{b}$,
//! the Jacobian transforms as $J' = AJ$, i.e. without the shift.
//!
//! All parameters are per element; the element of the central atom selects
//! which set is used.

use crate::symmetry::Descriptor;
use crate::{DMatrix, DVector};
use anyhow::{ensure, Context, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Affine map of a feature vector and its Jacobian
pub trait FeatureTransform {
    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    /// Check that the parameters describe an invertible (or, for projections,
    /// full rank in principle) map
    fn validate(&self) -> Result<()>;

    /// Transform feature values only
    fn transform_values(&self, values: &DVector) -> DVector;

    /// Transform feature values and the Jacobian of every axis
    fn transform(&self, descriptor: Descriptor) -> Descriptor;
}

/// Principal component projection, G' = M (G - mean)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct Pca {
    /// Projection matrix, output size × input size
    components: DMatrix,
    mean: DVector,
}

impl Pca {
    pub fn new(components: DMatrix, mean: DVector) -> Self {
        Self { components, mean }
    }
}

impl FeatureTransform for Pca {
    fn input_size(&self) -> usize {
        self.mean.len()
    }

    fn output_size(&self) -> usize {
        self.components.nrows()
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.components.ncols() == self.mean.len(),
            "PCA components have {} columns but the mean has {} values",
            self.components.ncols(),
            self.mean.len()
        );
        ensure!(
            self.output_size() >= 1 && self.output_size() <= self.input_size(),
            "PCA output size {} must be between 1 and the input size {}",
            self.output_size(),
            self.input_size()
        );
        ensure!(
            self.components.iter().chain(self.mean.iter()).all(|x| x.is_finite()),
            "PCA parameters must be finite"
        );
        Ok(())
    }

    fn transform_values(&self, values: &DVector) -> DVector {
        &self.components * (values - &self.mean)
    }

    fn transform(&self, descriptor: Descriptor) -> Descriptor {
        let values = self.transform_values(&descriptor.values);
        let jacobian = descriptor.jacobian.map(|jacobian| &self.components * jacobian);
        Descriptor { values, jacobian }
    }
}

/// Multiply Jacobian rows by per-feature factors
fn scale_rows(mut descriptor: Descriptor, factors: &DVector) -> Descriptor {
    for jacobian in descriptor.jacobian.iter_mut() {
        for mut column in jacobian.column_iter_mut() {
            column.component_mul_assign(factors);
        }
    }
    descriptor
}

/// Min-max scaling of each feature onto `[target_min, target_max]`
///
/// $$ G' = t_{min} + (G - G_{min}) \frac{t_{max} - t_{min}}{G_{max} - G_{min}} $$
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct Scaling {
    min: DVector,
    max: DVector,
    target_min: f64,
    target_max: f64,
}

impl Scaling {
    pub fn new(min: DVector, max: DVector, target_min: f64, target_max: f64) -> Self {
        Self {
            min,
            max,
            target_min,
            target_max,
        }
    }

    fn factors(&self) -> DVector {
        let target_range = self.target_max - self.target_min;
        (&self.max - &self.min).map(|range| target_range / range)
    }
}

impl FeatureTransform for Scaling {
    fn input_size(&self) -> usize {
        self.min.len()
    }

    fn output_size(&self) -> usize {
        self.min.len()
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.min.len() == self.max.len(),
            "scaling has {} minima but {} maxima",
            self.min.len(),
            self.max.len()
        );
        ensure!(
            self.target_min.is_finite()
                && self.target_max.is_finite()
                && self.target_max > self.target_min,
            "invalid scaling target range [{}, {}]",
            self.target_min,
            self.target_max
        );
        if let Some(feature) = self
            .min
            .iter()
            .zip(self.max.iter())
            .position(|(min, max)| !(min.is_finite() && max.is_finite() && max > min))
        {
            anyhow::bail!(
                "feature {} has an empty range [{}, {}]",
                feature + 1,
                self.min[feature],
                self.max[feature]
            );
        }
        Ok(())
    }

    fn transform_values(&self, values: &DVector) -> DVector {
        (values - &self.min)
            .component_mul(&self.factors())
            .add_scalar(self.target_min)
    }

    fn transform(&self, mut descriptor: Descriptor) -> Descriptor {
        let factors = self.factors();
        descriptor.values = (&descriptor.values - &self.min)
            .component_mul(&factors)
            .add_scalar(self.target_min);
        scale_rows(descriptor, &factors)
    }
}

/// Standardization to zero mean and unit variance, G' = (G - mean) / std
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct Standardization {
    mean: DVector,
    std: DVector,
}

impl Standardization {
    pub fn new(mean: DVector, std: DVector) -> Self {
        Self { mean, std }
    }
}

impl FeatureTransform for Standardization {
    fn input_size(&self) -> usize {
        self.mean.len()
    }

    fn output_size(&self) -> usize {
        self.mean.len()
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.mean.len() == self.std.len(),
            "standardization has {} means but {} standard deviations",
            self.mean.len(),
            self.std.len()
        );
        ensure!(
            self.mean.iter().all(|x| x.is_finite()),
            "standardization means must be finite"
        );
        if let Some(feature) = self.std.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            anyhow::bail!(
                "feature {} has non-positive standard deviation {}",
                feature + 1,
                self.std[feature]
            );
        }
        Ok(())
    }

    fn transform_values(&self, values: &DVector) -> DVector {
        (values - &self.mean).component_div(&self.std)
    }

    fn transform(&self, mut descriptor: Descriptor) -> Descriptor {
        descriptor.values = self.transform_values(&descriptor.values);
        let factors = self.std.map(f64::recip);
        scale_rows(descriptor, &factors)
    }
}

/// One preprocessing step with parameters for every element
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(rename_all = "lowercase")
)]
pub enum Preprocessor {
    Pca(Vec<Pca>),
    Scaling(Vec<Scaling>),
    Standardization(Vec<Standardization>),
}

impl Preprocessor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pca(_) => "pca",
            Self::Scaling(_) => "scaling",
            Self::Standardization(_) => "standardization",
        }
    }

    /// Number of elements with parameters
    pub fn len(&self) -> usize {
        match self {
            Self::Pca(p) => p.len(),
            Self::Scaling(p) => p.len(),
            Self::Standardization(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parameters for `element`
    pub fn for_element(&self, element: usize) -> &dyn FeatureTransform {
        match self {
            Self::Pca(p) => &p[element],
            Self::Scaling(p) => &p[element],
            Self::Standardization(p) => &p[element],
        }
    }
}

/// Ordered preprocessing steps
///
/// # Examples
/// ~~~
/// use hdnnp::preprocess::*;
/// use nalgebra::dvector;
/// let chain = PreprocessingChain::new(vec![Preprocessor::Standardization(vec![
///     Standardization::new(dvector![1.0, 2.0], dvector![0.5, 4.0]),
/// ])]);
/// assert_eq!(chain.transform_values(0, dvector![2.0, 0.0]), dvector![2.0, -0.5]);
/// ~~~
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreprocessingChain {
    steps: Vec<Preprocessor>,
}

impl PreprocessingChain {
    pub fn new(steps: Vec<Preprocessor>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Preprocessor] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check parameters and sizes along the chain.
    ///
    /// Returns the output size for each element, given `n_features` inputs.
    pub fn validate(&self, n_elements: usize, n_features: usize) -> Result<Vec<usize>> {
        let mut sizes = vec![n_features; n_elements];
        for (i, step) in self.steps.iter().enumerate() {
            let context = || format!("preprocessing step {} ({})", i + 1, step.name());
            ensure!(
                step.len() == n_elements,
                "{}: expected parameters for {} elements, found {}",
                context(),
                n_elements,
                step.len()
            );
            for (element, size) in sizes.iter_mut().enumerate() {
                let transform = step.for_element(element);
                transform
                    .validate()
                    .with_context(|| format!("{}, element {}", context(), element))?;
                ensure!(
                    transform.input_size() == *size,
                    "{}, element {}: expects {} features but receives {}",
                    context(),
                    element,
                    transform.input_size(),
                    size
                );
                *size = transform.output_size();
            }
        }
        Ok(sizes)
    }

    /// Apply all steps for a central atom of `element`
    pub fn transform(&self, element: usize, descriptor: Descriptor) -> Descriptor {
        self.steps
            .iter()
            .fold(descriptor, |d, step| step.for_element(element).transform(d))
    }

    /// Apply all steps to feature values only
    pub fn transform_values(&self, element: usize, values: DVector) -> DVector {
        self.steps.iter().fold(values, |v, step| {
            step.for_element(element).transform_values(&v)
        })
    }
}
