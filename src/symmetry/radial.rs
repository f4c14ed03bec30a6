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

//! Two-body (radial) symmetry functions, G1 and G2.

use super::{check_cutoff, Descriptor};
use crate::geometry::LocalGeometry;
use crate::{Cutoff, CutoffFunction};
use anyhow::{ensure, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Symmetry function depending on the distance to a single neighbor
pub trait RadialSymmetryFunction: Cutoff {
    /// Contribution of one neighbor at `distance` and its derivative with respect to that distance
    fn radial(&self, distance: f64) -> (f64, f64);
}

/// Cutoff-only radial symmetry function, G1
///
/// $$ G^1_i = \sum_j f_c(R_{ij}) $$
///
/// # Examples
/// ~~~
/// use hdnnp::symmetry::{RadialCutoff, RadialSymmetryFunction};
/// let g1 = RadialCutoff::new(6.0);
/// let (value, _) = g1.radial(3.0);
/// assert!((value - 0.1101).abs() < 1e-4);
/// ~~~
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct RadialCutoff {
    /// Cutoff radius, Rc
    rc: f64,
}

impl RadialCutoff {
    pub const fn new(rc: f64) -> Self {
        Self { rc }
    }

    pub fn validate(&self) -> Result<()> {
        check_cutoff(self.rc)
    }
}

impl Cutoff for RadialCutoff {
    fn cutoff(&self) -> f64 {
        self.rc
    }
}

impl RadialSymmetryFunction for RadialCutoff {
    #[inline]
    fn radial(&self, distance: f64) -> (f64, f64) {
        CutoffFunction::new(self.rc).value_and_derivative(distance)
    }
}

/// Gaussian radial symmetry function, G2
///
/// $$ G^2_i = \sum_j e^{-\eta (R_{ij} - R_s)^2} f_c(R_{ij}) $$
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct RadialGaussian {
    /// Cutoff radius, Rc
    rc: f64,
    /// Gaussian width, η
    eta: f64,
    /// Gaussian center, Rs
    rs: f64,
}

impl RadialGaussian {
    pub const fn new(rc: f64, eta: f64, rs: f64) -> Self {
        Self { rc, eta, rs }
    }

    pub fn validate(&self) -> Result<()> {
        check_cutoff(self.rc)?;
        ensure!(
            self.eta.is_finite() && self.eta >= 0.0,
            "Gaussian width eta must be non-negative, got {}",
            self.eta
        );
        ensure!(self.rs.is_finite(), "Gaussian shift Rs must be finite");
        Ok(())
    }
}

impl Cutoff for RadialGaussian {
    fn cutoff(&self) -> f64 {
        self.rc
    }
}

impl RadialSymmetryFunction for RadialGaussian {
    #[inline]
    fn radial(&self, distance: f64) -> (f64, f64) {
        let (fc, dfc) = CutoffFunction::new(self.rc).value_and_derivative(distance);
        if fc == 0.0 && dfc == 0.0 {
            return (0.0, 0.0);
        }
        let shifted = distance - self.rs;
        let gaussian = (-self.eta * shifted * shifted).exp();
        (
            gaussian * fc,
            gaussian * (dfc - 2.0 * self.eta * shifted * fc),
        )
    }
}

/// Add the contributions of radial functions to `descriptor`.
///
/// Feature `offset + p * n_elements + t` collects function `p` over all neighbors of element `t`.
pub(crate) fn accumulate<T: RadialSymmetryFunction>(
    functions: &[T],
    offset: usize,
    n_elements: usize,
    geometry: &LocalGeometry,
    neighbor_elements: &[usize],
    descriptor: &mut Descriptor,
) {
    for (j, (&distance, &element)) in geometry
        .distances
        .iter()
        .zip(neighbor_elements)
        .enumerate()
    {
        for (p, function) in functions.iter().enumerate() {
            let (value, derivative) = function.radial(distance);
            if value == 0.0 && derivative == 0.0 {
                continue;
            }
            let feature = offset + p * n_elements + element;
            descriptor.values[feature] += value;
            for (jacobian, unit) in descriptor
                .jacobian
                .iter_mut()
                .zip(&geometry.distance_derivatives)
            {
                jacobian[(feature, j)] += derivative * unit[j];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_g1_value() {
        assert_relative_eq!(
            RadialCutoff::new(6.0).radial(3.0).0,
            0.5_f64.tanh().powi(3),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_g2_reduces_to_g1_for_zero_width() {
        let g1 = RadialCutoff::new(5.0);
        let g2 = RadialGaussian::new(5.0, 0.0, 1.3);
        for r in [0.8, 2.0, 4.4] {
            let (a, b) = (g1.radial(r), g2.radial(r));
            assert_relative_eq!(a.0, b.0);
            assert_relative_eq!(a.1, b.1);
        }
    }

    #[test]
    fn test_g2_derivative() {
        const EPS: f64 = 1e-6;
        let g2 = RadialGaussian::new(4.5, 0.7, 1.5);
        for r in [0.6, 1.5, 2.9, 4.4] {
            let numeric = (g2.radial(r + EPS).0 - g2.radial(r - EPS).0) / (2.0 * EPS);
            assert_relative_eq!(g2.radial(r).1, numeric, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_zero_at_and_beyond_cutoff() {
        let g2 = RadialGaussian::new(3.0, 0.2, 0.0);
        assert_eq!(g2.radial(3.0), (0.0, 0.0));
        assert_eq!(g2.radial(7.0), (0.0, 0.0));
        assert_eq!(RadialCutoff::new(3.0).radial(3.5), (0.0, 0.0));
    }

    #[test]
    fn test_validation() {
        assert!(RadialCutoff::new(0.0).validate().is_err());
        assert!(RadialCutoff::new(-1.0).validate().is_err());
        assert!(RadialGaussian::new(6.0, -0.1, 0.0).validate().is_err());
        assert!(RadialGaussian::new(6.0, 0.1, f64::NAN).validate().is_err());
        assert!(RadialGaussian::new(6.0, 0.1, 2.0).validate().is_ok());
    }
}
