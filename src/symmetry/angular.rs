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

//! Three-body (angular) symmetry function, G4.

use super::{check_cutoff, Descriptor};
use crate::element::ElementTable;
use crate::geometry::LocalGeometry;
use crate::{Cutoff, CutoffFunction};
use anyhow::{ensure, Result};
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Angular symmetry function, G4
///
/// $$ G^4_i = 2^{1-\zeta} \sum_{j<k} (1 + \lambda \cos\theta_{ijk})^\zeta
///    e^{-\eta (R_{ij}^2 + R_{ik}^2)} f_c(R_{ij}) f_c(R_{ik}) $$
///
/// where the sum runs over unordered neighbor pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct Angular {
    /// Cutoff radius, Rc
    rc: f64,
    /// Gaussian width, η
    eta: f64,
    /// Sign of the angular term, λ = ±1
    lambda: f64,
    /// Angular sharpness, ζ
    zeta: f64,
}

/// Contribution of one neighbor pair and its partial derivatives
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularTerm {
    pub value: f64,
    /// ∂/∂R_j
    pub d_first: f64,
    /// ∂/∂R_k
    pub d_second: f64,
    /// ∂/∂cosθ_jk
    pub d_cosine: f64,
}

impl Angular {
    pub const fn new(rc: f64, eta: f64, lambda: f64, zeta: f64) -> Self {
        Self {
            rc,
            eta,
            lambda,
            zeta,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_cutoff(self.rc)?;
        ensure!(
            self.eta.is_finite() && self.eta >= 0.0,
            "Gaussian width eta must be non-negative, got {}",
            self.eta
        );
        ensure!(
            self.lambda == 1.0 || self.lambda == -1.0,
            "angular sign lambda must be +1 or -1, got {}",
            self.lambda
        );
        ensure!(
            self.zeta.is_finite() && self.zeta > 0.0,
            "angular sharpness zeta must be positive, got {}",
            self.zeta
        );
        Ok(())
    }

    /// Angular factor $(1 + \lambda\cos\theta)^\zeta$ and its derivative
    /// with respect to $\cos\theta$
    ///
    /// A vanishing (or round-off negative) base gives zero; the derivative is then
    /// zero as well, except for ζ = 1 where the factor is linear.
    #[inline]
    fn angular_factor(&self, cosine: f64) -> (f64, f64) {
        let base = 1.0 + self.lambda * cosine;
        if base > 0.0 {
            let power = base.powf(self.zeta - 1.0);
            (power * base, self.zeta * self.lambda * power)
        } else if self.zeta == 1.0 {
            (0.0, self.lambda)
        } else {
            (0.0, 0.0)
        }
    }

    /// Contribution of the neighbor pair at distances `first` and `second`
    /// with bond-angle cosine `cosine`
    #[inline]
    pub fn term(&self, first: f64, second: f64, cosine: f64) -> AngularTerm {
        if first >= self.rc || second >= self.rc {
            return AngularTerm::default();
        }
        let cutoff = CutoffFunction::new(self.rc);
        let (fc_first, dfc_first) = cutoff.value_and_derivative(first);
        let (fc_second, dfc_second) = cutoff.value_and_derivative(second);
        let (angular, d_angular) = self.angular_factor(cosine);
        let radial =
            (1.0 - self.zeta).exp2() * (-self.eta * (first * first + second * second)).exp();
        let common = angular * radial;
        AngularTerm {
            value: common * fc_first * fc_second,
            d_first: common * fc_second * (dfc_first - 2.0 * self.eta * first * fc_first),
            d_second: common * fc_first * (dfc_second - 2.0 * self.eta * second * fc_second),
            d_cosine: d_angular * radial * fc_first * fc_second,
        }
    }
}

impl Cutoff for Angular {
    fn cutoff(&self) -> f64 {
        self.rc
    }
}

/// Add the contributions of angular functions to `descriptor`.
///
/// Feature `offset + p * n_pairs + pair` collects function `p` over all neighbor
/// pairs whose elements form `pair`.
pub(crate) fn accumulate(
    functions: &[Angular],
    offset: usize,
    elements: &ElementTable,
    geometry: &LocalGeometry,
    neighbor_elements: &[usize],
    descriptor: &mut Descriptor,
) {
    if functions.is_empty() {
        return;
    }
    let n_pairs = elements.n_pairs();
    let max_cutoff = functions.iter().map(Cutoff::cutoff).fold(0.0, f64::max);
    let distances = &geometry.distances;
    for (j, k) in (0..geometry.len()).tuple_combinations() {
        if distances[j] >= max_cutoff || distances[k] >= max_cutoff {
            continue;
        }
        let pair = elements.pair_index(neighbor_elements[j], neighbor_elements[k]);
        let cosine = geometry.cosines[(j, k)];
        for (p, function) in functions.iter().enumerate() {
            let term = function.term(distances[j], distances[k], cosine);
            if term == AngularTerm::default() {
                continue;
            }
            let feature = offset + p * n_pairs + pair;
            descriptor.values[feature] += term.value;
            for axis in 0..3 {
                let d_distance = &geometry.distance_derivatives[axis];
                let d_cosine = &geometry.cosine_derivatives[axis];
                let jacobian = &mut descriptor.jacobian[axis];
                jacobian[(feature, j)] +=
                    term.d_first * d_distance[j] + term.d_cosine * d_cosine[(j, k)];
                jacobian[(feature, k)] +=
                    term.d_second * d_distance[k] + term.d_cosine * d_cosine[(k, j)];
            }
        }
    }
}
