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

//! Smooth cutoff function shared by all symmetry functions.

use crate::Cutoff;

/// Hyperbolic tangent cutoff function
///
/// $$ f_c(r) = \tanh^3\left(1 - \frac{r}{r_c}\right) $$
///
/// for $r < r_c$ and zero otherwise. Value and first derivative both vanish at $r_c$.
///
/// # Examples
/// ~~~
/// use hdnnp::CutoffFunction;
/// let fc = CutoffFunction::new(6.0);
/// assert!((fc.value(3.0) - 0.5_f64.tanh().powi(3)).abs() < 1e-15);
/// assert_eq!(fc.value(6.0), 0.0);
/// ~~~
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoffFunction {
    radius: f64,
}

impl CutoffFunction {
    pub fn new(radius: f64) -> Self {
        assert!(radius > 0.0, "cutoff radius must be positive");
        Self { radius }
    }

    /// Cutoff function value, $f_c(r)$
    #[inline]
    pub fn value(&self, distance: f64) -> f64 {
        if distance >= self.radius {
            return 0.0;
        }
        (1.0 - distance / self.radius).tanh().powi(3)
    }

    /// Derivative with respect to distance, $f_c'(r) = -3 \tanh^2 (1 - \tanh^2) / r_c$
    #[inline]
    pub fn derivative(&self, distance: f64) -> f64 {
        self.value_and_derivative(distance).1
    }

    /// Value and derivative in one go, sharing the hyperbolic tangent
    #[inline]
    pub fn value_and_derivative(&self, distance: f64) -> (f64, f64) {
        if distance >= self.radius {
            return (0.0, 0.0);
        }
        let tanh = (1.0 - distance / self.radius).tanh();
        let tanh_squared = tanh * tanh;
        (
            tanh_squared * tanh,
            -3.0 * tanh_squared * (1.0 - tanh_squared) / self.radius,
        )
    }
}

impl Cutoff for CutoffFunction {
    fn cutoff(&self) -> f64 {
        self.radius
    }
}
