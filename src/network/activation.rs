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

//! Activation functions.

use anyhow::bail;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element-wise activation applied to the output of a layer
///
/// # Examples
/// ~~~
/// use hdnnp::Activation;
/// let activation: Activation = "elu".parse().unwrap();
/// assert_eq!(activation.evaluate(-1.0), ((-1.0_f64).exp() - 1.0, (-1.0_f64).exp()));
/// assert!("relu".parse::<Activation>().is_err());
/// ~~~
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(rename_all = "lowercase")
)]
pub enum Activation {
    /// f(x) = x
    Identity,
    /// f(x) = 1 / (1 + exp(-x))
    Sigmoid,
    /// f(x) = tanh(x)
    Tanh,
    /// Exponential linear unit, f(x) = x for x > 0 and exp(x) - 1 otherwise
    Elu,
}

impl Activation {
    /// Function value
    #[inline]
    pub fn value(&self, x: f64) -> f64 {
        match self {
            Self::Identity => x,
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp() - 1.0
                }
            }
        }
    }

    /// Function value and first derivative
    #[inline]
    pub fn evaluate(&self, x: f64) -> (f64, f64) {
        match self {
            Self::Identity => (x, 1.0),
            Self::Sigmoid => {
                let f = 1.0 / (1.0 + (-x).exp());
                (f, f * (1.0 - f))
            }
            Self::Tanh => {
                let f = x.tanh();
                (f, 1.0 - f * f)
            }
            Self::Elu => {
                if x > 0.0 {
                    (x, 1.0)
                } else {
                    let exp = x.exp();
                    (exp - 1.0, exp)
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Elu => "elu",
        }
    }
}

impl FromStr for Activation {
    type Err = anyhow::Error;
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "identity" => Self::Identity,
            "sigmoid" => Self::Sigmoid,
            "tanh" => Self::Tanh,
            "elu" => Self::Elu,
            _ => bail!("unknown activation function '{}'", name),
        })
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
