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

#![cfg(feature = "serde")]

use hdnnp::preprocess::{Pca, Standardization};
use hdnnp::*;
use nalgebra::{dmatrix, dvector};

fn parameters() -> PotentialParameters {
    let elements = ElementTable::new(["H", "O"]).unwrap();
    let symmetry = SymmetryFunctionSet::new(
        vec![RadialCutoff::new(5.0)],
        vec![RadialGaussian::new(5.0, 0.5, 1.0)],
        vec![Angular::new(5.0, 0.1, -1.0, 2.0)],
    );
    let network = |w: f64| {
        Network::new(vec![
            Layer::new(dmatrix![w, 0.0; 0.0, -w], dvector![0.1, 0.2], Activation::Tanh),
            Layer::new(dmatrix![1.0, 1.0], dvector![0.0], Activation::Identity),
        ])
        .unwrap()
    };
    PotentialParameters {
        elements,
        symmetry,
        preprocessing: vec![
            Preprocessor::Standardization(vec![
                Standardization::new(DVector::zeros(7), DVector::from_element(7, 2.0)),
                Standardization::new(DVector::zeros(7), DVector::from_element(7, 0.5)),
            ]),
            Preprocessor::Pca(vec![
                Pca::new(DMatrix::identity(2, 7), DVector::zeros(7)),
                Pca::new(DMatrix::identity(2, 7), DVector::from_element(7, 0.1)),
            ]),
        ],
        networks: vec![network(0.5), network(-1.5)],
    }
}

#[test]
fn parameters_roundtrip() {
    let parameters = parameters();
    let json = serde_json::to_string(&parameters).unwrap();
    let restored: PotentialParameters = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, parameters);
    let potential = NeuralNetworkPotential::new(restored).unwrap();
    assert_eq!(potential.to_parameters(), parameters);
}

#[test]
fn symmetry_functions_from_json() {
    let json = r#"{
        "type1": [{"rc": 6.0}],
        "type4": [{"rc": 6.0, "eta": 0.01, "lambda": -1.0, "zeta": 4.0}]
    }"#;
    let set: SymmetryFunctionSet = serde_json::from_str(json).unwrap();
    assert_eq!(set.radial_cutoff(), &[RadialCutoff::new(6.0)]);
    assert!(set.radial_gaussian().is_empty());
    assert_eq!(set.angular(), &[Angular::new(6.0, 0.01, -1.0, 4.0)]);
    assert!(serde_json::from_str::<SymmetryFunctionSet>(r#"{"type3": []}"#).is_err());
}

#[test]
fn invalid_tables_are_rejected() {
    assert!(serde_json::from_str::<ElementTable>(r#"["H", "H"]"#).is_err());
    assert!(serde_json::from_str::<Activation>(r#""relu""#).is_err());
    assert_eq!(
        serde_json::from_str::<Activation>(r#""elu""#).unwrap(),
        Activation::Elu
    );
    assert_eq!(
        serde_json::from_str::<EvaluationOptions>("{}").unwrap(),
        EvaluationOptions::default()
    );
}
