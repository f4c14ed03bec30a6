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

//! # Potential files
//!
//! Plain text, whitespace separated. Empty lines and lines starting with `#`
//! are ignored. The file has three sections:
//!
//! ```text
//! # symmetry functions: number of blocks, then per block "typeN count" and count rows
//! 2
//! type1 1
//! 6.0                    # Rc
//! type4 1
//! 6.0 0.01 1 2           # Rc eta lambda zeta  (type2 rows: Rc eta Rs)
//! # preprocessing: number of steps, then per step a tag and one block per element
//! 1
//! standardization
//! H 5                    # element size, then a row of means and a row of std
//! ...
//! # networks: depth, then depth × elements layers
//! 2
//! H 1 5 3 tanh           # element layer inputs outputs activation
//! ...                    # `inputs` rows of `outputs` weights, then the bias row
//! ```
//!
//! PCA blocks read `element outputs inputs`, followed by `outputs` rows of
//! `inputs` components and a row of `inputs` means. Scaling blocks read
//! `element size target_min target_max`, followed by a row of minima and a row
//! of maxima.
//!
//! Element names are resolved against the [`ElementTable`] given by the caller,
//! and the file must provide networks and preprocessing parameters for exactly
//! these elements.

use crate::element::ElementTable;
use crate::network::{Activation, Layer, Network};
use crate::potential::{NeuralNetworkPotential, PotentialParameters};
use crate::preprocess::{FeatureTransform, Pca, Preprocessor, Scaling, Standardization};
use crate::symmetry::{Angular, RadialCutoff, RadialGaussian, SymmetryFunctionSet};
use crate::{DMatrix, DVector};
use anyhow::{anyhow, bail, ensure, Context, Result};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// A non-empty, non-comment line split into words
struct Line<'a> {
    number: usize,
    words: Vec<&'a str>,
}

impl Line<'_> {
    fn expect_len(&self, n: usize, what: &str) -> Result<()> {
        ensure!(
            self.words.len() == n,
            "line {}: expected {} values for {}, found {}",
            self.number,
            n,
            what,
            self.words.len()
        );
        Ok(())
    }

    fn parse<T: FromStr>(&self, index: usize, what: &str) -> Result<T> {
        let word = self.words[index];
        word.parse()
            .map_err(|_| anyhow!("line {}: cannot read {} from '{}'", self.number, what, word))
    }

    fn numbers(&self, n: usize, what: &str) -> Result<Vec<f64>> {
        self.expect_len(n, what)?;
        (0..n).map(|i| self.parse(i, what)).collect()
    }
}

struct Reader<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
        }
    }

    fn next_line(&mut self, what: &str) -> Result<Line<'a>> {
        self.lines
            .by_ref()
            .map(|(i, line)| (i + 1, line.trim()))
            .find(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(number, line)| Line {
                number,
                words: line.split_whitespace().collect(),
            })
            .ok_or_else(|| anyhow!("unexpected end of file while reading {}", what))
    }

    /// A line holding a single count
    fn count(&mut self, what: &str) -> Result<usize> {
        let line = self.next_line(what)?;
        line.expect_len(1, what)?;
        line.parse(0, what)
    }

    /// A line holding exactly `n` numbers
    fn row(&mut self, n: usize, what: &str) -> Result<Vec<f64>> {
        self.next_line(what)?.numbers(n, what)
    }

    /// `rows` lines of `columns` numbers, flattened row by row
    fn rows(&mut self, rows: usize, columns: usize, what: &str) -> Result<Vec<f64>> {
        let mut values = Vec::new();
        for _ in 0..rows {
            values.extend(self.row(columns, what)?);
        }
        Ok(values)
    }

    fn finish(mut self) -> Result<()> {
        if let Ok(line) = self.next_line("") {
            bail!("line {}: unexpected content after the last layer", line.number);
        }
        Ok(())
    }
}

fn read_symmetry_functions(reader: &mut Reader) -> Result<SymmetryFunctionSet> {
    let n_blocks = reader.count("number of symmetry function blocks")?;
    let (mut g1, mut g2, mut g4) = (Vec::new(), Vec::new(), Vec::new());
    for _ in 0..n_blocks {
        let header = reader.next_line("symmetry function block header")?;
        header.expect_len(2, "symmetry function block header")?;
        let tag = header.words[0];
        ensure!(
            matches!(tag, "type1" | "type2" | "type4"),
            "line {}: unknown symmetry function type '{}'",
            header.number,
            tag
        );
        let count: usize = header.parse(1, "number of symmetry functions")?;
        for _ in 0..count {
            let line = reader.next_line(tag)?;
            let context = || format!("line {}", line.number);
            match tag {
                "type1" => {
                    let p = line.numbers(1, "type1 parameters (Rc)")?;
                    let g = RadialCutoff::new(p[0]);
                    g.validate().with_context(context)?;
                    g1.push(g);
                }
                "type2" => {
                    let p = line.numbers(3, "type2 parameters (Rc eta Rs)")?;
                    let g = RadialGaussian::new(p[0], p[1], p[2]);
                    g.validate().with_context(context)?;
                    g2.push(g);
                }
                _ => {
                    let p = line.numbers(4, "type4 parameters (Rc eta lambda zeta)")?;
                    let g = Angular::new(p[0], p[1], p[2], p[3]);
                    g.validate().with_context(context)?;
                    g4.push(g);
                }
            }
        }
        debug!("read {} symmetry functions of {}", count, tag);
    }
    Ok(SymmetryFunctionSet::new(g1, g2, g4))
}

/// Element index named on a block header
fn element_of(line: &Line, elements: &ElementTable) -> Result<usize> {
    let name = line.words[0];
    elements.index_of(name).ok_or_else(|| {
        anyhow!(
            "line {}: element '{}' is not one of {}",
            line.number,
            name,
            elements.names().join(", ")
        )
    })
}

/// Read and check one block per element, returning the blocks in element order
fn per_element<T: FeatureTransform>(
    reader: &mut Reader,
    elements: &ElementTable,
    what: &str,
    read_block: fn(&mut Reader, &Line) -> Result<T>,
) -> Result<Vec<T>> {
    let mut blocks: Vec<Option<T>> = (0..elements.len()).map(|_| None).collect();
    for _ in 0..elements.len() {
        let header = reader.next_line(what)?;
        let element = element_of(&header, elements)?;
        ensure!(
            blocks[element].is_none(),
            "line {}: second {} block for element '{}'",
            header.number,
            what,
            elements.name(element)
        );
        let block = read_block(reader, &header)?;
        block
            .validate()
            .with_context(|| format!("{} block starting on line {}", what, header.number))?;
        blocks[element] = Some(block);
    }
    // as many blocks as elements and none repeated, so every slot is filled
    Ok(blocks.into_iter().flatten().collect())
}

fn read_pca(reader: &mut Reader, header: &Line) -> Result<Pca> {
    header.expect_len(3, "PCA header (element outputs inputs)")?;
    let outputs: usize = header.parse(1, "PCA output size")?;
    let inputs: usize = header.parse(2, "PCA input size")?;
    let components = reader.rows(outputs, inputs, "PCA components")?;
    let mean = reader.row(inputs, "PCA mean")?;
    Ok(Pca::new(
        DMatrix::from_row_slice(outputs, inputs, &components),
        DVector::from_vec(mean),
    ))
}

fn read_scaling(reader: &mut Reader, header: &Line) -> Result<Scaling> {
    header.expect_len(4, "scaling header (element size target_min target_max)")?;
    let size: usize = header.parse(1, "scaling size")?;
    let target_min: f64 = header.parse(2, "scaling target minimum")?;
    let target_max: f64 = header.parse(3, "scaling target maximum")?;
    let min = reader.row(size, "scaling minima")?;
    let max = reader.row(size, "scaling maxima")?;
    Ok(Scaling::new(
        DVector::from_vec(min),
        DVector::from_vec(max),
        target_min,
        target_max,
    ))
}

fn read_standardization(reader: &mut Reader, header: &Line) -> Result<Standardization> {
    header.expect_len(2, "standardization header (element size)")?;
    let size: usize = header.parse(1, "standardization size")?;
    let mean = reader.row(size, "standardization mean")?;
    let std = reader.row(size, "standardization standard deviation")?;
    Ok(Standardization::new(
        DVector::from_vec(mean),
        DVector::from_vec(std),
    ))
}

fn read_preprocessing(reader: &mut Reader, elements: &ElementTable) -> Result<Vec<Preprocessor>> {
    let n_steps = reader.count("number of preprocessing steps")?;
    let mut steps = Vec::new();
    for _ in 0..n_steps {
        let tag = reader.next_line("preprocessing tag")?;
        tag.expect_len(1, "preprocessing tag")?;
        let step = match tag.words[0] {
            "pca" => Preprocessor::Pca(per_element(reader, elements, "PCA", read_pca)?),
            "scaling" => {
                Preprocessor::Scaling(per_element(reader, elements, "scaling", read_scaling)?)
            }
            "standardization" => Preprocessor::Standardization(per_element(
                reader,
                elements,
                "standardization",
                read_standardization,
            )?),
            other => bail!("line {}: unknown preprocessing '{}'", tag.number, other),
        };
        debug!("read {} preprocessing", step.name());
        steps.push(step);
    }
    Ok(steps)
}

fn read_networks(reader: &mut Reader, elements: &ElementTable) -> Result<Vec<Network>> {
    let depth = reader.count("network depth")?;
    ensure!(depth > 0, "network depth must be positive");
    let n_layers = depth
        .checked_mul(elements.len())
        .ok_or_else(|| anyhow!("network depth {} is too large", depth))?;
    // keyed by (element, layer number); slots are only filled by layers actually read
    let mut layers: BTreeMap<(usize, usize), Layer> = BTreeMap::new();
    for _ in 0..n_layers {
        let header = reader.next_line("layer header")?;
        header.expect_len(5, "layer header (element layer inputs outputs activation)")?;
        let element = element_of(&header, elements)?;
        let index: usize = header.parse(1, "layer number")?;
        let inputs: usize = header.parse(2, "layer input size")?;
        let outputs: usize = header.parse(3, "layer output size")?;
        let activation: Activation = header.words[4]
            .parse()
            .with_context(|| format!("line {}", header.number))?;
        ensure!(
            (1..=depth).contains(&index),
            "line {}: layer number {} is outside 1..={}",
            header.number,
            index,
            depth
        );
        ensure!(
            !layers.contains_key(&(element, index)),
            "line {}: layer {} of element '{}' appears twice",
            header.number,
            index,
            elements.name(element)
        );
        // one row per input, i.e. the transposed weight matrix
        let weights = reader.rows(inputs, outputs, "layer weights")?;
        let bias = reader.row(outputs, "layer bias")?;
        let layer = Layer::new(
            DMatrix::from_column_slice(outputs, inputs, &weights),
            DVector::from_vec(bias),
            activation,
        );
        layers.insert((element, index), layer);
        debug!(
            "read layer {} of {}: {} -> {} ({})",
            index,
            elements.name(element),
            inputs,
            outputs,
            activation
        );
    }
    // n_layers distinct (element, index) keys within range: every layer is present
    let mut networks: Vec<Vec<Layer>> = (0..elements.len()).map(|_| Vec::new()).collect();
    for ((element, _), layer) in layers {
        networks[element].push(layer);
    }
    networks
        .into_iter()
        .enumerate()
        .map(|(element, layers)| {
            Network::new(layers)
                .with_context(|| format!("network of element '{}'", elements.name(element)))
        })
        .collect()
}

impl PotentialParameters {
    /// Parse the text of a potential file for the given elements
    pub fn parse(text: &str, elements: ElementTable) -> Result<Self> {
        let mut reader = Reader::new(text);
        let symmetry = read_symmetry_functions(&mut reader).context("symmetry functions")?;
        let preprocessing = read_preprocessing(&mut reader, &elements).context("preprocessing")?;
        let networks = read_networks(&mut reader, &elements).context("networks")?;
        reader.finish()?;
        Ok(Self {
            elements,
            symmetry,
            preprocessing,
            networks,
        })
    }

    /// Read a potential file for the given elements
    pub fn from_file(path: impl AsRef<Path>, elements: ElementTable) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read potential file '{}'", path.display()))?;
        Self::parse(&text, elements)
            .with_context(|| format!("malformed potential file '{}'", path.display()))
    }
}

impl NeuralNetworkPotential {
    /// Read and validate a potential file for the given elements
    pub fn from_file(path: impl AsRef<Path>, elements: ElementTable) -> Result<Self> {
        let path = path.as_ref();
        let parameters = PotentialParameters::from_file(path, elements)?;
        Self::new(parameters).with_context(|| format!("invalid potential '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector3;
    use nalgebra::{dmatrix, dvector};

    const FILE: &str = "
# symmetry functions
2
type1 1
6.0
type4 1
6.0 0.1 -1 1.0

# preprocessing
2
standardization
O 5
0.1 0.2 0.3 0.4 0.5
1.0 2.0 1.0 2.0 1.0
H 5
0.0 0.0 0.0 0.0 0.0
1.0 1.0 1.0 1.0 1.0
pca
H 2 5
1 0 0 0 0
0 1 0 0 0
0 0 0 0 0
O 1 5
0.2 0.2 0.2 0.2 0.2
0.5 0.5 0.5 0.5 0.5

# networks
2
H 1 2 2 tanh
0.1 0.2
0.3 0.4
0.0 -0.1
O 2 3 1 identity
1.0
2.0
3.0
0.5
O 1 1 3 elu
0.1 0.2 0.3
0 0 0
H 2 2 1 sigmoid
1.0
-1.0
0.0
";

    fn elements() -> ElementTable {
        ElementTable::new(["H", "O"]).unwrap()
    }

    #[test]
    fn test_parse_full_file() {
        let parameters = PotentialParameters::parse(FILE, elements()).unwrap();
        let symmetry = &parameters.symmetry;
        assert_eq!(symmetry.radial_cutoff(), &[RadialCutoff::new(6.0)]);
        assert!(symmetry.radial_gaussian().is_empty());
        assert_eq!(symmetry.angular(), &[Angular::new(6.0, 0.1, -1.0, 1.0)]);
        assert_eq!(symmetry.n_features(&parameters.elements), 5);

        assert_eq!(parameters.preprocessing.len(), 2);
        match &parameters.preprocessing[1] {
            Preprocessor::Pca(pca) => {
                assert_eq!(pca[0].output_size(), 2);
                assert_eq!(pca[1].output_size(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        let h = &parameters.networks[0];
        assert_eq!(h.depth(), 2);
        // file rows are inputs, matrix rows are outputs
        assert_eq!(h.layers()[0].weights(), &dmatrix![0.1, 0.3; 0.2, 0.4]);
        assert_eq!(h.layers()[0].bias(), &dvector![0.0, -0.1]);
        assert_eq!(h.layers()[1].activation(), Activation::Sigmoid);
        let o = &parameters.networks[1];
        assert_eq!(o.layers()[0].activation(), Activation::Elu);
        assert_eq!(o.layers()[1].weights(), &dmatrix![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parsed_potential_evaluates() {
        let parameters = PotentialParameters::parse(FILE, elements()).unwrap();
        let potential = NeuralNetworkPotential::new(parameters).unwrap();
        assert_eq!(potential.n_features(), 5);
        assert_eq!(potential.network(1).input_size(), 1);
        let result = potential.evaluate(
            0,
            &[Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.2, 0.3)],
            &[1, 0],
        );
        assert!(result.energy.is_finite());
        assert_eq!(result.neighbor_forces.len(), 2);
    }

    #[test]
    fn test_width_mismatch_is_rejected_on_load() {
        // two G1 functions give 7 features, but the standardization expects 5
        let text = FILE.replace("type1 1\n6.0", "type1 2\n6.0\n4.0");
        let parameters = PotentialParameters::parse(&text, elements()).unwrap();
        assert_eq!(parameters.symmetry.n_features(&parameters.elements), 7);
        assert!(NeuralNetworkPotential::new(parameters).is_err());
    }

    #[test]
    fn test_unknown_activation() {
        let text = FILE.replace("elu", "relu");
        let message = format!("{:#}", PotentialParameters::parse(&text, elements()).unwrap_err());
        assert!(message.contains("unknown activation function 'relu'"));
    }

    #[test]
    fn test_unknown_tags() {
        let text = FILE.replace("type4", "type3");
        assert!(PotentialParameters::parse(&text, elements()).is_err());
        let text = FILE.replace("pca", "whitening");
        let message = format!("{:#}", PotentialParameters::parse(&text, elements()).unwrap_err());
        assert!(message.contains("unknown preprocessing 'whitening'"));
    }

    #[test]
    fn test_wrong_value_count() {
        let text = FILE.replace("6.0 0.1 -1 1.0", "6.0 0.1 -1");
        let message = format!("{:#}", PotentialParameters::parse(&text, elements()).unwrap_err());
        assert!(message.contains("line 7"));
    }

    #[test]
    fn test_element_mismatch() {
        let elements = ElementTable::new(["H", "C"]).unwrap();
        let message = format!("{:#}", PotentialParameters::parse(FILE, elements).unwrap_err());
        assert!(message.contains("element 'O' is not one of H, C"));
        let elements = ElementTable::new(["H"]).unwrap();
        assert!(PotentialParameters::parse(FILE, elements).is_err());
    }

    #[test]
    fn test_truncated_file() {
        let truncated = &FILE[..FILE.find("H 2 2 1 sigmoid").unwrap()];
        let message = format!(
            "{:#}",
            PotentialParameters::parse(truncated, elements()).unwrap_err()
        );
        assert!(message.contains("unexpected end of file"));
    }

    #[test]
    fn test_trailing_content() {
        let text = format!("{}\n1.0 2.0\n", FILE);
        assert!(PotentialParameters::parse(&text, elements()).is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        let text = FILE.replace("6.0 0.1 -1 1.0", "6.0 0.1 0.5 1.0");
        let message = format!("{:#}", PotentialParameters::parse(&text, elements()).unwrap_err());
        assert!(message.contains("lambda"));
        let text = FILE.replace("1.0 2.0 1.0 2.0 1.0", "1.0 2.0 0.0 2.0 1.0");
        let message = format!("{:#}", PotentialParameters::parse(&text, elements()).unwrap_err());
        assert!(message.contains("standard deviation"));
    }

    #[test]
    fn test_huge_counts_are_errors() {
        let single = || ElementTable::new(["H"]).unwrap();
        // network depth far beyond the layers present
        let text = "1\ntype1 1\n6.0\n0\n1000000000000000000\n";
        assert!(PotentialParameters::parse(text, single()).is_err());
        // depth times element count overflows
        let text = format!("1\ntype1 1\n6.0\n0\n{}\n", usize::MAX);
        let message = format!("{:#}", PotentialParameters::parse(&text, elements()).unwrap_err());
        assert!(message.contains("too large"));
        // PCA header claiming an enormous matrix
        let text = "1\ntype1 1\n6.0\n1\npca\nH 4000000000 4000000000\n1 2\n";
        let message = format!("{:#}", PotentialParameters::parse(text, single()).unwrap_err());
        assert!(message.contains("PCA components"));
        // layer header claiming an enormous weight matrix
        let text = "1\ntype1 1\n6.0\n0\n1\nH 1 4000000000 4000000000 tanh\n1 2\n";
        let message = format!("{:#}", PotentialParameters::parse(text, single()).unwrap_err());
        assert!(message.contains("layer weights"));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("hdnnp-test-{}.nnp", std::process::id()));
        std::fs::write(&path, FILE).unwrap();
        let potential = NeuralNetworkPotential::from_file(&path, elements());
        std::fs::remove_file(&path).unwrap();
        assert_eq!(potential.unwrap().elements().names(), ["H", "O"]);
        let missing = NeuralNetworkPotential::from_file("/nonexistent/potential.nnp", elements());
        assert!(missing.is_err());
    }
}
