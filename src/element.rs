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

//! Chemical elements known to a potential and their unordered pairs.

use anyhow::{ensure, Result};
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered list of element names with a name → index lookup
///
/// The position of an element in the table is the element index used
/// throughout the crate, e.g. for selecting the per-element network and for
/// the feature layout of the symmetry functions.
///
/// # Examples
/// ~~~
/// use hdnnp::ElementTable;
/// let elements = ElementTable::new(["H", "O"]).unwrap();
/// assert_eq!(elements.index_of("O"), Some(1));
/// assert_eq!(elements.n_pairs(), 3);
/// assert_eq!(elements.pair_index(1, 0), elements.pair_index(0, 1));
/// ~~~
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(try_from = "Vec<String>", into = "Vec<String>")
)]
pub struct ElementTable {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl ElementTable {
    /// Build from element names; names must be unique and non-empty.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        ensure!(!names.is_empty(), "at least one element is required");
        let mut lookup = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            ensure!(!name.is_empty(), "empty element name");
            ensure!(
                lookup.insert(name.clone(), index).is_none(),
                "element '{}' is listed more than once",
                name
            );
        }
        Ok(Self { names, lookup })
    }

    /// Number of distinct elements
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of unordered element pairs, including same-element pairs
    pub fn n_pairs(&self) -> usize {
        self.len() * (self.len() + 1) / 2
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Symmetric index of the unordered pair (i, j)
    ///
    /// Pairs are enumerated as (0,0), (0,1), ..., (0,n-1), (1,1), (1,2), ...
    #[inline]
    pub fn pair_index(&self, i: usize, j: usize) -> usize {
        let n = self.len();
        debug_assert!(i < n && j < n);
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        i * (2 * n + 1 - i) / 2 + (j - i)
    }

    /// All unordered pairs in the order given by [`ElementTable::pair_index`]
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.len()).combinations_with_replacement(2).map(|p| (p[0], p[1]))
    }
}

impl TryFrom<Vec<String>> for ElementTable {
    type Error = anyhow::Error;
    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<ElementTable> for Vec<String> {
    fn from(table: ElementTable) -> Self {
        table.names
    }
}
