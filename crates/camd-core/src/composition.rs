//! Element to amount maps and the derived chemical-system keys.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CampError, ErrorInfo};

const INTEGRAL_TOLERANCE: f64 = 1e-8;

/// Stoichiometric composition keyed by element symbol.
///
/// Amounts are strictly positive and finite; zero amounts are dropped on
/// construction so `{X: 1, Y: 0}` and `{X: 1}` compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct Composition {
    amounts: BTreeMap<String, f64>,
}

impl Composition {
    /// Builds a composition, rejecting empty maps and non-finite or negative amounts.
    pub fn new(amounts: BTreeMap<String, f64>) -> Result<Self, CampError> {
        let mut cleaned = BTreeMap::new();
        for (element, amount) in amounts {
            let symbol = element.trim();
            if symbol.is_empty() {
                return Err(CampError::InvalidInput(ErrorInfo::new(
                    "composition-element",
                    "element symbol must not be empty",
                )));
            }
            if !amount.is_finite() || amount < 0.0 {
                return Err(CampError::InvalidInput(
                    ErrorInfo::new("composition-amount", "amounts must be finite and >= 0")
                        .with_context("element", symbol)
                        .with_context("amount", amount.to_string()),
                ));
            }
            if amount > 0.0 {
                *cleaned.entry(symbol.to_string()).or_insert(0.0) += amount;
            }
        }
        if cleaned.is_empty() {
            return Err(CampError::InvalidInput(ErrorInfo::new(
                "composition-empty",
                "composition must contain at least one element with a positive amount",
            )));
        }
        Ok(Self { amounts: cleaned })
    }

    /// Convenience constructor from `(element, amount)` pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, f64)]) -> Result<Self, CampError> {
        let mut amounts = BTreeMap::new();
        for (element, amount) in pairs {
            *amounts.entry(element.as_ref().to_string()).or_insert(0.0) += *amount;
        }
        Self::new(amounts)
    }

    /// Raw element amounts in alphabetical element order.
    pub fn amounts(&self) -> &BTreeMap<String, f64> {
        &self.amounts
    }

    /// Total number of atoms in the formula unit.
    pub fn num_atoms(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Set of elements present.
    pub fn elements(&self) -> BTreeSet<String> {
        self.amounts.keys().cloned().collect()
    }

    /// Atomic fraction of `element`, zero when absent.
    pub fn fraction(&self, element: &str) -> f64 {
        self.amounts
            .get(element)
            .map(|amount| amount / self.num_atoms())
            .unwrap_or(0.0)
    }

    /// Atomic fractions for every element present.
    pub fn fractions(&self) -> BTreeMap<String, f64> {
        let total = self.num_atoms();
        self.amounts
            .iter()
            .map(|(element, amount)| (element.clone(), amount / total))
            .collect()
    }

    /// Hyphen-joined alphabetical element list, e.g. `"Fe-O"`.
    pub fn chemical_system(&self) -> String {
        self.amounts
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Reduced formula used to identify a composition irrespective of formula-unit size.
    ///
    /// Integral compositions are divided by the gcd of their amounts (`Fe2O4` ->
    /// `FeO2`); anything else is written as atomic fractions to six decimals.
    pub fn reduced_formula(&self) -> String {
        let integral: Option<Vec<u64>> = self
            .amounts
            .values()
            .map(|amount| {
                let rounded = amount.round();
                if (amount - rounded).abs() < INTEGRAL_TOLERANCE && rounded >= 1.0 {
                    Some(rounded as u64)
                } else {
                    None
                }
            })
            .collect();

        let mut formula = String::new();
        match integral {
            Some(counts) => {
                let divisor = counts.iter().copied().fold(0, gcd).max(1);
                for (element, count) in self.amounts.keys().zip(counts) {
                    formula.push_str(element);
                    let reduced = count / divisor;
                    if reduced != 1 {
                        formula.push_str(&reduced.to_string());
                    }
                }
            }
            None => {
                for (element, fraction) in self.fractions() {
                    formula.push_str(&element);
                    let text = format!("{fraction:.6}");
                    formula.push_str(text.trim_end_matches('0').trim_end_matches('.'));
                }
            }
        }
        formula
    }

    /// Returns true when every element of `self` is contained in `system`.
    pub fn is_within(&self, system: &BTreeSet<String>) -> bool {
        self.amounts.keys().all(|element| system.contains(element))
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl TryFrom<BTreeMap<String, f64>> for Composition {
    type Error = CampError;

    fn try_from(value: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Composition::new(value)
    }
}

impl From<Composition> for BTreeMap<String, f64> {
    fn from(value: Composition) -> Self {
        value.amounts
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reduced_formula())
    }
}
