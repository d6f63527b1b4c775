use std::collections::{BTreeMap, BTreeSet};

use camd_core::Composition;
use serde::{Deserialize, Serialize};

use crate::lp::{self, LpOutcome};

/// Energies within this tolerance of the hull count as lying on it.
pub const ON_HULL_TOLERANCE: f64 = 1e-9;

const FRACTION_KEY_SCALE: f64 = 1e9;

/// Composition key that treats `X2Y2` and `XY` as the same point.
pub(crate) type FractionKey = Vec<(String, i64)>;

pub(crate) fn fraction_key(composition: &Composition) -> FractionKey {
    composition
        .fractions()
        .into_iter()
        .map(|(element, fraction)| (element, (fraction * FRACTION_KEY_SCALE).round() as i64))
        .collect()
}

/// Point participating in a hull construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullPoint {
    /// Identifier of the row that supplied the point.
    pub identifier: String,
    /// Composition of the row.
    pub composition: Composition,
    /// Formation energy per atom.
    pub formation_energy: f64,
}

/// Lower envelope of formation energy over one chemical system.
///
/// Only the lowest-energy point per distinct composition is retained; ties go
/// to the lexicographically smallest identifier.
#[derive(Debug, Clone)]
pub struct LowerHull {
    elements: Vec<String>,
    points: Vec<HullPoint>,
}

impl LowerHull {
    /// Builds the hull from every point whose elements fall inside `elements`.
    pub fn build<'a, I>(elements: &BTreeSet<String>, points: I) -> Self
    where
        I: IntoIterator<Item = &'a HullPoint>,
    {
        let mut minima: BTreeMap<FractionKey, &HullPoint> = BTreeMap::new();
        for point in points {
            if !point.composition.is_within(elements) {
                continue;
            }
            let key = fraction_key(&point.composition);
            let replace = match minima.get(&key) {
                None => true,
                Some(current) => {
                    point.formation_energy < current.formation_energy
                        || (point.formation_energy == current.formation_energy
                            && point.identifier < current.identifier)
                }
            };
            if replace {
                minima.insert(key, point);
            }
        }
        Self {
            elements: elements.iter().cloned().collect(),
            points: minima.into_values().cloned().collect(),
        }
    }

    /// Elements spanning the system, alphabetical.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Number of distinct compositions known in the system.
    pub fn distinct_compositions(&self) -> usize {
        self.points.len()
    }

    /// A hull needs at least two distinct compositions to bound anything.
    pub fn is_bounded(&self) -> bool {
        self.points.len() >= 2
    }

    /// Minimum energy reachable at `composition` by mixing known phases.
    ///
    /// Returns `None` when the system is unbounded, the composition uses
    /// elements outside the system, or no mixture of known compositions
    /// reaches it.
    pub fn energy_at(&self, composition: &Composition) -> Option<f64> {
        if !self.is_bounded() {
            return None;
        }
        self.mix_energy(self.points.iter(), composition)
    }

    /// Signed energy of `formation_energy` relative to the hull at `composition`.
    ///
    /// Negative values mean the point would lower the hull.
    pub fn margin(&self, composition: &Composition, formation_energy: f64) -> Option<f64> {
        self.energy_at(composition)
            .map(|hull_energy| formation_energy - hull_energy)
    }

    /// True when the other known compositions enclose `composition`.
    ///
    /// Single-element compositions are the terminals of every system and are
    /// always enclosed once the hull is bounded. Any other composition must be
    /// reachable as a mixture that leaves out its own point and duplicates.
    pub fn encloses(&self, composition: &Composition) -> bool {
        if !self.is_bounded() {
            return false;
        }
        if composition.elements().len() == 1 {
            return true;
        }
        let own = fraction_key(composition);
        let others = self
            .points
            .iter()
            .filter(|point| fraction_key(&point.composition) != own);
        self.mix_energy(others, composition).is_some()
    }

    /// Margin of a row already in the system, or `None` when its composition is
    /// not enclosed by the other data.
    pub fn enclosed_margin(
        &self,
        composition: &Composition,
        formation_energy: f64,
    ) -> Option<f64> {
        if !self.encloses(composition) {
            return None;
        }
        self.margin(composition, formation_energy)
    }

    /// Points lying on the lower envelope whose compositions are enclosed.
    pub fn vertices(&self) -> Vec<&HullPoint> {
        self.points
            .iter()
            .filter(|point| {
                self.enclosed_margin(&point.composition, point.formation_energy)
                    .map(|margin| margin <= ON_HULL_TOLERANCE)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn mix_energy<'a, I>(&self, points: I, composition: &Composition) -> Option<f64>
    where
        I: IntoIterator<Item = &'a HullPoint>,
    {
        let elements: BTreeSet<String> = self.elements.iter().cloned().collect();
        if !composition.is_within(&elements) {
            return None;
        }
        let points: Vec<&HullPoint> = points.into_iter().collect();
        if points.is_empty() {
            return None;
        }

        // Element rows except the last, whose fraction follows from the
        // normalisation row.
        let constrained = self.elements.len().saturating_sub(1);
        let mut rows: Vec<Vec<f64>> = self.elements[..constrained]
            .iter()
            .map(|element| {
                points
                    .iter()
                    .map(|point| point.composition.fraction(element))
                    .collect()
            })
            .collect();
        rows.push(vec![1.0; points.len()]);
        let mut rhs: Vec<f64> = self.elements[..constrained]
            .iter()
            .map(|element| composition.fraction(element))
            .collect();
        rhs.push(1.0);
        let cost: Vec<f64> = points.iter().map(|point| point.formation_energy).collect();

        match lp::minimize(&cost, &rows, &rhs) {
            LpOutcome::Optimal(value) => Some(value),
            LpOutcome::Infeasible | LpOutcome::Unbounded | LpOutcome::IterationLimit => None,
        }
    }
}

/// Hull distance from a signed margin: zero on or below the hull.
pub fn distance_from_margin(margin: f64) -> f64 {
    if margin <= ON_HULL_TOLERANCE {
        0.0
    } else {
        margin
    }
}
