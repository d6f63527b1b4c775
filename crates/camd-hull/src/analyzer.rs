use std::collections::{BTreeMap, BTreeSet};

use camd_core::errors::{CampError, ErrorInfo};
use camd_core::{Composition, SeedEntry, SeedTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::hull::{distance_from_margin, HullPoint, LowerHull};

fn default_hull_distance() -> f64 {
    0.05
}

/// Analyzer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Maximum energy above the hull (per atom) still judged stable.
    #[serde(default = "default_hull_distance")]
    pub hull_distance: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            hull_distance: default_hull_distance(),
        }
    }
}

impl AnalyzerConfig {
    /// Rejects non-positive or non-finite thresholds.
    pub fn validate(&self) -> Result<(), CampError> {
        if !(self.hull_distance.is_finite() && self.hull_distance > 0.0) {
            return Err(CampError::InvalidInput(
                ErrorInfo::new("hull-distance", "hull_distance must be finite and > 0")
                    .with_context("hull_distance", self.hull_distance.to_string()),
            ));
        }
        Ok(())
    }
}

/// One row of the dataset handed to the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullEntry {
    /// Row identifier.
    pub identifier: String,
    /// Composition of the row.
    pub composition: Composition,
    /// Formation energy per atom; `None` for failed or missing evaluations.
    pub formation_energy: Option<f64>,
}

impl HullEntry {
    /// Row with a known energy.
    pub fn new(identifier: impl Into<String>, composition: Composition, energy: f64) -> Self {
        Self {
            identifier: identifier.into(),
            composition,
            formation_energy: Some(energy),
        }
    }

    fn point(&self) -> Option<HullPoint> {
        self.formation_energy
            .filter(|energy| energy.is_finite())
            .map(|energy| HullPoint {
                identifier: self.identifier.clone(),
                composition: self.composition.clone(),
                formation_energy: energy,
            })
    }
}

impl From<&SeedEntry> for HullEntry {
    fn from(entry: &SeedEntry) -> Self {
        HullEntry::new(
            entry.identifier.clone(),
            entry.composition.clone(),
            entry.formation_energy,
        )
    }
}

/// Collects the analyzer input for every row of a seed table.
pub fn hull_entries(seed: &SeedTable) -> Vec<HullEntry> {
    seed.iter().map(HullEntry::from).collect()
}

/// Stability verdict for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityJudgment {
    /// Row identifier.
    pub identifier: String,
    /// Reduced formula of the row.
    pub reduced_formula: String,
    /// Energy above the hull; `None` when the system has too little data.
    pub hull_distance: Option<f64>,
    /// `hull_distance <= threshold`; always false without a distance.
    pub is_stable: bool,
}

impl StabilityJudgment {
    fn new(
        identifier: &str,
        composition: &Composition,
        distance: Option<f64>,
        threshold: f64,
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            reduced_formula: composition.reduced_formula(),
            hull_distance: distance,
            is_stable: distance.map(|d| d <= threshold).unwrap_or(false),
        }
    }
}

/// Judgment for a not-yet-evaluated row scored with a predicted energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Judgment built from the clamped distance.
    pub judgment: StabilityJudgment,
    /// Signed energy relative to the current hull; negative below it.
    pub margin: Option<f64>,
}

/// Lower hull of one chemical system, recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullRecord {
    /// Elements spanning the system, alphabetical.
    pub system: Vec<String>,
    /// Number of distinct compositions available to the hull.
    pub distinct_compositions: usize,
    /// Lowest-energy points lying on the hull; empty when unbounded.
    pub vertices: Vec<HullPoint>,
}

impl HullRecord {
    /// Hyphen-joined system key, e.g. `"X-Y"`.
    pub fn key(&self) -> String {
        self.system.join("-")
    }

    /// False when the system had fewer than two distinct compositions.
    pub fn is_bounded(&self) -> bool {
        self.distinct_compositions >= 2
    }
}

/// Output of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// One judgment per input row with an energy, in input order.
    pub judgments: Vec<StabilityJudgment>,
    /// One record per maximal chemical system, ordered by system key.
    pub hulls: Vec<HullRecord>,
}

impl Analysis {
    /// Judgments marked stable.
    pub fn stable(&self) -> impl Iterator<Item = &StabilityJudgment> + '_ {
        self.judgments.iter().filter(|judgment| judgment.is_stable)
    }

    /// Looks up the judgment for `identifier`.
    pub fn judgment(&self, identifier: &str) -> Option<&StabilityJudgment> {
        self.judgments
            .iter()
            .find(|judgment| judgment.identifier == identifier)
    }
}

/// Contract consumed by the campaign orchestrator.
pub trait StabilityAnalysis {
    /// Threshold separating stable from unstable rows.
    fn hull_distance(&self) -> f64;

    /// Judges every row of `dataset` against the hull it builds.
    fn analyze(&self, dataset: &[HullEntry]) -> Result<Analysis, CampError>;
}

/// Convex-hull stability analyzer.
#[derive(Debug, Clone)]
pub struct StabilityAnalyzer {
    config: AnalyzerConfig,
    references: Vec<HullPoint>,
}

impl StabilityAnalyzer {
    /// Creates an analyzer without reference end-members.
    pub fn new(config: AnalyzerConfig) -> Result<Self, CampError> {
        config.validate()?;
        Ok(Self {
            config,
            references: Vec::new(),
        })
    }

    /// Adds fixed reference rows (typically elemental end-members) that shape
    /// hulls but are never judged themselves.
    pub fn with_references(mut self, references: Vec<HullEntry>) -> Result<Self, CampError> {
        for reference in references {
            let point = reference.point().ok_or_else(|| {
                CampError::InvalidInput(
                    ErrorInfo::new("reference-energy", "reference rows need a finite energy")
                        .with_context("identifier", reference.identifier.clone()),
                )
            })?;
            self.references.push(point);
        }
        Ok(self)
    }

    /// Analyzer settings.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Scores rows that have not been evaluated, using `queries[i].formation_energy`
    /// as a predicted energy against the hull of `dataset` (plus references).
    ///
    /// Queries never influence each other's hull.
    pub fn score_candidates(
        &self,
        dataset: &[HullEntry],
        queries: &[HullEntry],
    ) -> Result<Vec<CandidateScore>, CampError> {
        let points: Vec<HullPoint> = dataset
            .iter()
            .filter_map(HullEntry::point)
            .chain(self.references.iter().cloned())
            .collect();
        let mut hulls: BTreeMap<BTreeSet<String>, LowerHull> = BTreeMap::new();
        let mut scores = Vec::with_capacity(queries.len());
        for query in queries {
            let elements = query.composition.elements();
            let hull = hulls
                .entry(elements.clone())
                .or_insert_with(|| LowerHull::build(&elements, &points));
            let margin = query
                .formation_energy
                .filter(|energy| energy.is_finite())
                .and_then(|energy| hull.margin(&query.composition, energy));
            scores.push(CandidateScore {
                judgment: StabilityJudgment::new(
                    &query.identifier,
                    &query.composition,
                    margin.map(distance_from_margin),
                    self.config.hull_distance,
                ),
                margin,
            });
        }
        Ok(scores)
    }
}

impl StabilityAnalysis for StabilityAnalyzer {
    fn hull_distance(&self) -> f64 {
        self.config.hull_distance
    }

    fn analyze(&self, dataset: &[HullEntry]) -> Result<Analysis, CampError> {
        let mut seen = BTreeSet::new();
        let mut points = Vec::with_capacity(dataset.len());
        let mut missing = 0usize;
        for entry in dataset {
            if !seen.insert(entry.identifier.as_str()) {
                return Err(CampError::InvalidInput(
                    ErrorInfo::new("duplicate-identifier", "analyzer input repeats an identifier")
                        .with_context("identifier", entry.identifier.clone()),
                ));
            }
            match entry.point() {
                Some(point) => points.push(point),
                None => missing += 1,
            }
        }
        if missing > 0 {
            debug!(missing, "rows without a usable energy excluded from hull construction");
        }

        let systems: BTreeSet<BTreeSet<String>> = points
            .iter()
            .map(|point| point.composition.elements())
            .collect();
        let maximal: Vec<&BTreeSet<String>> = systems
            .iter()
            .filter(|system| {
                !systems
                    .iter()
                    .any(|other| other.len() > system.len() && system.is_subset(other))
            })
            .collect();

        let hull_points: Vec<HullPoint> = points
            .iter()
            .cloned()
            .chain(self.references.iter().cloned())
            .collect();

        let mut best: BTreeMap<&str, f64> = BTreeMap::new();
        let mut hulls = Vec::with_capacity(maximal.len());
        let mut unbounded = 0usize;
        for system in maximal {
            let hull = LowerHull::build(system, &hull_points);
            if !hull.is_bounded() {
                unbounded += 1;
            }
            for point in points.iter().filter(|p| p.composition.is_within(system)) {
                let margin = hull.enclosed_margin(&point.composition, point.formation_energy);
                if let Some(margin) = margin {
                    let distance = distance_from_margin(margin);
                    best.entry(point.identifier.as_str())
                        .and_modify(|current| *current = current.min(distance))
                        .or_insert(distance);
                }
            }
            hulls.push(HullRecord {
                system: hull.elements().to_vec(),
                distinct_compositions: hull.distinct_compositions(),
                vertices: hull.vertices().into_iter().cloned().collect(),
            });
        }
        hulls.sort_by_key(HullRecord::key);

        if unbounded > 0 {
            warn!(
                unbounded,
                "chemical systems with fewer than two compositions judged unstable"
            );
        }

        let unjudged = points
            .iter()
            .filter(|point| !best.contains_key(point.identifier.as_str()))
            .count();
        if unjudged > 0 {
            debug!(unjudged, "rows not enclosed by other compositions judged unstable");
        }

        let threshold = self.config.hull_distance;
        let judgments: Vec<StabilityJudgment> = points
            .iter()
            .map(|point| {
                StabilityJudgment::new(
                    &point.identifier,
                    &point.composition,
                    best.get(point.identifier.as_str()).copied(),
                    threshold,
                )
            })
            .collect();
        debug!(
            rows = judgments.len(),
            systems = hulls.len(),
            stable = judgments.iter().filter(|j| j.is_stable).count(),
            "stability analysis complete"
        );
        Ok(Analysis { judgments, hulls })
    }
}
