//! Named feature values of one part and their tolerance verdicts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Report keys of the seventeen toleranced features, in drawing order.
pub const FEATURE_NAMES: [&str; 17] = [
    "Feature1 (102.1)",
    "Feature2 (25mm/2)",
    "Feature3 (23.1)",
    "Feature4 (25mm/2)",
    "Feature5 (L40)",
    "Feature6 (L248)",
    "Feature7 (L42)",
    "Feature8 (L79.73)",
    "Feature9 (R1-50)",
    "Feature10 (R2-35)",
    "Feature11 (3mm)",
    "Feature12 (88.6)",
    "Feature13 (10.6)",
    "Feature14 (81.5)",
    "Feature15 (L23.4)",
    "Feature16 (L17.2)",
    "Feature17 (2C)",
];

/// Production targets and tolerances, in the order of [`FEATURE_NAMES`].
const DEFAULT_TOLERANCES: [(f64, f64); 17] = [
    (102.1, 2.0),
    (12.5, 0.5),
    (23.1, 1.0),
    (12.5, 0.5),
    (40.0, 1.0),
    (248.0, 2.0),
    (42.0, 1.5),
    (79.73, 1.5),
    (50.0, 1.5),
    (35.0, 1.5),
    (0.0, 3.0),
    (88.6, 1.5),
    (10.6, 1.0),
    (81.5, 1.5),
    (23.4, 1.0),
    (17.2, 1.0),
    (0.0, 2.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Flag(bool),
}

/// Flat feature name to value mapping of one scan cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureReport {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_number(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), FeatureValue::Number(value));
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.values.insert(name.into(), FeatureValue::Flag(value));
    }

    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.values.get(name).copied()
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FeatureValue::Number(v) => Some(v),
            FeatureValue::Flag(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub target: f64,
    pub tolerance: f64,
}

impl Tolerance {
    pub fn verdict(&self, value: Option<f64>) -> Verdict {
        let Some(v) = value.filter(|v| v.is_finite()) else {
            return Verdict::Missing;
        };
        let deviation = (v - self.target).abs();
        if (self.target - self.tolerance..=self.target + self.tolerance).contains(&v) {
            Verdict::Pass
        } else if deviation > 2.0 * self.tolerance {
            Verdict::SuspectedNoise { deviation }
        } else {
            Verdict::Fail { deviation }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToleranceTable {
    entries: BTreeMap<String, Tolerance>,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        FEATURE_NAMES
            .iter()
            .zip(DEFAULT_TOLERANCES)
            .map(|(name, (target, tolerance))| (name.to_string(), Tolerance { target, tolerance }))
            .collect()
    }
}

impl FromIterator<(String, Tolerance)> for ToleranceTable {
    fn from_iter<I: IntoIterator<Item = (String, Tolerance)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl ToleranceTable {
    pub fn get(&self, name: &str) -> Option<&Tolerance> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, tolerance: Tolerance) {
        self.entries.insert(name.into(), tolerance);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verdict for every toleranced feature. A flag or an absent entry
    /// counts as missing.
    pub fn check(&self, report: &FeatureReport) -> QualityReport {
        let verdicts: BTreeMap<String, Verdict> = self
            .entries
            .iter()
            .map(|(name, tol)| {
                let verdict = tol.verdict(report.number(name));
                match verdict {
                    Verdict::Pass => {}
                    Verdict::SuspectedNoise { deviation } => {
                        log::warn!("{name}: deviation {deviation:.3} exceeds twice the tolerance, suspected noise");
                    }
                    Verdict::Fail { deviation } => {
                        log::info!("{name}: deviation {deviation:.3} out of tolerance {}", tol.tolerance);
                    }
                    Verdict::Missing => log::info!("{name}: not measured"),
                }
                (name.clone(), verdict)
            })
            .collect();
        QualityReport { verdicts }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail { deviation: f64 },
    /// Out of tolerance by more than twice the tolerance.
    SuspectedNoise { deviation: f64 },
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub verdicts: BTreeMap<String, Verdict>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.verdicts.values().all(|v| *v == Verdict::Pass)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Verdict)> {
        self.verdicts
            .iter()
            .filter(|(_, v)| **v != Verdict::Pass)
            .map(|(k, v)| (k.as_str(), v))
    }
}
