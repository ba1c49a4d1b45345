//! Group-versus-population significance testing for stressors.
//!
//! For a grouping key (quarter or region) every group's stressor values are
//! compared with the full population of the same stressor using Welch's
//! unequal-variance t-test. A two-tailed p-value strictly below the configured
//! alpha classifies the pair as `reject`; anything else, including a test that
//! cannot be computed, is `fail`.

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::normalize::Dataset;
use crate::types::{
    Classification, GroupMeanRow, GroupValue, GroupingKey, Stressor, StressorTestRow,
};
use crate::util::{format_opt, mean, sample_variance};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Result of Welch's t-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    pub t_statistic: f64,
    /// Welch-Satterthwaite degrees of freedom
    pub df: f64,
    /// Two-tailed
    pub p_value: f64,
}

/// Welch's independent two-sample t-test.
///
/// Returns `None` when either sample has fewer than two values or both
/// samples have zero variance, since the statistic is undefined there.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<WelchTest> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(a)?, mean(b)?);
    let (v1, v2) = (sample_variance(a)?, sample_variance(b)?);

    let (s1, s2) = (v1 / n1, v2 / n2);
    let se2 = s1 + s2;
    if se2 <= 0.0 {
        return None;
    }
    let t_statistic = (m1 - m2) / se2.sqrt();
    let df = se2.powi(2) / (s1.powi(2) / (n1 - 1.0) + s2.powi(2) / (n2 - 1.0));

    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p_value = (2.0 * (1.0 - dist.cdf(t_statistic.abs()))).clamp(0.0, 1.0);
    Some(WelchTest {
        t_statistic,
        df,
        p_value,
    })
}

/// Outcome for one (group, stressor) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTestResult {
    pub group: GroupValue,
    pub stressor: Stressor,
    pub samples: usize,
    pub group_mean: Option<f64>,
    pub test: Option<WelchTest>,
    pub classification: Classification,
}

/// All results of one classifier run. Recomputed per grouping choice.
#[derive(Debug, Clone)]
pub struct GroupSignificance {
    pub key: GroupingKey,
    pub overall_means: BTreeMap<Stressor, Option<f64>>,
    pub results: BTreeMap<(GroupValue, Stressor), GroupTestResult>,
}

impl GroupSignificance {
    pub fn get(&self, group: GroupValue, stressor: Stressor) -> Option<&GroupTestResult> {
        self.results.get(&(group, stressor))
    }

    pub fn classification(&self, group: GroupValue, stressor: Stressor) -> Option<Classification> {
        self.get(group, stressor).map(|r| r.classification)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn mean_rows(&self) -> Vec<GroupMeanRow> {
        self.results
            .values()
            .map(|r| GroupMeanRow {
                group: r.group.to_string(),
                stressor: r.stressor.label().to_string(),
                samples: r.samples,
                mean: format_opt(r.group_mean, 2),
            })
            .collect()
    }

    pub fn test_rows(&self) -> Vec<StressorTestRow> {
        self.results
            .values()
            .map(|r| StressorTestRow {
                group: r.group.to_string(),
                stressor: r.stressor.label().to_string(),
                group_mean: format_opt(r.group_mean, 2),
                overall_mean: format_opt(self.overall_means.get(&r.stressor).copied().flatten(), 2),
                t_statistic: format_opt(r.test.map(|t| t.t_statistic), 3),
                p_value: format_opt(r.test.map(|t| t.p_value), 4),
                classification: r.classification.to_string(),
            })
            .collect()
    }
}

pub struct GroupSignificanceClassifier {
    config: ClassifierConfig,
}

impl GroupSignificanceClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn decide(&self, test: Option<&WelchTest>) -> Classification {
        match test {
            Some(t) if t.p_value < self.config.alpha => Classification::Reject,
            _ => Classification::Fail,
        }
    }

    /// Parse `key` and classify. An unknown key is rejected before any work.
    pub fn classify_by_name(&self, data: &Dataset, key: &str) -> Result<GroupSignificance> {
        let key: GroupingKey = key.parse()?;
        Ok(self.classify(data, key))
    }

    pub fn classify(&self, data: &Dataset, key: GroupingKey) -> GroupSignificance {
        let mut population: HashMap<Stressor, Vec<f64>> = HashMap::new();
        let mut grouped: HashMap<(GroupValue, Stressor), Vec<f64>> = HashMap::new();
        for record in data.records() {
            let group = record.group_value(key);
            for &stressor in &self.config.stressors {
                if let Some(v) = record.stressor(stressor) {
                    population.entry(stressor).or_default().push(v);
                    grouped.entry((group, stressor)).or_default().push(v);
                }
            }
        }

        let pairs: Vec<(GroupValue, Stressor)> = key
            .values()
            .into_iter()
            .flat_map(|g| self.config.stressors.iter().map(move |&s| (g, s)))
            .collect();

        let empty = Vec::new();
        let results: Vec<GroupTestResult> = pairs
            .par_iter()
            .map(|&(group, stressor)| {
                let sample = grouped.get(&(group, stressor)).unwrap_or(&empty);
                let overall = population.get(&stressor).unwrap_or(&empty);
                let test = welch_t_test(sample, overall);
                if test.is_none() {
                    debug!(%group, %stressor, samples = sample.len(), "t-test undefined");
                }
                GroupTestResult {
                    group,
                    stressor,
                    samples: sample.len(),
                    group_mean: mean(sample),
                    classification: self.decide(test.as_ref()),
                    test,
                }
            })
            .collect();

        let overall_means = self
            .config
            .stressors
            .iter()
            .map(|&s| (s, population.get(&s).and_then(|v| mean(v))))
            .collect();

        let rejected = results
            .iter()
            .filter(|r| r.classification == Classification::Reject)
            .count();
        info!(%key, tests = results.len(), rejected, "classified stressors by group");

        GroupSignificance {
            key,
            overall_means,
            results: results
                .into_iter()
                .map(|r| ((r.group, r.stressor), r))
                .collect(),
        }
    }
}
