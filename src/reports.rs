// Read-only aggregates over the canonical dataset.
use crate::error::DataQualityIssue;
use crate::interpolate::PartitionFill;
use crate::normalize::Dataset;
use crate::types::{
    IssueRow, RestorationRow, StateStressorMeansRow, Stressor, StressorValues, SummaryStats,
};
use crate::util::{format_number, format_opt, mean};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct StateStressorMeans {
    pub state: String,
    pub means: StressorValues,
}

impl StateStressorMeans {
    pub fn to_row(&self) -> StateStressorMeansRow {
        let f = |s: Stressor| format_opt(self.means.get(s), 2);
        StateStressorMeansRow {
            state: self.state.clone(),
            varroa_mites: f(Stressor::VarroaMites),
            other_pests: f(Stressor::OtherPests),
            diseases: f(Stressor::Diseases),
            pesticides: f(Stressor::Pesticides),
            other: f(Stressor::Other),
            unknown: f(Stressor::Unknown),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateValue {
    pub state: String,
    pub value: f64,
}

/// Most and least affected states for one stressor, by state mean.
#[derive(Debug, Clone, PartialEq)]
pub struct StressorExtremes {
    pub stressor: Stressor,
    pub highest: StateValue,
    pub lowest: StateValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestorationRate {
    pub state: String,
    pub periods: usize,
    /// Periods where `end_count > initial_count`.
    pub restored: usize,
    pub percentage: f64,
}

impl RestorationRate {
    pub fn to_row(&self) -> RestorationRow {
        RestorationRow {
            state: self.state.clone(),
            periods: self.periods,
            restored: self.restored,
            percentage: format_number(self.percentage, 2),
        }
    }
}

/// Mean of every stressor per state, skipping missing values. States in order.
pub fn state_stressor_means(data: &Dataset) -> Vec<StateStressorMeans> {
    data.partitions()
        .map(|partition| {
            let mut means = StressorValues::default();
            for stressor in Stressor::ALL {
                let values: Vec<f64> = partition.iter().filter_map(|r| r.stressor(stressor)).collect();
                means.set(stressor, mean(&values));
            }
            StateStressorMeans {
                state: partition[0].state.clone(),
                means,
            }
        })
        .collect()
}

/// Highest and lowest state mean for `stressor`. Ties keep the first state
/// in alphabetical order.
pub fn stressor_extremes(data: &Dataset, stressor: Stressor) -> Option<StressorExtremes> {
    let mut highest: Option<StateValue> = None;
    let mut lowest: Option<StateValue> = None;
    for m in state_stressor_means(data) {
        let Some(value) = m.means.get(stressor) else {
            continue;
        };
        if highest.as_ref().map_or(true, |h| value > h.value) {
            highest = Some(StateValue { state: m.state.clone(), value });
        }
        if lowest.as_ref().map_or(true, |l| value < l.value) {
            lowest = Some(StateValue { state: m.state, value });
        }
    }
    Some(StressorExtremes {
        stressor,
        highest: highest?,
        lowest: lowest?,
    })
}

/// The stressor with the highest mean over all records.
pub fn most_impactful_stressor(data: &Dataset) -> Option<(Stressor, f64)> {
    Stressor::ALL
        .into_iter()
        .filter_map(|s| {
            let values: Vec<f64> = data.records().iter().filter_map(|r| r.stressor(s)).collect();
            mean(&values).map(|m| (s, m))
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

/// Share of a state's periods whose end count exceeds the initial count.
///
/// Periods with a missing count stay in the denominator. `None` for a state
/// with no records.
pub fn restoration_rate(data: &Dataset, state: &str) -> Option<RestorationRate> {
    let partition = data.state(state)?;
    let restored = partition
        .iter()
        .filter(|r| match (r.derived.end_count, r.base.initial_count) {
            (Some(end), Some(initial)) => end > initial,
            _ => false,
        })
        .count();
    Some(RestorationRate {
        state: state.to_string(),
        periods: partition.len(),
        restored,
        percentage: restored as f64 / partition.len() as f64 * 100.0,
    })
}

pub fn restoration_rates(data: &Dataset) -> Vec<RestorationRate> {
    data.states()
        .into_iter()
        .filter_map(|s| restoration_rate(data, s))
        .collect()
}

pub fn issue_rows(issues: &[DataQualityIssue]) -> Vec<IssueRow> {
    issues
        .iter()
        .map(|i| IssueRow {
            kind: i.kind().to_string(),
            state: i.state().to_string(),
            detail: i.to_string(),
        })
        .collect()
}

pub fn generate_summary(
    pre: &Dataset,
    canonical: &Dataset,
    fills: &[PartitionFill],
    issues: &[DataQualityIssue],
) -> SummaryStats {
    let periods = canonical.records().iter().map(|r| r.period);
    let first_period = periods.clone().min().map(|p| p.to_string());
    let last_period = periods.max().map(|p| p.to_string());
    let count_kind = |kind: &str| issues.iter().filter(|i| i.kind() == kind).count();
    let top = most_impactful_stressor(canonical);

    SummaryStats {
        generated_at: chrono::Utc::now(),
        pre_interpolation_records: pre.len(),
        canonical_records: canonical.len(),
        total_states: canonical.states().len(),
        first_period,
        last_period,
        inserted_rows: fills.iter().map(|f| f.inserted_rows).sum(),
        interpolated_values: fills.iter().map(|f| f.counts.interpolated).sum(),
        boundary_filled_values: fills.iter().map(|f| f.counts.boundary_filled).sum(),
        unresolvable_gaps: count_kind("unresolvable_gap"),
        division_by_zero_metrics: count_kind("division_by_zero"),
        most_impactful_stressor: top.map(|(s, _)| s.label().to_string()),
        most_impactful_mean: top.map(|(_, m)| m),
    }
}
