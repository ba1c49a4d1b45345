// Rebuilding the derived-metrics view after interpolation.
//
// Order of precedence for the percentages:
// 1. the value observed in the pre-interpolation snapshot for the same
//    (state, period), when there is one;
// 2. otherwise `round(part / initial_count * 100)` from the interpolated base.
// `new_count` and `end_count` are always recomputed from the interpolated base.
use crate::error::DataQualityIssue;
use crate::interpolate::Interpolation;
use crate::normalize::Dataset;
use crate::types::{BaseMetrics, DerivedColumn, DerivedMetrics, Period};
use crate::util::rounded_percentage;
use std::collections::HashMap;
use tracing::warn;

/// Merge the observed percentages with values computed from `base`.
///
/// Returns the derived view plus the zero-denominator metrics that had to be
/// left undefined.
pub fn merge(base: &BaseMetrics, observed: Option<&DerivedMetrics>) -> (DerivedMetrics, Vec<DerivedColumn>) {
    let mut undefined = Vec::new();
    let mut percentage = |seen: Option<f64>, part: Option<f64>, column: DerivedColumn| {
        if seen.is_some() {
            return seen;
        }
        let (part, whole) = (part?, base.initial_count?);
        let value = rounded_percentage(part, whole);
        if value.is_none() {
            undefined.push(column);
        }
        value
    };

    let lost_perc = percentage(
        observed.and_then(|o| o.lost_perc),
        base.lost,
        DerivedColumn::LostPerc,
    );
    let renovated_perc = percentage(
        observed.and_then(|o| o.renovated_perc),
        base.renovated,
        DerivedColumn::RenovatedPerc,
    );

    let derived = DerivedMetrics {
        lost_perc,
        renovated_perc,
        new_count: base.new_count(),
        end_count: base.end_count(),
    };
    (derived, undefined)
}

/// Produce the canonical dataset from the interpolated base view and the
/// pre-interpolation snapshot.
pub fn recompute(interpolated: Interpolation, pre: &Dataset) -> (Dataset, Vec<DataQualityIssue>) {
    let observed: HashMap<(&str, Period), &DerivedMetrics> = pre
        .records()
        .iter()
        .map(|r| ((r.state.as_str(), r.period), &r.derived))
        .collect();

    let mut issues = Vec::new();
    let mut records = interpolated.records;
    for r in &mut records {
        let seen = observed.get(&(r.state.as_str(), r.period)).copied();
        let (derived, undefined) = merge(&r.base, seen);
        for metric in undefined {
            let issue = DataQualityIssue::DivisionByZeroMetric {
                state: r.state.clone(),
                period: r.period,
                metric,
            };
            warn!("{issue}");
            issues.push(issue);
        }
        r.derived = derived;
    }
    (Dataset::from_sorted(records), issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate::interpolate;
    use crate::normalize::normalize;
    use crate::types::{ColonyRecord, Quarter, Region};

    fn base(initial: f64, lost: f64, added: f64, renovated: f64) -> BaseMetrics {
        BaseMetrics {
            initial_count: Some(initial),
            max: Some(initial),
            lost: Some(lost),
            added: Some(added),
            renovated: Some(renovated),
            ..Default::default()
        }
    }

    #[test]
    fn missing_percentages_are_computed_from_base() {
        let (d, undefined) = merge(&base(8.0, 1.0, 2.0, 3.0), None);
        assert_eq!(d.lost_perc, Some(12.0)); // 12.5 rounds to even
        assert_eq!(d.renovated_perc, Some(38.0)); // 37.5 rounds to even
        assert_eq!(d.new_count, Some(7.0));
        assert_eq!(d.end_count, Some(12.0));
        assert!(undefined.is_empty());
    }

    #[test]
    fn observed_percentage_wins_over_computed() {
        let observed = DerivedMetrics {
            lost_perc: Some(99.0),
            renovated_perc: None,
            new_count: Some(-1.0),
            end_count: Some(-1.0),
        };
        let (d, _) = merge(&base(100.0, 10.0, 0.0, 5.0), Some(&observed));
        assert_eq!(d.lost_perc, Some(99.0));
        assert_eq!(d.renovated_perc, Some(5.0));
        // counts are never carried over
        assert_eq!(d.new_count, Some(90.0));
        assert_eq!(d.end_count, Some(95.0));
    }

    #[test]
    fn zero_initial_count_leaves_percentages_undefined() {
        let (d, undefined) = merge(&base(0.0, 0.0, 3.0, 0.0), None);
        assert_eq!(d.lost_perc, None);
        assert_eq!(d.renovated_perc, None);
        assert_eq!(undefined, vec![DerivedColumn::LostPerc, DerivedColumn::RenovatedPerc]);
        assert_eq!(d.end_count, Some(3.0));
    }

    #[test]
    fn recompute_uses_interpolated_values_and_flags_zero_division() {
        let rec = |q: Quarter, initial: Option<f64>, lost: f64, lost_perc: Option<f64>| ColonyRecord {
            state: "Maine".to_string(),
            state_code: "ME".to_string(),
            region: Region::Northeast,
            period: Period::new(2017, q),
            base: BaseMetrics {
                initial_count: initial,
                max: Some(1.0),
                lost: Some(lost),
                added: Some(0.0),
                renovated: Some(0.0),
                ..Default::default()
            },
            derived: DerivedMetrics {
                lost_perc,
                ..Default::default()
            },
        };
        let pre = normalize(vec![
            rec(Quarter::Q1, Some(100.0), 10.0, Some(10.0)),
            rec(Quarter::Q2, None, 30.0, None),
            rec(Quarter::Q3, Some(300.0), 30.0, Some(10.0)),
            rec(Quarter::Q4, Some(0.0), 0.0, None),
        ])
        .unwrap();

        let (canonical, issues) = recompute(interpolate(&pre), &pre);
        let rows = canonical.records();
        // Q2: initial interpolated to 200, lost 30 -> 15%
        assert_eq!(rows[1].base.initial_count, Some(200.0));
        assert_eq!(rows[1].derived.lost_perc, Some(15.0));
        assert_eq!(rows[1].derived.new_count, Some(170.0));
        assert_eq!(rows[0].derived.lost_perc, Some(10.0));
        // Q4: zero denominator
        assert_eq!(rows[3].derived.lost_perc, None);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|i| matches!(i, DataQualityIssue::DivisionByZeroMetric { .. })));

        // pre snapshot keeps its gap
        assert_eq!(pre.records()[1].derived.lost_perc, None);
        assert_eq!(pre.records()[1].derived.new_count, None);
    }
}
