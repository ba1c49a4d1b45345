// Stage orchestration: join -> normalize -> interpolate -> recompute.
//
// Each stage takes the previous stage's output by value or shared reference
// and returns a fresh snapshot. The pre-interpolation snapshot is returned
// untouched next to the canonical one.
use crate::derive;
use crate::error::{DataQualityIssue, Result};
use crate::interpolate::{self, PartitionFill};
use crate::normalize::{self, Dataset};
use crate::region::{self, RegionMap};
use crate::types::CensusRow;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Joined, normalized input before any repair.
    pub pre_interpolation: Dataset,
    /// Gap-free, recomputed dataset every aggregate reads from.
    pub canonical: Dataset,
    pub fills: Vec<PartitionFill>,
    pub issues: Vec<DataQualityIssue>,
}

pub fn run(rows: Vec<CensusRow>, regions: &RegionMap) -> Result<PipelineOutput> {
    let input_rows = rows.len();
    let joined = region::join(rows, regions)?;
    let pre_interpolation = normalize::normalize(joined)?;

    let interpolated = interpolate::interpolate(&pre_interpolation);
    let fills = interpolated.fills.clone();
    let mut issues = interpolated.issues.clone();

    let (canonical, metric_issues) = derive::recompute(interpolated, &pre_interpolation);
    issues.extend(metric_issues);

    info!(
        input_rows,
        canonical_rows = canonical.len(),
        states = canonical.states().len(),
        issues = issues.len(),
        "pipeline complete"
    );
    Ok(PipelineOutput {
        pre_interpolation,
        canonical,
        fills,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{BaseMetrics, Period, Quarter, RawRegionRow, Stressor};

    fn regions() -> RegionMap {
        RegionMap::from_rows(vec![RawRegionRow {
            state: "Vermont".into(),
            state_code: "VT".into(),
            region: "Northeast".into(),
        }])
        .unwrap()
    }

    fn row(state: &str, q: Quarter, initial: Option<f64>) -> CensusRow {
        let mut base = BaseMetrics {
            initial_count: initial,
            max: Some(10.0),
            lost: Some(2.0),
            added: Some(1.0),
            renovated: Some(1.0),
            ..Default::default()
        };
        for s in Stressor::ALL {
            base.stressors.set(s, Some(3.0));
        }
        CensusRow {
            state: state.into(),
            period: Period::new(2018, q),
            base,
            lost_perc: None,
            renovated_perc: None,
        }
    }

    #[test]
    fn snapshots_diverge_only_where_values_were_missing() {
        let out = run(
            vec![
                row("Vermont", Quarter::Q1, Some(10.0)),
                row("Vermont", Quarter::Q2, None),
                row("Vermont", Quarter::Q3, Some(20.0)),
            ],
            &regions(),
        )
        .unwrap();

        assert_eq!(out.pre_interpolation.records()[1].base.initial_count, None);
        assert_eq!(out.pre_interpolation.records()[1].derived.end_count, None);
        let filled = &out.canonical.records()[1];
        assert_eq!(filled.base.initial_count, Some(15.0));
        assert_eq!(filled.derived.end_count, Some(15.0));
        assert_eq!(filled.derived.lost_perc, Some(13.0)); // 13.33
        assert!(out.issues.is_empty());
        assert_eq!(out.fills[0].counts.interpolated, 1);
    }

    #[test]
    fn derived_counts_hold_in_both_snapshots() {
        let out = run(
            vec![row("Vermont", Quarter::Q1, Some(10.0)), row("Vermont", Quarter::Q4, Some(40.0))],
            &regions(),
        )
        .unwrap();
        assert_eq!(out.canonical.len(), 4);
        for data in [&out.pre_interpolation, &out.canonical] {
            for r in data.records() {
                let b = &r.base;
                assert_eq!(r.derived.new_count, Some(b.initial_count.unwrap() - b.lost.unwrap()));
                assert_eq!(
                    r.derived.end_count,
                    Some(b.initial_count.unwrap() - b.lost.unwrap() + b.added.unwrap() + b.renovated.unwrap())
                );
            }
        }
    }

    #[test]
    fn unmapped_state_stops_the_run() {
        let err = run(vec![row("Nevada", Quarter::Q1, Some(1.0))], &regions()).unwrap_err();
        assert!(matches!(err, Error::MissingRegionMapping { .. }));
    }
}
