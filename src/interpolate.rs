// Per-state linear interpolation of the base-metrics view.
//
// Each state partition is an isolated, period-ordered series. A partition is
// first reindexed onto the contiguous run of quarters between its first and
// last observed period, then every base column is repaired independently:
// interior gaps by linear interpolation on the quarter index, leading and
// trailing gaps by copying the nearest known value. Partitions never read
// each other, so they are processed in parallel.
use crate::error::DataQualityIssue;
use crate::normalize::Dataset;
use crate::types::{BaseColumn, BaseMetrics, ColonyRecord, DerivedMetrics, FillSummaryRow};
use rayon::prelude::*;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillCounts {
    pub interpolated: usize,
    pub boundary_filled: usize,
}

/// What interpolation did to one state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionFill {
    pub state: String,
    pub inserted_rows: usize,
    pub counts: FillCounts,
    pub unresolved: Vec<BaseColumn>,
}

impl PartitionFill {
    pub fn to_row(&self) -> FillSummaryRow {
        FillSummaryRow {
            state: self.state.clone(),
            inserted_rows: self.inserted_rows,
            interpolated: self.counts.interpolated,
            boundary_filled: self.counts.boundary_filled,
            unresolved_columns: self.unresolved.len(),
        }
    }
}

/// Output of the interpolation stage.
///
/// Records carry the repaired base view only; the derived view is cleared and
/// must be rebuilt by `derive::recompute`.
#[derive(Debug, Clone, Default)]
pub struct Interpolation {
    pub records: Vec<ColonyRecord>,
    pub fills: Vec<PartitionFill>,
    pub issues: Vec<DataQualityIssue>,
}

/// Fill the missing entries of an equally spaced series in place.
///
/// Returns `None`, leaving the series untouched, when nothing is known.
pub fn fill_series(values: &mut [Option<f64>]) -> Option<FillCounts> {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();
    let (&first, &last) = (known.first()?, known.last()?);
    let mut counts = FillCounts::default();

    for pair in known.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (va, vb) = (values[a]?, values[b]?);
        let span = (b - a) as f64;
        for i in a + 1..b {
            values[i] = Some(va + (vb - va) * (i - a) as f64 / span);
            counts.interpolated += 1;
        }
    }

    let head = values[first];
    for v in &mut values[..first] {
        *v = head;
        counts.boundary_filled += 1;
    }
    let tail = values[last];
    for v in &mut values[last + 1..] {
        *v = tail;
        counts.boundary_filled += 1;
    }
    Some(counts)
}

/// Place a partition on its contiguous quarterly axis, inserting empty rows
/// for absent quarters. Returns the new rows and how many were inserted.
fn reindex(partition: &[ColonyRecord]) -> (Vec<ColonyRecord>, usize) {
    let Some(template) = partition.first() else {
        return (Vec::new(), 0);
    };
    let start = template.period.index();
    let end = partition.last().map_or(start, |r| r.period.index());

    let mut out = Vec::with_capacity((end - start + 1) as usize);
    let mut observed = partition.iter().peekable();
    let mut inserted = 0;
    let mut period = template.period;
    while period.index() <= end {
        match observed.next_if(|r| r.period == period) {
            Some(r) => out.push(ColonyRecord {
                derived: DerivedMetrics::default(),
                ..r.clone()
            }),
            None => {
                out.push(ColonyRecord {
                    period,
                    base: BaseMetrics::default(),
                    derived: DerivedMetrics::default(),
                    ..template.clone()
                });
                inserted += 1;
            }
        }
        period = period.next();
    }
    (out, inserted)
}

fn interpolate_partition(partition: &[ColonyRecord]) -> (Vec<ColonyRecord>, PartitionFill) {
    let (mut rows, inserted_rows) = reindex(partition);
    let mut fill = PartitionFill {
        state: partition.first().map(|r| r.state.clone()).unwrap_or_default(),
        inserted_rows,
        ..Default::default()
    };

    for column in BaseColumn::ALL {
        let mut series: Vec<Option<f64>> = rows.iter().map(|r| r.base.get(column)).collect();
        match fill_series(&mut series) {
            Some(c) => {
                fill.counts.interpolated += c.interpolated;
                fill.counts.boundary_filled += c.boundary_filled;
                for (row, value) in rows.iter_mut().zip(series) {
                    row.base.set(column, value);
                }
            }
            None => fill.unresolved.push(column),
        }
    }

    debug!(
        state = %fill.state,
        inserted = fill.inserted_rows,
        interpolated = fill.counts.interpolated,
        boundary = fill.counts.boundary_filled,
        "interpolated partition"
    );
    (rows, fill)
}

/// Repair every state partition of the pre-interpolation snapshot.
pub fn interpolate(pre: &Dataset) -> Interpolation {
    let partitions: Vec<&[ColonyRecord]> = pre.partitions().collect();
    let results: Vec<(Vec<ColonyRecord>, PartitionFill)> = partitions
        .par_iter()
        .map(|p| interpolate_partition(p))
        .collect();

    let mut out = Interpolation::default();
    for (rows, fill) in results {
        for &column in &fill.unresolved {
            let issue = DataQualityIssue::UnresolvableGap {
                state: fill.state.clone(),
                column,
            };
            warn!("{issue}");
            out.issues.push(issue);
        }
        out.records.extend(rows);
        out.fills.push(fill);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::{Period, Quarter, Region, Stressor};
    use approx::assert_relative_eq;

    fn record(state: &str, period: Period, initial: Option<f64>, varroa: Option<f64>) -> ColonyRecord {
        let mut base = BaseMetrics {
            initial_count: initial,
            max: Some(1.0),
            lost: Some(1.0),
            added: Some(1.0),
            renovated: Some(1.0),
            ..Default::default()
        };
        for s in Stressor::ALL {
            base.stressors.set(s, Some(1.0));
        }
        base.stressors.set(Stressor::VarroaMites, varroa);
        ColonyRecord {
            state: state.to_string(),
            state_code: "XX".to_string(),
            region: Region::West,
            period,
            base,
            derived: DerivedMetrics {
                lost_perc: Some(50.0),
                ..Default::default()
            },
        }
    }

    fn p(year: i32, q: Quarter) -> Period {
        Period::new(year, q)
    }

    #[test]
    fn interior_gap_is_linear_in_period_distance() {
        let mut s = vec![Some(10.0), None, None, Some(40.0)];
        let c = fill_series(&mut s).unwrap();
        assert_eq!(s, vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)]);
        assert_eq!(c, FillCounts { interpolated: 2, boundary_filled: 0 });

        let mut single = vec![Some(1.0), None, Some(4.0)];
        fill_series(&mut single).unwrap();
        assert_relative_eq!(single[1].unwrap(), 2.5);
    }

    #[test]
    fn edges_take_nearest_known_value() {
        let mut s = vec![None, None, Some(5.0), None, Some(9.0), None];
        let c = fill_series(&mut s).unwrap();
        assert_eq!(s, vec![Some(5.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0), Some(9.0)]);
        assert_eq!(c, FillCounts { interpolated: 1, boundary_filled: 3 });
    }

    #[test]
    fn all_missing_series_is_left_alone() {
        let mut s = vec![None, None];
        assert_eq!(fill_series(&mut s), None);
        assert_eq!(s, vec![None, None]);
    }

    #[test]
    fn absent_quarter_rows_are_inserted_and_filled() {
        // 2019Q2 missing from the input entirely
        let pre = normalize(vec![
            record("Utah", p(2019, Quarter::Q1), Some(100.0), Some(2.0)),
            record("Utah", p(2019, Quarter::Q3), Some(300.0), Some(6.0)),
        ])
        .unwrap();
        let out = interpolate(&pre);

        assert_eq!(out.records.len(), 3);
        let mid = &out.records[1];
        assert_eq!(mid.period, p(2019, Quarter::Q2));
        assert_eq!(mid.state_code, "XX");
        assert_eq!(mid.base.initial_count, Some(200.0));
        assert_eq!(mid.stressor(Stressor::VarroaMites), Some(4.0));
        assert_eq!(out.fills[0].inserted_rows, 1);
        // derived view is cleared for recomputation
        assert!(out.records.iter().all(|r| r.derived == DerivedMetrics::default()));
        assert!(out.issues.is_empty());
    }

    #[test]
    fn partitions_do_not_leak_into_each_other() {
        let pre = normalize(vec![
            record("Idaho", p(2015, Quarter::Q1), Some(10.0), Some(1.0)),
            record("Idaho", p(2015, Quarter::Q2), None, Some(1.0)),
            record("Oregon", p(2015, Quarter::Q1), Some(1000.0), Some(1.0)),
            record("Oregon", p(2015, Quarter::Q2), Some(3000.0), Some(1.0)),
        ])
        .unwrap();
        let out = interpolate(&pre);
        // Idaho's trailing gap comes from Idaho only.
        assert_eq!(out.records[1].state, "Idaho");
        assert_eq!(out.records[1].base.initial_count, Some(10.0));
        assert_eq!(out.records[3].base.initial_count, Some(3000.0));
    }

    #[test]
    fn fully_missing_column_is_reported_not_invented() {
        let pre = normalize(vec![
            record("Hawaii", p(2016, Quarter::Q1), Some(10.0), None),
            record("Hawaii", p(2016, Quarter::Q2), Some(12.0), None),
        ])
        .unwrap();
        let out = interpolate(&pre);
        assert!(out.records.iter().all(|r| r.stressor(Stressor::VarroaMites).is_none()));
        assert_eq!(
            out.issues,
            vec![DataQualityIssue::UnresolvableGap {
                state: "Hawaii".to_string(),
                column: BaseColumn::Stressor(Stressor::VarroaMites),
            }]
        );
        assert_eq!(out.fills[0].unresolved.len(), 1);
    }

    #[test]
    fn input_snapshot_is_not_modified() {
        let pre = normalize(vec![
            record("Iowa", p(2015, Quarter::Q1), Some(10.0), Some(1.0)),
            record("Iowa", p(2015, Quarter::Q2), None, Some(1.0)),
        ])
        .unwrap();
        let before = pre.clone();
        let _ = interpolate(&pre);
        assert_eq!(pre, before);
    }
}
