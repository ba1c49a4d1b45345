use crate::error::Result;
use crate::normalize::normalize_label;
use crate::region::RegionMap;
use crate::types::{BaseMetrics, CensusRow, Period, RawCensusRow, RawRegionRow, Stressor};
use crate::util::{parse_f64_safe, parse_text};
use csv::{Reader, ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
}

fn normalize_headers<R: Read>(rdr: &mut Reader<R>) -> Result<()> {
    let headers: StringRecord = rdr.headers()?.iter().map(normalize_label).collect();
    rdr.set_headers(headers);
    Ok(())
}

pub fn load_census(path: impl AsRef<Path>) -> Result<(Vec<CensusRow>, LoadReport)> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path.as_ref())?;
    let out = read_census(rdr)?;
    info!(
        path = %path.as_ref().display(),
        total = out.1.total_rows,
        kept = out.1.kept_rows,
        parse_errors = out.1.parse_errors,
        "loaded census table"
    );
    Ok(out)
}

/// Parse census rows from any reader whose first line is a header.
pub fn read_census<R: Read>(mut rdr: Reader<R>) -> Result<(Vec<CensusRow>, LoadReport)> {
    normalize_headers(&mut rdr)?;
    let mut report = LoadReport::default();
    let mut rows = Vec::new();

    for (line, result) in rdr.deserialize::<RawCensusRow>().enumerate() {
        report.total_rows += 1;
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping unreadable census row");
                report.parse_errors += 1;
                continue;
            }
        };

        let Some(state) = parse_text(raw.state.as_deref()) else {
            warn!(line = line + 2, "skipping census row without a state");
            report.parse_errors += 1;
            continue;
        };
        let period = match raw.period.as_deref().unwrap_or_default().parse::<Period>() {
            Ok(p) => p,
            Err(e) => {
                warn!(line = line + 2, %state, error = %e, "skipping census row");
                report.parse_errors += 1;
                continue;
            }
        };

        let mut base = BaseMetrics {
            initial_count: parse_f64_safe(raw.initial_count.as_deref()),
            max: parse_f64_safe(raw.max.as_deref()),
            lost: parse_f64_safe(raw.lost.as_deref()),
            added: parse_f64_safe(raw.added.as_deref()),
            renovated: parse_f64_safe(raw.renovated.as_deref()),
            ..Default::default()
        };
        let stressor_cells = [
            (Stressor::VarroaMites, &raw.varroa_mites),
            (Stressor::OtherPests, &raw.other_pests),
            (Stressor::Diseases, &raw.diseases),
            (Stressor::Pesticides, &raw.pesticides),
            (Stressor::Other, &raw.other),
            (Stressor::Unknown, &raw.unknown),
        ];
        for (stressor, cell) in stressor_cells {
            base.stressors.set(stressor, parse_f64_safe(cell.as_deref()));
        }

        rows.push(CensusRow {
            state,
            period,
            base,
            lost_perc: parse_f64_safe(raw.lost_perc.as_deref()),
            renovated_perc: parse_f64_safe(raw.renovated_perc.as_deref()),
        });
    }

    report.kept_rows = rows.len();
    Ok((rows, report))
}

pub fn load_regions(path: impl AsRef<Path>) -> Result<RegionMap> {
    let rdr = ReaderBuilder::new().flexible(true).from_path(path.as_ref())?;
    let map = read_regions(rdr)?;
    info!(path = %path.as_ref().display(), states = map.len(), "loaded region lookup");
    Ok(map)
}

/// The lookup must be complete; any unreadable row is an error.
pub fn read_regions<R: Read>(mut rdr: Reader<R>) -> Result<RegionMap> {
    normalize_headers(&mut rdr)?;
    let rows = rdr
        .deserialize::<RawRegionRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    RegionMap::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Quarter, Region};

    fn reader(text: &str) -> Reader<&[u8]> {
        ReaderBuilder::new().flexible(true).from_reader(text.as_bytes())
    }

    #[test]
    fn census_headers_are_normalized_and_cells_parsed() {
        let csv = "\
State,Period,Initial Count,Max,Lost,Lost Perc,Added,Renovated,Renovated Perc,Varroa Mites,Other Pests,Diseases,Pesticides,Other,Unknown,Year
Alabama,2015Q1,\"7,000\",7000,1800,26,2800,250,4,10,5.4,,2.2,9.1,9.4,2015
Alabama,2015Q2,7500,,NA,,,,,,,,,,,2015
";
        let (rows, report) = read_census(reader(csv)).unwrap();
        assert_eq!(report, LoadReport { total_rows: 2, kept_rows: 2, parse_errors: 0 });

        let first = &rows[0];
        assert_eq!(first.state, "Alabama");
        assert_eq!(first.period, Period::new(2015, Quarter::Q1));
        assert_eq!(first.base.initial_count, Some(7000.0));
        assert_eq!(first.lost_perc, Some(26.0));
        assert_eq!(first.base.stressors.get(Stressor::OtherPests), Some(5.4));
        assert_eq!(first.base.stressors.get(Stressor::Diseases), None);

        let second = &rows[1];
        assert_eq!(second.base.lost, None);
        assert_eq!(second.base.max, None);
        assert_eq!(second.lost_perc, None);
    }

    #[test]
    fn rows_without_state_or_period_are_counted_and_skipped() {
        let csv = "\
state,period,initial_count
Alabama,2015Q1,10
,2015Q2,10
Alabama,sometime,10
Alabama,2015Q3,10
";
        let (rows, report) = read_census(reader(csv)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.parse_errors, 2);
    }

    #[test]
    fn region_lookup_reads_normalized_headers() {
        let csv = "State,State Code,Region\nAlabama,AL,South\nIowa,IA,Midwest\n";
        let map = read_regions(reader(csv)).unwrap();
        assert_eq!(map.len(), 2);
        let entry = map.get("Iowa").unwrap();
        assert_eq!(entry.state_code, "IA");
        assert_eq!(entry.region, Region::Midwest);
    }

    #[test]
    fn region_lookup_rejects_duplicates() {
        let csv = "state,state_code,region\nIowa,IA,Midwest\nIowa,IA,Midwest\n";
        assert!(matches!(
            read_regions(reader(csv)),
            Err(Error::AmbiguousRegionMapping { .. })
        ));
    }
}
