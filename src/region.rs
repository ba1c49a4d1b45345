// State -> region lookup and the join that attaches it to census rows.
use crate::error::{Error, Result};
use crate::types::{CensusRow, ColonyRecord, DerivedMetrics, RawRegionRow, Region};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RegionEntry {
    pub state_code: String,
    pub region: Region,
}

/// Immutable one-to-one lookup from state name to region.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    entries: HashMap<String, RegionEntry>,
}

impl RegionMap {
    /// Build the lookup, failing on repeated states or unknown region names.
    pub fn from_rows(rows: Vec<RawRegionRow>) -> Result<Self> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in &rows {
            *counts.entry(row.state.trim().to_string()).or_default() += 1;
        }
        if let Some((state, count)) = counts.into_iter().filter(|(_, c)| *c > 1).min() {
            return Err(Error::AmbiguousRegionMapping { state, count });
        }

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let state = row.state.trim().to_string();
            let region = row.region.parse::<Region>().map_err(|region| Error::InvalidRegion {
                state: state.clone(),
                region,
            })?;
            entries.insert(
                state,
                RegionEntry {
                    state_code: row.state_code.trim().to_string(),
                    region,
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn get(&self, state: &str) -> Option<&RegionEntry> {
        self.entries.get(state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inner-join census rows with the region lookup.
///
/// Produces exactly one record per input row. A state with no entry in the
/// lookup is a configuration error and aborts the join.
pub fn join(rows: Vec<CensusRow>, regions: &RegionMap) -> Result<Vec<ColonyRecord>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let entry = regions
            .get(&row.state)
            .ok_or_else(|| Error::MissingRegionMapping {
                state: row.state.clone(),
            })?;
        out.push(ColonyRecord {
            state_code: entry.state_code.clone(),
            region: entry.region,
            period: row.period,
            base: row.base,
            derived: DerivedMetrics {
                lost_perc: row.lost_perc,
                renovated_perc: row.renovated_perc,
                ..Default::default()
            },
            state: row.state,
        });
    }
    debug!(rows = out.len(), "joined census rows with region lookup");
    Ok(out)
}
