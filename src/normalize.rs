// Label normalization and the pre-interpolation snapshot.
use crate::error::{Error, Result};
use crate::types::ColonyRecord;
use tracing::debug;

/// Normalize a column label to lower snake case: `State Code` -> `state_code`.
///
/// Case and separator changes only. Runs of spaces, hyphens and underscores
/// collapse to a single underscore; leading and trailing separators are dropped.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.trim().trim_start_matches('\u{feff}').chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Records in canonical order with derived counts filled in.
///
/// Holds one record per (state, period), sorted by state then period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<ColonyRecord>,
}

impl Dataset {
    /// Wrap already-ordered records. Callers outside the pipeline should go
    /// through `normalize`.
    pub(crate) fn from_sorted(records: Vec<ColonyRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ColonyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Contiguous per-state slices, in state order.
    pub fn partitions(&self) -> impl Iterator<Item = &[ColonyRecord]> {
        self.records.chunk_by(|a, b| a.state == b.state)
    }

    pub fn states(&self) -> Vec<&str> {
        self.partitions().map(|p| p[0].state.as_str()).collect()
    }

    pub fn state(&self, state: &str) -> Option<&[ColonyRecord]> {
        self.partitions().find(|p| p[0].state == state)
    }
}

/// Sort joined records by (state, period), reject duplicates, and compute
/// `new_count`/`end_count` from the raw base values.
///
/// Percentages are left as observed. The result is the pre-interpolation
/// snapshot and is never modified by later stages.
pub fn normalize(mut records: Vec<ColonyRecord>) -> Result<Dataset> {
    records.sort_by(|a, b| a.state.cmp(&b.state).then(a.period.cmp(&b.period)));

    if let Some(dup) = records
        .windows(2)
        .find(|w| w[0].state == w[1].state && w[0].period == w[1].period)
    {
        return Err(Error::DuplicateRecord {
            state: dup[0].state.clone(),
            period: dup[0].period,
        });
    }

    for r in &mut records {
        r.derived.new_count = r.base.new_count();
        r.derived.end_count = r.base.end_count();
    }

    let dataset = Dataset::from_sorted(records);
    debug!(
        records = dataset.len(),
        states = dataset.states().len(),
        "normalized pre-interpolation snapshot"
    );
    Ok(dataset)
}
