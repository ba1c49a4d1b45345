use crate::error::{Error, Result};
use crate::normalize::normalize_label;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

// ---------------------------------------------------------------------------
// Closed vocabularies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn number(self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Quarter> {
        match n {
            1 => Some(Quarter::Q1),
            2 => Some(Quarter::Q2),
            3 => Some(Quarter::Q3),
            4 => Some(Quarter::Q4),
            _ => None,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// A census period such as `2015Q1`. Ordered by year, then quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub quarter: Quarter,
}

impl Period {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Self { year, quarter }
    }

    /// Position on a continuous quarterly axis; consecutive quarters differ by one.
    pub fn index(self) -> i64 {
        self.year as i64 * 4 + (self.quarter.number() as i64 - 1)
    }

    pub fn from_index(index: i64) -> Self {
        let year = index.div_euclid(4) as i32;
        let q = index.rem_euclid(4) as u8 + 1;
        // rem_euclid(4) is always 0..=3
        let quarter = Quarter::from_number(q).unwrap_or(Quarter::Q1);
        Self { year, quarter }
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.quarter)
    }
}

impl FromStr for Period {
    type Err = Error;

    /// Accepts `2015Q1`, `2015 Q1`, `2015-q1`.
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let invalid = || Error::InvalidPeriod(s.trim().to_string());
        let (year_part, q_part) = upper.split_once('Q').ok_or_else(invalid)?;
        let year_part = year_part.trim_end_matches(|c: char| c == '-' || c.is_whitespace());
        if year_part.len() != 4 {
            return Err(invalid());
        }
        let year: i32 = year_part.parse().map_err(|_| invalid())?;
        let q: u8 = q_part.trim().parse().map_err(|_| invalid())?;
        let quarter = Quarter::from_number(q).ok_or_else(invalid)?;
        Ok(Period { year, quarter })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    Midwest,
    Northeast,
    South,
    West,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Midwest, Region::Northeast, Region::South, Region::West];

    pub fn name(self) -> &'static str {
        match self {
            Region::Midwest => "Midwest",
            Region::Northeast => "Northeast",
            Region::South => "South",
            Region::West => "West",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.trim().to_string())
    }
}

/// One of the six tracked causes of colony loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stressor {
    VarroaMites,
    OtherPests,
    Diseases,
    Pesticides,
    Other,
    Unknown,
}

impl Stressor {
    pub const ALL: [Stressor; 6] = [
        Stressor::VarroaMites,
        Stressor::OtherPests,
        Stressor::Diseases,
        Stressor::Pesticides,
        Stressor::Other,
        Stressor::Unknown,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn column(self) -> &'static str {
        match self {
            Stressor::VarroaMites => "varroa_mites",
            Stressor::OtherPests => "other_pests",
            Stressor::Diseases => "diseases",
            Stressor::Pesticides => "pesticides",
            Stressor::Other => "other",
            Stressor::Unknown => "unknown",
        }
    }

    /// Human-readable label, e.g. `varroa mites`.
    pub fn label(self) -> &'static str {
        match self {
            Stressor::VarroaMites => "varroa mites",
            Stressor::OtherPests => "other pests",
            other => other.column(),
        }
    }
}

impl fmt::Display for Stressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Stressor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = normalize_label(s);
        Stressor::ALL
            .into_iter()
            .find(|st| st.column() == key)
            .ok_or_else(|| Error::InvalidStressor(s.trim().to_string()))
    }
}

/// The key a significance run buckets records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupingKey {
    Quarter,
    Region,
}

impl GroupingKey {
    pub fn name(self) -> &'static str {
        match self {
            GroupingKey::Quarter => "quarter",
            GroupingKey::Region => "region",
        }
    }

    /// Every group value for this key, in display order.
    pub fn values(self) -> Vec<GroupValue> {
        match self {
            GroupingKey::Quarter => Quarter::ALL.into_iter().map(GroupValue::Quarter).collect(),
            GroupingKey::Region => Region::ALL.into_iter().map(GroupValue::Region).collect(),
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GroupingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_label(s).as_str() {
            "quarter" => Ok(GroupingKey::Quarter),
            "region" => Ok(GroupingKey::Region),
            _ => Err(Error::InvalidGroupingKey(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupValue {
    Quarter(Quarter),
    Region(Region),
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Quarter(q) => q.fmt(f),
            GroupValue::Region(r) => r.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The group's mean differs significantly from the population mean.
    Reject,
    Fail,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Reject => "reject",
            Classification::Fail => "fail",
        })
    }
}

/// Columns that take part in interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseColumn {
    InitialCount,
    Max,
    Lost,
    Added,
    Renovated,
    Stressor(Stressor),
}

impl BaseColumn {
    pub const ALL: [BaseColumn; 11] = [
        BaseColumn::InitialCount,
        BaseColumn::Max,
        BaseColumn::Lost,
        BaseColumn::Added,
        BaseColumn::Renovated,
        BaseColumn::Stressor(Stressor::VarroaMites),
        BaseColumn::Stressor(Stressor::OtherPests),
        BaseColumn::Stressor(Stressor::Diseases),
        BaseColumn::Stressor(Stressor::Pesticides),
        BaseColumn::Stressor(Stressor::Other),
        BaseColumn::Stressor(Stressor::Unknown),
    ];

    pub fn name(self) -> &'static str {
        match self {
            BaseColumn::InitialCount => "initial_count",
            BaseColumn::Max => "max",
            BaseColumn::Lost => "lost",
            BaseColumn::Added => "added",
            BaseColumn::Renovated => "renovated",
            BaseColumn::Stressor(s) => s.column(),
        }
    }
}

impl fmt::Display for BaseColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Columns rebuilt from the base view after interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedColumn {
    LostPerc,
    RenovatedPerc,
    NewCount,
    EndCount,
}

impl fmt::Display for DerivedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DerivedColumn::LostPerc => "lost_perc",
            DerivedColumn::RenovatedPerc => "renovated_perc",
            DerivedColumn::NewCount => "new_count",
            DerivedColumn::EndCount => "end_count",
        })
    }
}

// ---------------------------------------------------------------------------
// Raw input rows (after header normalization)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawCensusRow {
    pub state: Option<String>,
    pub period: Option<String>,
    pub initial_count: Option<String>,
    pub max: Option<String>,
    pub lost: Option<String>,
    pub lost_perc: Option<String>,
    pub added: Option<String>,
    pub renovated: Option<String>,
    pub renovated_perc: Option<String>,
    pub varroa_mites: Option<String>,
    pub other_pests: Option<String>,
    pub diseases: Option<String>,
    pub pesticides: Option<String>,
    pub other: Option<String>,
    pub unknown: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawRegionRow {
    pub state: String,
    pub state_code: String,
    pub region: String,
}

// ---------------------------------------------------------------------------
// Typed records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StressorValues([Option<f64>; 6]);

impl StressorValues {
    pub fn get(&self, stressor: Stressor) -> Option<f64> {
        self.0[stressor.index()]
    }

    pub fn set(&mut self, stressor: Stressor, value: Option<f64>) {
        self.0[stressor.index()] = value;
    }
}

/// The base-metrics view: every value interpolation is allowed to touch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BaseMetrics {
    pub initial_count: Option<f64>,
    pub max: Option<f64>,
    pub lost: Option<f64>,
    pub added: Option<f64>,
    pub renovated: Option<f64>,
    pub stressors: StressorValues,
}

impl BaseMetrics {
    pub fn get(&self, column: BaseColumn) -> Option<f64> {
        match column {
            BaseColumn::InitialCount => self.initial_count,
            BaseColumn::Max => self.max,
            BaseColumn::Lost => self.lost,
            BaseColumn::Added => self.added,
            BaseColumn::Renovated => self.renovated,
            BaseColumn::Stressor(s) => self.stressors.get(s),
        }
    }

    pub fn set(&mut self, column: BaseColumn, value: Option<f64>) {
        match column {
            BaseColumn::InitialCount => self.initial_count = value,
            BaseColumn::Max => self.max = value,
            BaseColumn::Lost => self.lost = value,
            BaseColumn::Added => self.added = value,
            BaseColumn::Renovated => self.renovated = value,
            BaseColumn::Stressor(s) => self.stressors.set(s, value),
        }
    }

    /// `initial_count - lost`
    pub fn new_count(&self) -> Option<f64> {
        Some(self.initial_count? - self.lost?)
    }

    /// `initial_count - lost + added + renovated`
    pub fn end_count(&self) -> Option<f64> {
        Some(self.initial_count? - self.lost? + self.added? + self.renovated?)
    }
}

/// The derived-metrics view: percentages and counts computed from the base view.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedMetrics {
    pub lost_perc: Option<f64>,
    pub renovated_perc: Option<f64>,
    pub new_count: Option<f64>,
    pub end_count: Option<f64>,
}

/// A census row after parsing, before the region join.
#[derive(Debug, Clone)]
pub struct CensusRow {
    pub state: String,
    pub period: Period,
    pub base: BaseMetrics,
    pub lost_perc: Option<f64>,
    pub renovated_perc: Option<f64>,
}

/// One (state, period) record.
#[derive(Debug, Clone, PartialEq)]
pub struct ColonyRecord {
    pub state: String,
    pub state_code: String,
    pub region: Region,
    pub period: Period,
    pub base: BaseMetrics,
    pub derived: DerivedMetrics,
}

impl ColonyRecord {
    pub fn group_value(&self, key: GroupingKey) -> GroupValue {
        match key {
            GroupingKey::Quarter => GroupValue::Quarter(self.period.quarter),
            GroupingKey::Region => GroupValue::Region(self.region),
        }
    }

    pub fn stressor(&self, stressor: Stressor) -> Option<f64> {
        self.base.stressors.get(stressor)
    }

    pub fn to_row(&self) -> ColonyRow {
        let s = &self.base.stressors;
        ColonyRow {
            state: self.state.clone(),
            state_code: self.state_code.clone(),
            region: self.region.name().to_string(),
            period: self.period.to_string(),
            year: self.period.year,
            quarter: self.period.quarter.to_string(),
            initial_count: self.base.initial_count,
            max: self.base.max,
            lost: self.base.lost,
            lost_perc: self.derived.lost_perc,
            added: self.base.added,
            renovated: self.base.renovated,
            renovated_perc: self.derived.renovated_perc,
            new_count: self.derived.new_count,
            end_count: self.derived.end_count,
            varroa_mites: s.get(Stressor::VarroaMites),
            other_pests: s.get(Stressor::OtherPests),
            diseases: s.get(Stressor::Diseases),
            pesticides: s.get(Stressor::Pesticides),
            other: s.get(Stressor::Other),
            unknown: s.get(Stressor::Unknown),
        }
    }
}

/// Flat CSV form of a `ColonyRecord`; missing values are written as empty cells.
#[derive(Debug, Serialize)]
pub struct ColonyRow {
    pub state: String,
    pub state_code: String,
    pub region: String,
    pub period: String,
    pub year: i32,
    pub quarter: String,
    pub initial_count: Option<f64>,
    pub max: Option<f64>,
    pub lost: Option<f64>,
    pub lost_perc: Option<f64>,
    pub added: Option<f64>,
    pub renovated: Option<f64>,
    pub renovated_perc: Option<f64>,
    pub new_count: Option<f64>,
    pub end_count: Option<f64>,
    pub varroa_mites: Option<f64>,
    pub other_pests: Option<f64>,
    pub diseases: Option<f64>,
    pub pesticides: Option<f64>,
    pub other: Option<f64>,
    pub unknown: Option<f64>,
}

// ---------------------------------------------------------------------------
// Report rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupMeanRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Stressor")]
    pub stressor: String,
    #[tabled(rename = "Samples")]
    pub samples: usize,
    #[tabled(rename = "Mean")]
    pub mean: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StressorTestRow {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Stressor")]
    pub stressor: String,
    #[tabled(rename = "GroupMean")]
    pub group_mean: String,
    #[tabled(rename = "OverallMean")]
    pub overall_mean: String,
    #[tabled(rename = "T")]
    pub t_statistic: String,
    #[tabled(rename = "PValue")]
    pub p_value: String,
    #[tabled(rename = "Result")]
    pub classification: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct StateStressorMeansRow {
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "VarroaMites")]
    pub varroa_mites: String,
    #[tabled(rename = "OtherPests")]
    pub other_pests: String,
    #[tabled(rename = "Diseases")]
    pub diseases: String,
    #[tabled(rename = "Pesticides")]
    pub pesticides: String,
    #[tabled(rename = "Other")]
    pub other: String,
    #[tabled(rename = "Unknown")]
    pub unknown: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RestorationRow {
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Periods")]
    pub periods: usize,
    #[tabled(rename = "Restored")]
    pub restored: usize,
    #[tabled(rename = "Percentage")]
    pub percentage: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct FillSummaryRow {
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "InsertedRows")]
    pub inserted_rows: usize,
    #[tabled(rename = "Interpolated")]
    pub interpolated: usize,
    #[tabled(rename = "BoundaryFilled")]
    pub boundary_filled: usize,
    #[tabled(rename = "Unresolved")]
    pub unresolved_columns: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct IssueRow {
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub pre_interpolation_records: usize,
    pub canonical_records: usize,
    pub total_states: usize,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub inserted_rows: usize,
    pub interpolated_values: usize,
    pub boundary_filled_values: usize,
    pub unresolvable_gaps: usize,
    pub division_by_zero_metrics: usize,
    pub most_impactful_stressor: Option<String>,
    pub most_impactful_mean: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_common_spellings() {
        let expected = Period::new(2015, Quarter::Q1);
        assert_eq!("2015Q1".parse::<Period>().unwrap(), expected);
        assert_eq!(" 2015 Q1 ".parse::<Period>().unwrap(), expected);
        assert_eq!("2015-q1".parse::<Period>().unwrap(), expected);
    }

    #[test]
    fn period_rejects_bad_labels() {
        for bad in ["2015Q5", "2015", "15Q1", "Q1", "abcdQ1", ""] {
            assert!(bad.parse::<Period>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn period_index_is_contiguous_across_years() {
        let q4 = Period::new(2018, Quarter::Q4);
        assert_eq!(q4.next(), Period::new(2019, Quarter::Q1));
        assert_eq!(Period::from_index(q4.index()), q4);
        assert!(Period::new(2019, Quarter::Q1) < Period::new(2019, Quarter::Q2));
        assert_eq!(q4.to_string(), "2018Q4");
    }

    #[test]
    fn grouping_key_parses_or_reports_invalid() {
        assert_eq!("quarter".parse::<GroupingKey>().unwrap(), GroupingKey::Quarter);
        assert_eq!("Region".parse::<GroupingKey>().unwrap(), GroupingKey::Region);
        match "state".parse::<GroupingKey>() {
            Err(Error::InvalidGroupingKey(k)) => assert_eq!(k, "state"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn grouping_keys_have_four_values() {
        assert_eq!(GroupingKey::Quarter.values().len(), 4);
        assert_eq!(GroupingKey::Region.values().len(), 4);
    }

    #[test]
    fn stressor_accepts_labels_and_columns() {
        assert_eq!("varroa mites".parse::<Stressor>().unwrap(), Stressor::VarroaMites);
        assert_eq!("Other_Pests".parse::<Stressor>().unwrap(), Stressor::OtherPests);
        assert!("weather".parse::<Stressor>().is_err());
    }

    #[test]
    fn derived_counts_follow_formula() {
        let base = BaseMetrics {
            initial_count: Some(100.0),
            lost: Some(10.0),
            added: Some(5.0),
            renovated: Some(2.0),
            ..Default::default()
        };
        assert_eq!(base.new_count(), Some(90.0));
        assert_eq!(base.end_count(), Some(97.0));

        let partial = BaseMetrics { added: None, ..base };
        assert_eq!(partial.new_count(), Some(90.0));
        assert_eq!(partial.end_count(), None);
    }
}
