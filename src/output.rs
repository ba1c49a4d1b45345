use crate::error::Result;
use crate::normalize::Dataset;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    debug!(path = %path.as_ref().display(), rows = rows.len(), "wrote CSV");
    Ok(())
}

/// Write a dataset snapshot, one row per record, missing values as empty cells.
pub fn write_dataset(path: impl AsRef<Path>, data: &Dataset) -> Result<()> {
    let rows: Vec<_> = data.records().iter().map(|r| r.to_row()).collect();
    write_csv(path, &rows)
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn render_table<T>(rows: &[T], max_rows: usize) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    Some(Table::new(slice).with(Style::markdown()).to_string())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    match render_table(rows, max_rows) {
        Some(table) => println!("{}\n", table),
        None => println!("(no rows)\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RestorationRow;

    fn rows() -> Vec<RestorationRow> {
        vec![
            RestorationRow {
                state: "Iowa".into(),
                periods: 24,
                restored: 12,
                percentage: "50.00".into(),
            },
            RestorationRow {
                state: "Ohio".into(),
                periods: 24,
                restored: 6,
                percentage: "25.00".into(),
            },
        ]
    }

    #[test]
    fn render_table_limits_rows() {
        let table = render_table(&rows(), 1).unwrap();
        assert!(table.contains("Iowa"));
        assert!(!table.contains("Ohio"));
        assert!(table.contains("Percentage"));
        assert!(render_table::<RestorationRow>(&[], 3).is_none());
    }

    #[test]
    fn write_csv_emits_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        write_csv(&path, &rows()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("state,periods,restored,percentage"));
        assert_eq!(lines.next(), Some("Iowa,24,12,50.00"));
    }
}
