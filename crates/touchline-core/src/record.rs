//! [`StatRecord`]: one extracted table row.

use serde::{Serialize, Serializer, ser::SerializeMap};

/// One row of a stat table: column values in schema order plus the season and
/// competition the caller asked for.
///
/// A `None` value means the row had no cell at that position, which is not the
/// same as a present but empty cell (`Some("")`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
  pub values:      Vec<(String, Option<String>)>,
  pub season:      String,
  pub competition: String,
}

impl StatRecord {
  pub fn new(season: impl Into<String>, competition: impl Into<String>) -> Self {
    Self {
      values:      Vec::new(),
      season:      season.into(),
      competition: competition.into(),
    }
  }

  pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
    self.values.push((column.into(), value));
  }

  /// `None` if the column is not part of the record; `Some(None)` if it is
  /// but had no cell.
  pub fn get(&self, column: &str) -> Option<Option<&str>> {
    match column {
      "season" => Some(Some(self.season.as_str())),
      "competition" => Some(Some(self.competition.as_str())),
      _ => self
        .values
        .iter()
        .find(|(c, _)| c == column)
        .map(|(_, v)| v.as_deref()),
    }
  }

  /// Column names in output order, metadata last.
  pub fn columns(&self) -> impl Iterator<Item = &str> {
    self
      .values
      .iter()
      .map(|(c, _)| c.as_str())
      .chain(["season", "competition"])
  }

  /// Values in the same order as [`StatRecord::columns`].
  pub fn cells(&self) -> impl Iterator<Item = Option<&str>> {
    self
      .values
      .iter()
      .map(|(_, v)| v.as_deref())
      .chain([Some(self.season.as_str()), Some(self.competition.as_str())])
  }
}

impl Serialize for StatRecord {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
    for (column, value) in &self.values {
      map.serialize_entry(column, value)?;
    }
    map.serialize_entry("season", &self.season)?;
    map.serialize_entry("competition", &self.competition)?;
    map.end()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record() -> StatRecord {
    let mut r = StatRecord::new("2024-2025", "Premier-League");
    r.push("name", Some("Bukayo Saka".into()));
    r.push("nation", Some("ENG".into()));
    r.push("goals", Some(String::new()));
    r.push("assists", None);
    r
  }

  #[test]
  fn serialises_in_column_order_with_nulls() {
    let json = serde_json::to_string(&record()).unwrap();
    assert_eq!(
      json,
      r#"{"name":"Bukayo Saka","nation":"ENG","goals":"","assists":null,"season":"2024-2025","competition":"Premier-League"}"#
    );
  }

  #[test]
  fn missing_and_empty_are_distinct() {
    let r = record();
    assert_eq!(r.get("goals"), Some(Some("")));
    assert_eq!(r.get("assists"), Some(None));
    assert_eq!(r.get("xG"), None);
    assert_eq!(r.get("season"), Some(Some("2024-2025")));
  }

  #[test]
  fn columns_and_cells_line_up() {
    let r = record();
    let cols: Vec<_> = r.columns().collect();
    let cells: Vec<_> = r.cells().collect();
    assert_eq!(cols.len(), cells.len());
    assert_eq!(cols.last(), Some(&"competition"));
    assert_eq!(cells[3], None);
  }
}
