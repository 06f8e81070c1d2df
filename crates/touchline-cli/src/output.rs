//! Rendering scraped records for the terminal or as CSV.

use std::io;

use touchline_core::record::StatRecord;

/// Left-aligned columns separated by two spaces, with a dashed rule under the
/// header. Missing cells render empty.
pub fn render_table(records: &[StatRecord]) -> String {
  let Some(first) = records.first() else { return String::new() };
  let header: Vec<&str> = first.columns().collect();
  let rows: Vec<Vec<&str>> = records
    .iter()
    .map(|r| r.cells().map(Option::unwrap_or_default).collect())
    .collect();

  let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
  for row in &rows {
    for (w, cell) in widths.iter_mut().zip(row) {
      *w = (*w).max(cell.chars().count());
    }
  }

  let line = |cells: &[&str]| {
    cells
      .iter()
      .zip(&widths)
      .map(|(c, w)| format!("{c:<w$}"))
      .collect::<Vec<_>>()
      .join("  ")
      .trim_end()
      .to_owned()
  };

  let mut out = line(&header);
  out.push('\n');
  out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
  out.push('\n');
  for row in &rows {
    out.push_str(&line(row));
    out.push('\n');
  }
  out
}

/// Write `records` as CSV with a header row.
pub fn write_csv<W: io::Write>(records: &[StatRecord], writer: W) -> csv::Result<()> {
  let mut csv = csv::Writer::from_writer(writer);
  if let Some(first) = records.first() {
    csv.write_record(first.columns())?;
  }
  for record in records {
    csv.write_record(record.cells().map(Option::unwrap_or_default))?;
  }
  csv.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn records() -> Vec<StatRecord> {
    [("Mohamed Salah", Some("29")), ("Bukayo Saka, Jr", None)]
      .into_iter()
      .map(|(player, goals)| {
        let mut r = StatRecord::new("2024-2025", "Premier-League");
        r.push("player", Some(player.to_owned()));
        r.push("goals", goals.map(str::to_owned));
        r
      })
      .collect()
  }

  #[test]
  fn table_aligns_columns() {
    let table = render_table(&records());
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "player           goals  season     competition");
    assert_eq!(lines[1], "---------------  -----  ---------  --------------");
    assert_eq!(lines[2], "Mohamed Salah    29     2024-2025  Premier-League");
    assert_eq!(lines[3], "Bukayo Saka, Jr         2024-2025  Premier-League");
  }

  #[test]
  fn empty_input_renders_nothing() {
    assert_eq!(render_table(&[]), "");
  }

  #[test]
  fn csv_quotes_and_leaves_missing_cells_empty() {
    let mut buf = Vec::new();
    write_csv(&records(), &mut buf).unwrap();
    assert_eq!(
      String::from_utf8(buf).unwrap(),
      concat!(
        "player,goals,season,competition\n",
        "Mohamed Salah,29,2024-2025,Premier-League\n",
        "\"Bukayo Saka, Jr\",,2024-2025,Premier-League\n",
      )
    );
  }
}
