//! HTML table → [`StatRecord`] extraction.

use scraper::{ElementRef, Html, Selector};
use touchline_core::{
  record::StatRecord,
  stat::{NATION_COLUMN, StatCategorySchema},
};

use crate::error::ExtractionError;

struct Selectors {
  container: Selector,
  body:      Selector,
  row:       Selector,
  cell:      Selector,
  link:      Selector,
}

impl Selectors {
  fn new(container_id: &str) -> Result<Self, ExtractionError> {
    Ok(Self {
      container: selector(&format!("div[id=\"{container_id}\"]"))?,
      body:      selector("tbody")?,
      row:       selector("tr")?,
      cell:      selector("td")?,
      link:      selector("a")?,
    })
  }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
  Selector::parse(css).map_err(|e| ExtractionError::Selector(e.to_string()))
}

/// Extract every data row of the table identified by `schema.container_id`.
///
/// Rows come back in document order; repeated header rows (class `thead`) are
/// skipped. `season` and `competition` are stamped onto every record as given.
pub fn extract(
  document:    &str,
  schema:      &StatCategorySchema,
  season:      &str,
  competition: &str,
) -> Result<Vec<StatRecord>, ExtractionError> {
  let sel  = Selectors::new(schema.container_id)?;
  let html = Html::parse_document(document);

  let container = html
    .select(&sel.container)
    .next()
    .ok_or(ExtractionError::ContainerNotFound)?;

  if let Some(body) = container.select(&sel.body).next() {
    return Ok(read_rows(body, &sel, schema, season, competition));
  }

  // fbref ships most secondary tables commented out inside the container.
  for node in container.descendants() {
    let Some(comment) = node.value().as_comment() else { continue };
    let fragment = Html::parse_fragment(comment);
    if let Some(body) = fragment.select(&sel.body).next() {
      return Ok(read_rows(body, &sel, schema, season, competition));
    }
  }

  Err(ExtractionError::ContainerNotFound)
}

fn read_rows(
  body:        ElementRef<'_>,
  sel:         &Selectors,
  schema:      &StatCategorySchema,
  season:      &str,
  competition: &str,
) -> Vec<StatRecord> {
  body
    .select(&sel.row)
    .filter(|row| !row.value().classes().any(|c| c == "thead"))
    .map(|row| {
      let cells: Vec<ElementRef<'_>> = row.select(&sel.cell).collect();
      let mut record = StatRecord::new(season, competition);
      for (i, column) in schema.columns.iter().enumerate() {
        let Some(column) = column else { continue };
        let value = cells.get(i).and_then(|cell| cell_value(*cell, column, sel));
        record.push(*column, value);
      }
      record
    })
    .collect()
}

/// `None` only for an empty nation cell; every other present cell yields text.
fn cell_value(cell: ElementRef<'_>, column: &str, sel: &Selectors) -> Option<String> {
  if column == NATION_COLUMN {
    // Flag glyph or country code first, country last.
    let text = cell.text().collect::<Vec<_>>().join(" ");
    return text.split_whitespace().last().map(str::to_owned);
  }

  let text: String = match cell.select(&sel.link).next() {
    Some(link) => link.text().collect(),
    None => cell.text().collect(),
  };
  Some(text.trim().to_owned())
}

#[cfg(test)]
mod tests {
  use touchline_core::stat::StatCategory;

  use super::*;

  fn standard_row(name: &str, nation_html: &str, goals: &str) -> String {
    format!(
      r#"<tr>
        <th data-stat="ranker">1</th>
        <td data-stat="player"><a href="/en/players/x">{name}</a></td>
        <td data-stat="nationality">{nation_html}</td>
        <td data-stat="position">FW</td>
        <td data-stat="team"><a href="/en/squads/y"> Arsenal </a></td>
        <td data-stat="age">23-120</td>
        <td data-stat="birth_year">2001</td>
        <td data-stat="games">38</td>
        <td data-stat="games_starts">36</td>
        <td data-stat="minutes">3,120</td>
        <td data-stat="minutes_90s">34.7</td>
        <td data-stat="goals">{goals}</td>
      </tr>"#
    )
  }

  fn page(container_id: &str, rows: &str) -> String {
    format!(
      r#"<html><body>
        <div id="{container_id}">
          <table><thead><tr><th>Player</th></tr></thead>
          <tbody>{rows}</tbody></table>
        </div>
      </body></html>"#
    )
  }

  #[test]
  fn one_record_per_row_in_document_order() {
    let rows = [
      standard_row("Bukayo Saka", "<a><span>eng</span> ENG</a>", "16"),
      r#"<tr class="thead"><th>Rk</th><td>Player</td></tr>"#.to_owned(),
      standard_row("Erling Haaland", "<a><span>no</span> NOR</a>", "22"),
    ]
    .concat();
    let html = page("div_stats_standard", &rows);

    let records =
      extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name"), Some(Some("Bukayo Saka")));
    assert_eq!(records[1].get("name"), Some(Some("Erling Haaland")));
    assert_eq!(records[1].get("goals"), Some(Some("22")));
  }

  #[test]
  fn nation_keeps_last_token() {
    let html = page("div_stats_standard", &standard_row("Saka", "🏴 ENG", "1"));
    let records =
      extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap();
    assert_eq!(records[0].get("nation"), Some(Some("ENG")));

    let html = page("div_stats_standard", &standard_row("Saka", "", "1"));
    let records =
      extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap();
    assert_eq!(records[0].get("nation"), Some(None));
  }

  #[test]
  fn link_text_wins_and_is_trimmed() {
    let html = page("div_stats_standard", &standard_row("Saka", "ENG", "1"));
    let records =
      extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap();
    assert_eq!(records[0].get("team"), Some(Some("Arsenal")));
    assert_eq!(records[0].get("minutes"), Some(Some("3,120")));
  }

  #[test]
  fn missing_cells_are_null_and_empty_cells_are_empty() {
    let html = page("div_stats_standard", &standard_row("Saka", "ENG", ""));
    let records =
      extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap();
    let r = &records[0];
    assert_eq!(r.get("goals"), Some(Some("")));
    assert_eq!(r.get("assists"), Some(None));
    assert_eq!(r.get("progressive_passes"), Some(None));
  }

  #[test]
  fn metadata_comes_from_the_caller() {
    let html = page("div_stats_standard", &standard_row("Saka", "ENG", "1"));
    let records = extract(&html, StatCategory::Standard.schema(), "2023-2024", "EPL").unwrap();
    assert_eq!(records[0].season, "2023-2024");
    assert_eq!(records[0].competition, "EPL");
  }

  #[test]
  fn placeholder_positions_are_skipped() {
    let html = page("all_stats_keeper", &standard_row("Raya", "ESP", "30"));
    let records =
      extract(&html, StatCategory::Keeper.schema(), "2024-2025", "Premier-League").unwrap();
    let columns: Vec<_> = records[0].columns().collect();
    assert_eq!(columns.len(), 24 + 2);
    assert_eq!(records[0].get("goals_against"), Some(Some("30")));
  }

  #[test]
  fn commented_out_table_is_found() {
    let html = format!(
      r#"<html><body><div id="all_stats_defense"><!--
        <div class="table_container"><table><tbody>{}</tbody></table></div>
      --></div></body></html>"#,
      standard_row("Saliba", "fr FRA", "2")
    );
    let records =
      extract(&html, StatCategory::Defensive.schema(), "2024-2025", "Premier-League").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("nation"), Some(Some("FRA")));
  }

  #[test]
  fn missing_container_is_an_error() {
    let html = page("div_stats_keeper", &standard_row("Saka", "ENG", "1"));
    let err =
      extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap_err();
    assert!(matches!(err, ExtractionError::ContainerNotFound));
    assert_eq!(err.to_string(), "container not found");
  }

  #[test]
  fn container_without_body_is_an_error() {
    let html = r#"<div id="div_stats_standard"><p>No data</p></div>"#;
    let err =
      extract(html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap_err();
    assert!(matches!(err, ExtractionError::ContainerNotFound));
  }
}
