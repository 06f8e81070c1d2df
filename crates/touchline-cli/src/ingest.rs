//! Bulk ingestion of stat tables into the statistics database.

use std::time::Duration;

use anyhow::{Context, Result};
use touchline_core::{competition::CompetitionDirectory, stat::StatCategory, store::StatSource};
use touchline_store_sqlite::{StatsDb, ingest_table_name};

/// What to ingest: every season × competition × category combination.
#[derive(Debug, Clone)]
pub struct IngestPlan {
  pub seasons:      Vec<String>,
  pub competitions: Vec<String>,
  pub categories:   Vec<StatCategory>,
  /// Pause between two source requests.
  pub delay:        Duration,
}

/// Outcome of one ingestion run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
  /// Tables created, with their row counts.
  pub stored:  Vec<(String, usize)>,
  /// Tables that already existed.
  pub skipped: Vec<String>,
  /// Fetches that returned no rows.
  pub empty:   Vec<String>,
  /// Tables that failed to fetch or store.
  pub failed:  Vec<String>,
}

/// Map every requested competition to its canonical directory name, failing
/// on the first unknown one.
fn resolve_competitions(directory: &CompetitionDirectory, names: &[String]) -> Result<Vec<String>> {
  names
    .iter()
    .map(|name| {
      directory
        .resolve(name)
        .map(|c| c.name.clone())
        .with_context(|| format!("unknown competition {name:?}"))
    })
    .collect()
}

/// Fetch and store every table of `plan` that `db` does not have yet.
///
/// Competitions are resolved against `directory` before anything is fetched.
/// A failing table is logged and counted; only unknown competitions and
/// errors from the database lookup itself abort the run.
pub async fn ingest<S: StatSource>(
  source: &S,
  directory: &CompetitionDirectory,
  db: &StatsDb,
  plan: &IngestPlan,
) -> Result<IngestReport> {
  let competitions = resolve_competitions(directory, &plan.competitions)?;
  let mut report = IngestReport::default();
  let mut requested = false;

  for season in &plan.seasons {
    for competition in &competitions {
      for &category in &plan.categories {
        let table = ingest_table_name(category, competition, season);

        if db
          .table_exists(&table)
          .await
          .with_context(|| format!("checking for table {table}"))?
        {
          tracing::info!(table = %table, "skipping, table already exists");
          report.skipped.push(table);
          continue;
        }

        if requested && !plan.delay.is_zero() {
          tokio::time::sleep(plan.delay).await;
        }
        requested = true;

        tracing::info!(%season, %competition, %category, "scraping");
        let records = match source.fetch(category, season, competition).await {
          Ok(records) => records,
          Err(e) => {
            tracing::error!(table = %table, error = %e, "failed to scrape");
            report.failed.push(table);
            continue;
          }
        };

        if records.is_empty() {
          tracing::warn!(table = %table, "no data returned");
          report.empty.push(table);
          continue;
        }

        match db.create_table(&table, &records).await {
          Ok(rows) => report.stored.push((table, rows)),
          Err(e) => {
            tracing::error!(table = %table, error = %e, "failed to store");
            report.failed.push(table);
          }
        }
      }
    }
  }

  Ok(report)
}

#[cfg(test)]
mod tests {
  use std::{io, sync::Mutex};

  use touchline_core::record::StatRecord;

  use super::*;

  /// Two-row tables for Premier League, nothing for Serie A keepers, and a
  /// failure for La Liga.
  #[derive(Default)]
  struct FakeSource {
    calls: Mutex<Vec<String>>,
  }

  impl StatSource for FakeSource {
    type Error = io::Error;

    async fn fetch(
      &self,
      category: StatCategory,
      season: &str,
      competition: &str,
    ) -> Result<Vec<StatRecord>, io::Error> {
      self
        .calls
        .lock()
        .unwrap()
        .push(format!("{category} {competition} {season}"));
      match (competition, category) {
        ("La-Liga", _) => Err(io::Error::other("challenge page")),
        ("Serie-A", StatCategory::Keeper) => Ok(Vec::new()),
        _ => Ok(
          ["Mohamed Salah", "Erling Haaland"]
            .into_iter()
            .map(|name| {
              let mut r = StatRecord::new(season, competition);
              r.push("player", Some(name.to_owned()));
              r.push("goals", Some("20".to_owned()));
              r
            })
            .collect(),
        ),
      }
    }
  }

  fn plan(competitions: &[&str], categories: &[StatCategory]) -> IngestPlan {
    IngestPlan {
      seasons:      vec!["2024-2025".to_owned()],
      competitions: competitions.iter().map(|c| (*c).to_owned()).collect(),
      categories:   categories.to_vec(),
      delay:        Duration::ZERO,
    }
  }

  #[tokio::test]
  async fn stores_skips_and_counts_failures() {
    let db = StatsDb::open_in_memory().await.unwrap();
    let source = FakeSource::default();
    let report = ingest(
      &source,
      &CompetitionDirectory::default(),
      &db,
      &plan(&["Premier League", "Serie-A", "La-Liga"], &[StatCategory::Standard, StatCategory::Keeper]),
    )
    .await
    .unwrap();

    assert_eq!(report.stored, [
      ("standard_Premier_League_2024_2025".to_owned(), 2),
      ("keeper_Premier_League_2024_2025".to_owned(), 2),
      ("standard_Serie_A_2024_2025".to_owned(), 2),
    ]);
    assert_eq!(report.empty, ["keeper_Serie_A_2024_2025"]);
    assert_eq!(report.failed, ["standard_La_Liga_2024_2025", "keeper_La_Liga_2024_2025"]);
    assert!(report.skipped.is_empty());

    assert!(db.table_exists("standard_Serie_A_2024_2025").await.unwrap());
    assert!(!db.table_exists("keeper_Serie_A_2024_2025").await.unwrap());
  }

  #[tokio::test]
  async fn existing_tables_are_not_fetched_again() {
    let db = StatsDb::open_in_memory().await.unwrap();
    let source = FakeSource::default();
    let plan = plan(&["Premier-League"], &[StatCategory::Standard]);

    ingest(&source, &CompetitionDirectory::default(), &db, &plan).await.unwrap();
    let second = ingest(&source, &CompetitionDirectory::default(), &db, &plan).await.unwrap();

    assert_eq!(second.skipped, ["standard_Premier_League_2024_2025"]);
    assert!(second.stored.is_empty());
    assert_eq!(source.calls.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn competition_names_are_normalised_before_fetching() {
    let db = StatsDb::open_in_memory().await.unwrap();
    let source = FakeSource::default();
    ingest(
      &source,
      &CompetitionDirectory::default(),
      &db,
      &plan(&["premier league"], &[StatCategory::Shooting]),
    )
    .await
    .unwrap();
    assert_eq!(*source.calls.lock().unwrap(), ["shooting Premier-League 2024-2025"]);
    assert!(db.table_exists("shooting_Premier_League_2024_2025").await.unwrap());
  }

  #[tokio::test]
  async fn differently_cased_names_hit_the_existing_table() {
    let db = StatsDb::open_in_memory().await.unwrap();
    let source = FakeSource::default();
    let directory = CompetitionDirectory::default();

    ingest(&source, &directory, &db, &plan(&["Premier-League"], &[StatCategory::Standard]))
      .await
      .unwrap();
    let second = ingest(&source, &directory, &db, &plan(&["premier league"], &[StatCategory::Standard]))
      .await
      .unwrap();

    assert_eq!(second, IngestReport {
      skipped: vec!["standard_Premier_League_2024_2025".to_owned()],
      ..Default::default()
    });
    assert_eq!(source.calls.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn unknown_competitions_abort_before_fetching() {
    let db = StatsDb::open_in_memory().await.unwrap();
    let source = FakeSource::default();
    let err = ingest(
      &source,
      &CompetitionDirectory::default(),
      &db,
      &plan(&["Premier-League", "Sunday League"], &[StatCategory::Standard]),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("Sunday League"), "{err}");
    assert!(source.calls.lock().unwrap().is_empty());
  }
}
