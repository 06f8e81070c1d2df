//! Competition directory: display names to source competition ids.

use serde::Serialize;

/// A competition known to the source site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Competition {
  /// Canonical name with words joined by dashes, as used in source urls.
  pub name: String,
  pub id:   String,
}

/// Immutable lookup from competition name to [`Competition`].
#[derive(Debug, Clone)]
pub struct CompetitionDirectory {
  entries: Vec<Competition>,
}

const DEFAULT_COMPETITIONS: &[(&str, &str)] = &[
  ("Premier-League", "9"),
  ("La-Liga", "12"),
  ("Serie-A", "11"),
  ("Bundesliga", "20"),
  ("Ligue-1", "13"),
  ("Eredivisie", "23"),
  ("Primeira-Liga", "32"),
  ("Championship", "10"),
  ("Major-League-Soccer", "22"),
];

/// Replace runs of whitespace with a single dash: `"Serie A"` → `"Serie-A"`.
pub fn normalize_name(name: &str) -> String {
  name.split_whitespace().collect::<Vec<_>>().join("-")
}

impl CompetitionDirectory {
  pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
    let entries = entries
      .into_iter()
      .map(|(name, id)| Competition { name: normalize_name(&name), id })
      .collect();
    Self { entries }
  }

  /// Look up a competition by display name. Spaces and dashes are
  /// interchangeable and case is ignored.
  pub fn resolve(&self, name: &str) -> Option<&Competition> {
    let wanted = normalize_name(name);
    self
      .entries
      .iter()
      .find(|c| c.name.eq_ignore_ascii_case(&wanted))
  }

  pub fn iter(&self) -> impl Iterator<Item = &Competition> { self.entries.iter() }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Default for CompetitionDirectory {
  fn default() -> Self {
    Self::new(
      DEFAULT_COMPETITIONS
        .iter()
        .map(|(name, id)| ((*name).to_owned(), (*id).to_owned())),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn spaces_become_dashes() {
    assert_eq!(normalize_name("Premier League"), "Premier-League");
    assert_eq!(normalize_name("  Major League   Soccer "), "Major-League-Soccer");
    assert_eq!(normalize_name("Ligue-1"), "Ligue-1");
  }

  #[test]
  fn resolve_accepts_display_names() {
    let dir = CompetitionDirectory::default();
    let c = dir.resolve("premier league").unwrap();
    assert_eq!(c.name, "Premier-League");
    assert_eq!(c.id, "9");
    assert_eq!(dir.resolve("Serie-A").unwrap().id, "11");
  }

  #[test]
  fn resolve_unknown_is_none() {
    let dir = CompetitionDirectory::default();
    assert!(dir.resolve("Sunday League").is_none());
    assert!(dir.resolve("").is_none());
  }
}
