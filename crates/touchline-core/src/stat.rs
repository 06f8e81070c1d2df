//! Stat categories and the per-category column schemas of the source tables.
//!
//! Each category maps to one fbref table. A schema lists the table's `td`
//! cells positionally; `None` marks a cell that is present on the page but
//! not kept. Schemas are static and enumerated once.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{Error, Result};

/// Column holding the player's country, reduced to its last token on extract.
pub const NATION_COLUMN: &str = "nation";

// ─── Category ────────────────────────────────────────────────────────────────

/// A statistic grouping exposed by the source site.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatCategory {
  Standard,
  Keeper,
  Defensive,
  Shooting,
  Passing,
  Possession,
}

impl StatCategory {
  /// Parse a category name, case-insensitively.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s.trim()).map_err(|_| Error::UnknownStatCategory(s.to_owned()))
  }

  /// Every category, in declaration order.
  pub fn all() -> impl Iterator<Item = StatCategory> { Self::iter() }

  pub fn schema(self) -> &'static StatCategorySchema {
    match self {
      StatCategory::Standard => &STANDARD,
      StatCategory::Keeper => &KEEPER,
      StatCategory::Defensive => &DEFENSIVE,
      StatCategory::Shooting => &SHOOTING,
      StatCategory::Passing => &PASSING,
      StatCategory::Possession => &POSSESSION,
    }
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// How to locate and read one category's table.
#[derive(Debug)]
pub struct StatCategorySchema {
  pub category:         StatCategory,
  /// `id` of the `div` wrapping the table.
  pub container_id:     &'static str,
  /// Path relative to the source base url, with `{competition_id}`,
  /// `{season}` and `{competition}` placeholders.
  pub address_template: &'static str,
  /// Column identifiers by `td` position.
  pub columns:          &'static [Option<&'static str>],
}

impl StatCategorySchema {
  /// Every schema, in category declaration order.
  pub fn all() -> impl Iterator<Item = &'static StatCategorySchema> {
    StatCategory::all().map(StatCategory::schema)
  }

  /// Substitute the placeholders of the address template.
  pub fn address(&self, season: &str, competition: &str, competition_id: &str) -> String {
    self
      .address_template
      .replace("{competition_id}", competition_id)
      .replace("{season}", season)
      .replace("{competition}", competition)
  }

  /// The named columns in position order, skipping placeholders.
  pub fn named_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.columns.iter().filter_map(|c| *c)
  }
}

// ─── Definitions ─────────────────────────────────────────────────────────────

const IDENTITY: [Option<&str>; 6] = [
  Some("name"),
  Some("nation"),
  Some("position"),
  Some("team"),
  Some("age"),
  Some("year_born"),
];

macro_rules! columns {
  ($($col:expr),* $(,)?) => {
    &[
      IDENTITY[0], IDENTITY[1], IDENTITY[2], IDENTITY[3], IDENTITY[4], IDENTITY[5],
      $($col),*
    ]
  };
}

static STANDARD: StatCategorySchema = StatCategorySchema {
  category:         StatCategory::Standard,
  container_id:     "div_stats_standard",
  address_template: "/en/comps/{competition_id}/{season}/stats/{season}-{competition}-Stats",
  columns:          columns![
    Some("matches"),
    Some("starts"),
    Some("minutes"),
    Some("full_games"),
    Some("goals"),
    Some("assists"),
    Some("G+A"),
    Some("non-PK_goals"),
    Some("PK_goals"),
    Some("PK_att"),
    Some("yellow_cards"),
    Some("red_cards"),
    Some("xG"),
    Some("xG_nonpenalty"),
    Some("xGA"),
    Some("xGnp+xGA"),
    Some("progressive_carries"),
    Some("progressive_passes"),
  ],
};

static KEEPER: StatCategorySchema = StatCategorySchema {
  category:         StatCategory::Keeper,
  container_id:     "all_stats_keeper",
  address_template: "/en/comps/{competition_id}/{season}/keepers/{season}-{competition}-Stats",
  columns:          columns![
    Some("matches"),
    Some("starts"),
    Some("minutes"),
    Some("full_games"),
    Some("goals_against"),
    Some("goals_against_per90"),
    Some("shots_ontarget_against"),
    Some("saves"),
    Some("save_percentage"),
    Some("wins"),
    Some("draws"),
    Some("losses"),
    Some("clean_sheets"),
    Some("clean_sheet_percentage"),
    Some("PK_att_against"),
    Some("PK_conceded"),
    Some("PK_saved"),
    None,
    Some("PK_save_percentage"),
  ],
};

static DEFENSIVE: StatCategorySchema = StatCategorySchema {
  category:         StatCategory::Defensive,
  container_id:     "all_stats_defense",
  address_template: "/en/comps/{competition_id}/{season}/defense/{season}-{competition}-Stats",
  columns:          columns![
    Some("full_games"),
    Some("tackles"),
    Some("tackles_won"),
    Some("def3_tackles"),
    Some("mid3_tackles"),
    Some("att3_tackles"),
    None,
    None,
    Some("tackle_percentage"),
    Some("challenges_lost"),
    Some("blocks"),
    Some("shots_blocked"),
    Some("passes_blocked"),
    Some("interceptions"),
    None,
    Some("clearances"),
    Some("error_shot"),
  ],
};

static SHOOTING: StatCategorySchema = StatCategorySchema {
  category:         StatCategory::Shooting,
  container_id:     "all_stats_shooting",
  address_template: "/en/comps/{competition_id}/{season}/shooting/{season}-{competition}-Stats",
  columns:          columns![
    Some("full_games"),
    Some("goals"),
    Some("shots"),
    Some("shots_on_target"),
    Some("shots_on_target_pct"),
    Some("shots_per90"),
    Some("shots_on_target_per90"),
    Some("goals_per_shot"),
    Some("goals_per_shot_on_target"),
    Some("avg_shot_distance"),
    Some("free_kick_shots"),
    Some("PK_goals"),
    Some("PK_att"),
    Some("xG"),
    Some("xG_nonpenalty"),
    Some("xG_nonpenalty_per_shot"),
    Some("goals_minus_xG"),
    Some("nonpenalty_goals_minus_xG"),
  ],
};

static PASSING: StatCategorySchema = StatCategorySchema {
  category:         StatCategory::Passing,
  container_id:     "all_stats_passing",
  address_template: "/en/comps/{competition_id}/{season}/passing/{season}-{competition}-Stats",
  columns:          columns![
    Some("full_games"),
    Some("passes_completed"),
    Some("passes_attempted"),
    Some("pass_completion_pct"),
    Some("total_pass_distance"),
    Some("progressive_pass_distance"),
    Some("short_completed"),
    Some("short_attempted"),
    Some("short_completion_pct"),
    Some("medium_completed"),
    Some("medium_attempted"),
    Some("medium_completion_pct"),
    Some("long_completed"),
    Some("long_attempted"),
    Some("long_completion_pct"),
    Some("assists"),
    Some("xAG"),
    Some("xA"),
    Some("assists_minus_xAG"),
    Some("key_passes"),
    Some("final_third_passes"),
    Some("penalty_area_passes"),
    Some("penalty_area_crosses"),
    Some("progressive_passes"),
  ],
};

static POSSESSION: StatCategorySchema = StatCategorySchema {
  category:         StatCategory::Possession,
  container_id:     "all_stats_possession",
  address_template: "/en/comps/{competition_id}/{season}/possession/{season}-{competition}-Stats",
  columns:          columns![
    Some("full_games"),
    Some("touches"),
    Some("def_pen_touches"),
    Some("def3_touches"),
    Some("mid3_touches"),
    Some("att3_touches"),
    Some("att_pen_touches"),
    Some("live_touches"),
    Some("take_ons_attempted"),
    Some("take_ons_succeeded"),
    Some("take_on_success_pct"),
    Some("take_ons_tackled"),
    Some("take_on_tackled_pct"),
    Some("carries"),
    Some("carry_distance"),
    Some("progressive_carry_distance"),
    Some("progressive_carries"),
    Some("final_third_carries"),
    Some("penalty_area_carries"),
    Some("miscontrols"),
    Some("dispossessed"),
    Some("passes_received"),
    Some("progressive_passes_received"),
  ],
};
