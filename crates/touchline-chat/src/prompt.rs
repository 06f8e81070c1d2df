//! [`PromptConfig`]: the decision instruction and the answer template.
//!
//! Both are fixed when the server starts: the stat categories, the
//! competitions, the current season and the statistics database schema are
//! rendered once and reused for every exchange.

use touchline_core::{competition::CompetitionDirectory, stat::StatCategory};

/// Immutable prompt parameters shared by every exchange.
#[derive(Debug, Clone)]
pub struct PromptConfig {
  current_season: String,
  decision:       String,
}

impl PromptConfig {
  /// `schema` is the statistics database description; `None` when no
  /// database is configured, in which case the SQL rules are left out.
  pub fn new(
    current_season: impl Into<String>,
    directory:      &CompetitionDirectory,
    schema:         Option<&str>,
  ) -> Self {
    let current_season = current_season.into();
    let decision = render_decision(&current_season, directory, schema);
    Self { current_season, decision }
  }

  pub fn current_season(&self) -> &str { &self.current_season }

  pub fn decision_instruction(&self) -> &str { &self.decision }

  /// Fill the answer template. `history` is already flattened to
  /// `role: content` lines.
  pub fn answer_prompt(&self, history: &str, context: &str, question: &str) -> String {
    let current_season = &self.current_season;
    format!(
      r#"
You are a helpful AI assistant who is knowledgeable about professional soccer. Your goal is to provide clear, well-structured, and insightful answers using Markdown.

**Response Formatting Instructions:**
- Use Markdown for all your responses to ensure readability.
- Use headings (e.g., `#`, `##`) to structure longer answers.
- Use bold text (`**text**`) to highlight key statistics, player names, or important terms.
- Use bullet points (`*`) or numbered lists (`1.`) for lists of information. **Do not use tables.**
- Synthesize information from the context into a readable, narrative response using paragraphs and bullet points.
- Always keep an empty line between paragraphs.
- Always put a blank line before starting a list.

**Content Instructions:**
- Answer the user's question based on the provided context, which is a JSON array of player statistics or a short explanation.
- The current season is {current_season}.
- You are allowed to give subjective opinions, but they must be directly supported by the statistics in the context.
- If you cannot formulate an accurate answer from the context, politely say that you need more information or that the data isn't available.
- Do not repeat information you have already mentioned.
- **Do not output raw JSON data.** Instead, present the information in a user-friendly way.

Chat History:
{history}

Context:
{context}

Question:
{question}

Answer:
"#
    )
  }
}

fn render_decision(
  current_season: &str,
  directory:      &CompetitionDirectory,
  schema:         Option<&str>,
) -> String {
  let categories = StatCategory::all()
    .map(|c| c.to_string())
    .collect::<Vec<_>>()
    .join(", ");
  let competitions = directory
    .iter()
    .map(|c| c.name.as_str())
    .collect::<Vec<_>>()
    .join(", ");

  let mut out = format!(
    r#"You are a soccer data assistant. Decide whether the user's question needs player statistics and, if it does, request them with a single tool call.

**Stat categories:** {categories}.
**Competitions:** {competitions}. Write competition names with spaces replaced by dashes (e.g. "Premier-League").
**Seasons** are written YYYY-YYYY. The current season is {current_season}; use it when the question does not name a season.

Behavior Rules:
1. If the question needs statistics, do not answer it yourself. Your only output should be the tool call.
2. Use scrape_stats with {{"stat_category": ..., "season": ..., "competition": ...}} to fetch a fresh stat table.
3. If a question is about player ratings or subjective opinions, request the stats that best support an answer.
4. If the question does not need statistics, answer briefly and directly.
5. If no relevant data exists, respond with a polite message indicating that the data is unavailable.
"#
  );

  if let Some(schema) = schema {
    out.push_str(&format!(
      r#"
**Database Schema:**
Previously ingested stat tables, as JSON (table → column → type):
```json
{schema}
```

SQL Rules:
- Prefer run_sql when the schema already holds the data; fall back to scrape_stats otherwise.
- For run_sql, always call as: {{"sql_query": "SELECT ...;"}}. Never pass an empty arguments object.
- Only SELECT statements are allowed.
- Prefer UNION ALL across tables if the question spans multiple leagues or seasons.
- Only select necessary columns.
- Always use ORDER BY and LIMIT for ranking-type queries (e.g., "most goals").
"#
    ));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(schema: Option<&str>) -> PromptConfig {
    PromptConfig::new("2024-2025", &CompetitionDirectory::default(), schema)
  }

  #[test]
  fn decision_names_categories_competitions_and_season() {
    let c = config(None);
    let text = c.decision_instruction();
    assert!(text.contains("standard, keeper, defensive, shooting, passing, possession"));
    assert!(text.contains("Premier-League, La-Liga"));
    assert!(text.contains("The current season is 2024-2025"));
    assert!(text.contains("spaces replaced by dashes"));
    assert!(!text.contains("run_sql"));
  }

  #[test]
  fn schema_adds_sql_rules() {
    let c = config(Some(r#"{"standard_Premier_League_2024_2025": {"name": "TEXT"}}"#));
    let text = c.decision_instruction();
    assert!(text.contains("standard_Premier_League_2024_2025"));
    assert!(text.contains(r#"{"sql_query": "SELECT ...;"}"#));
  }

  #[test]
  fn answer_prompt_places_every_section() {
    let c = config(None);
    let prompt = c.answer_prompt("user: hi\nassistant: hello", "[{\"name\":\"Saka\"}]", "Who?");
    assert!(prompt.contains("Chat History:\nuser: hi\nassistant: hello\n\nContext:\n[{\"name\":\"Saka\"}]"));
    assert!(prompt.contains("Question:\nWho?\n\nAnswer:"));
    assert!(prompt.contains("The current season is 2024-2025."));
    assert!(prompt.contains("**Do not use tables.**"));
  }

  #[test]
  fn braces_in_inputs_are_left_alone() {
    let c = config(None);
    let prompt = c.answer_prompt("", "{question}", "real question");
    assert!(prompt.contains("Context:\n{question}\n"));
    assert!(prompt.contains("Question:\nreal question\n"));
  }
}
