use tracing::debug;

use crate::catalog::Catalog;
use crate::llm::{ChatModel, Conversation};
use crate::reply::parse_field;
use crate::StageError;

pub const MATCHED_TABLES_KEY: &str = "matched_tables";

/// How the model signals that nothing qualifies. The invented name is not in
/// the catalog, so the pipeline reports it through `table_not_found`.
pub const NOT_FOUND_RULE: &str = "If no table qualifies, return exactly one snake_case name \
for the thing the user asked about (for example \"shipping_costs\"); it will be reported as not found.";

/// Grounding directive for the matching stage.
pub fn directive(tables: &[&str]) -> String {
    format!(
        r#"You are a SQL assistant.
The database contains exactly these tables: {}
Your only task is to pick the tables needed to answer the user's question.
Rules:
- Use only tables from the list above, spelled as listed.
- A table qualifies only if it is at least 95% similar in meaning to what the user asks about.
  "parking" or "parking data" matches a parking_data table; "billing" matches nothing unless a billing table is listed.
- Do not guess table names and never fall back to a table just because it exists.
- {}
Respond only with JSON: {{"matched_tables": ["..."]}}"#,
        tables.join(", "),
        NOT_FOUND_RULE
    )
}

/// What the model claimed, split against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMatch {
    /// Names exactly as the model returned them.
    pub claimed: Vec<String>,
    /// Claimed names found in the catalog, in catalog spelling, without repeats.
    pub matched: Vec<String>,
    /// Claimed names with no catalog table.
    pub unknown: Vec<String>,
}

impl TableMatch {
    pub fn resolve(claimed: Vec<String>, catalog: &Catalog) -> Self {
        let mut matched: Vec<String> = Vec::new();
        let mut unknown = Vec::new();
        for name in &claimed {
            match catalog.canonical_name(name) {
                Some(canonical) => {
                    if !matched.iter().any(|m| m == canonical) {
                        matched.push(canonical.to_string());
                    }
                }
                None => unknown.push(name.clone()),
            }
        }
        Self {
            claimed,
            matched,
            unknown,
        }
    }
}

pub struct TableMatcher<'a> {
    model: &'a dyn ChatModel,
    catalog: &'a Catalog,
}

impl<'a> TableMatcher<'a> {
    pub fn new(model: &'a dyn ChatModel, catalog: &'a Catalog) -> Self {
        Self { model, catalog }
    }

    pub fn conversation(&self, question: &str) -> Conversation {
        Conversation::new()
            .system(directive(&self.catalog.table_names()))
            .user(question)
    }

    /// One model call; a reply that is not `{"matched_tables": [...]}` fails.
    pub async fn run(&self, question: &str) -> Result<TableMatch, StageError> {
        let request = self.conversation(question).json_request();
        let response = self.model.complete(&request).await?;
        debug!(reply = %response.content, "table matcher reply");
        let claimed: Vec<String> = parse_field(&response.content, MATCHED_TABLES_KEY)?;
        Ok(TableMatch::resolve(claimed, self.catalog))
    }
}
