use askdb_protocol::ColumnInfo;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::llm::{ChatModel, Conversation};
use crate::reply::parse_field;
use crate::StageError;

pub const QUERY_KEY: &str = "query";

pub const DIRECTIVE: &str = r#"You are a SQL assistant writing one SQL Server query.
Generate exactly one SELECT statement that answers the question in the context message.
Rules:
- Use TOP N to limit rows; never use LIMIT.
- Use only the tables and columns listed in the context schemas.
- When the question names a column that does not exist, use the closest real column
  (for example `name` when there is no `product_name`).
- Always match the real schema.
Respond only with JSON: {"query": "..."}"#;

/// Matched tables and their columns, in match order.
pub type Schemas = Vec<(String, Vec<ColumnInfo>)>;

pub struct QueryPlanner<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    /// The grounding context: question, matched tables and their schemas.
    pub fn context(question: &str, schemas: &Schemas) -> Value {
        let tables: Vec<&str> = schemas.iter().map(|(t, _)| t.as_str()).collect();
        let mut by_table = Map::new();
        for (table, columns) in schemas {
            by_table.insert(table.clone(), json!(columns));
        }
        json!({
            "question": question,
            "matched_tables": tables,
            "schemas": by_table,
        })
    }

    pub fn conversation(question: &str, schemas: &Schemas) -> Conversation {
        Conversation::new()
            .system(DIRECTIVE)
            .user(Self::context(question, schemas).to_string())
    }

    /// One model call; a reply that is not `{"query": "..."}` fails.
    pub async fn run(&self, question: &str, schemas: &Schemas) -> Result<String, StageError> {
        let request = Self::conversation(question, schemas).json_request();
        let response = self.model.complete(&request).await?;
        debug!(reply = %response.content, "query planner reply");
        let query: String = parse_field(&response.content, QUERY_KEY)?;
        Ok(query)
    }
}
