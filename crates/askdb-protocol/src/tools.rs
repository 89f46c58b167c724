//! Tool names, calls and tagged results.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::ProtocolError;

/// One result row: column name -> value, in result-set column order.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ListTables,
    ListColumns,
    RunSql,
    TableNotFound,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::ListTables,
        ToolName::ListColumns,
        ToolName::RunSql,
        ToolName::TableNotFound,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ListTables => "list_tables",
            ToolName::ListColumns => "list_columns",
            ToolName::RunSql => "run_sql",
            ToolName::TableNotFound => "table_not_found",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to invoke one named operation.
///
/// `name` stays a plain string so a server can report unknown tools instead of
/// failing to decode the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: ToolName) -> Self {
        Self {
            name: tool.as_str().to_string(),
            arguments: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.to_string(), value.into());
        self
    }

    pub fn list_tables() -> Self {
        Self::new(ToolName::ListTables)
    }

    pub fn list_columns(table: &str) -> Self {
        Self::new(ToolName::ListColumns).with_arg("table", table)
    }

    pub fn run_sql(query: &str) -> Self {
        Self::new(ToolName::RunSql).with_arg("query", query)
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::new(ToolName::TableNotFound).with_arg("table", table)
    }

    pub fn tool(&self) -> Option<ToolName> {
        ToolName::parse(&self.name)
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Tagged result of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool_result", content = "output", rename_all = "snake_case")]
pub enum ToolOutput {
    ListTables(Vec<TableRef>),
    ListColumns(Vec<ColumnInfo>),
    RunSql(Vec<Row>),
    TableNotFound(String),
}

impl ToolOutput {
    pub fn tool(&self) -> ToolName {
        match self {
            ToolOutput::ListTables(_) => ToolName::ListTables,
            ToolOutput::ListColumns(_) => ToolName::ListColumns,
            ToolOutput::RunSql(_) => ToolName::RunSql,
            ToolOutput::TableNotFound(_) => ToolName::TableNotFound,
        }
    }

    pub fn into_tables(self) -> Result<Vec<TableRef>, ProtocolError> {
        match self {
            ToolOutput::ListTables(tables) => Ok(tables),
            other => Err(other.mismatch(ToolName::ListTables)),
        }
    }

    pub fn into_columns(self) -> Result<Vec<ColumnInfo>, ProtocolError> {
        match self {
            ToolOutput::ListColumns(columns) => Ok(columns),
            other => Err(other.mismatch(ToolName::ListColumns)),
        }
    }

    pub fn into_rows(self) -> Result<Vec<Row>, ProtocolError> {
        match self {
            ToolOutput::RunSql(rows) => Ok(rows),
            other => Err(other.mismatch(ToolName::RunSql)),
        }
    }

    pub fn into_message(self) -> Result<String, ProtocolError> {
        match self {
            ToolOutput::TableNotFound(message) => Ok(message),
            other => Err(other.mismatch(ToolName::TableNotFound)),
        }
    }

    fn mismatch(&self, expected: ToolName) -> ProtocolError {
        ProtocolError::UnexpectedResult {
            expected,
            found: self.tool(),
        }
    }
}

pub fn table_not_found_message(table: &str) -> String {
    format!("Error: Table '{table}' not found in the database.")
}

/// Advertised description of one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub args_schema: Value,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    fn string_arg(key: &str, description: &str) -> Value {
        json!({
            "type": "object",
            "properties": { key: { "type": "string", "description": description } },
            "required": [key],
        })
    }

    vec![
        ToolSpec {
            name: ToolName::ListTables.to_string(),
            description: "List the base tables available in the database.".to_string(),
            args_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: ToolName::ListColumns.to_string(),
            description: "List the columns (name and data type) of one table.".to_string(),
            args_schema: string_arg("table", "Table name"),
        },
        ToolSpec {
            name: ToolName::RunSql.to_string(),
            description: "Run a single read-only SELECT query and return its rows.".to_string(),
            args_schema: string_arg("query", "A SELECT statement"),
        },
        ToolSpec {
            name: ToolName::TableNotFound.to_string(),
            description: "Report that no table matching the user's request exists.".to_string(),
            args_schema: string_arg("table", "The table that was looked for"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_output_uses_adjacent_tags() {
        let output = ToolOutput::ListTables(vec![TableRef {
            schema: "main".to_string(),
            table: "orders".to_string(),
        }]);
        let v = serde_json::to_value(&output).unwrap();
        assert_eq!(
            v,
            json!({"tool_result": "list_tables", "output": [{"schema": "main", "table": "orders"}]})
        );
    }

    #[test]
    fn columns_serialize_type_key() {
        let v = serde_json::to_value(ToolOutput::ListColumns(vec![ColumnInfo {
            column: "total".to_string(),
            data_type: "decimal".to_string(),
        }]))
        .unwrap();
        assert_eq!(v["output"][0]["type"], "decimal");
    }

    #[test]
    fn mismatched_result_is_reported() {
        let err = ToolOutput::TableNotFound("x".to_string())
            .into_rows()
            .unwrap_err();
        assert!(err.to_string().contains("run_sql"));
        assert!(err.to_string().contains("table_not_found"));
    }

    #[test]
    fn every_tool_is_advertised() {
        let specs = tool_specs();
        for tool in ToolName::ALL {
            assert!(specs.iter().any(|s| s.name == tool.as_str()), "{tool}");
        }
    }

    #[test]
    fn call_builders_set_arguments() {
        let call = ToolCall::run_sql("SELECT 1");
        assert_eq!(call.tool(), Some(ToolName::RunSql));
        assert_eq!(call.str_arg("query"), Some("SELECT 1"));
        assert_eq!(ToolCall::list_tables().arguments.len(), 0);
    }
}
