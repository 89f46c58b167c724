//! Per-question orchestration.
//!
//! ```text
//! Idle -> MatchingTables -> { TableNotFound | AwaitingValidMatch }
//!      -> FetchingSchemas -> PlanningQuery -> ValidatingQuery
//!      -> { Rejected | Executing } -> Done
//! ```
//!
//! Every question starts from `Idle` with fresh conversations; only the
//! [`Catalog`] outlives it. Any stage can halt the question; the session
//! carries on.

use std::fmt;

use askdb_protocol::{Row, TransportError};
use askdb_sql::{validate_query, SchemaScope, ValidationOutcome};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::client::{ClientError, ToolClient};
use crate::llm::ChatModel;
use crate::matcher::TableMatcher;
use crate::planner::{QueryPlanner, Schemas};
use crate::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MatchingTables,
    AwaitingValidMatch,
    FetchingSchemas,
    PlanningQuery,
    ValidatingQuery,
    Executing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::MatchingTables => "matching tables",
            Stage::AwaitingValidMatch => "checking matched tables",
            Stage::FetchingSchemas => "fetching schemas",
            Stage::PlanningQuery => "planning query",
            Stage::ValidatingQuery => "validating query",
            Stage::Executing => "executing query",
        };
        f.write_str(s)
    }
}

/// Why a question stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model named tables that do not exist; `table_not_found` was
    /// called for each and these are its messages.
    TableNotFound(Vec<String>),
    NoTablesMatched,
    EmptySchemas,
    ParseFailed { stage: Stage, reason: String },
    ModelFailed { stage: Stage, reason: String },
    ToolFailed { stage: Stage, reason: String },
    Rejected(ValidationOutcome),
    ExecutionFailed(String),
    Done(Vec<Row>),
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::TableNotFound(messages) => f.write_str(&messages.join("\n")),
            Outcome::NoTablesMatched => f.write_str("No matched tables found. Cannot generate SQL."),
            Outcome::EmptySchemas => {
                f.write_str("No schemas fetched or schemas are empty, aborting.")
            }
            Outcome::ParseFailed { stage, reason } => {
                write!(f, "Could not parse model reply while {stage}: {reason}")
            }
            Outcome::ModelFailed { stage, reason } => {
                write!(f, "Model call failed while {stage}: {reason}")
            }
            Outcome::ToolFailed { stage, reason } => {
                write!(f, "Tool call failed while {stage}: {reason}")
            }
            Outcome::Rejected(validation) => write!(f, "Generated SQL rejected: {validation}"),
            Outcome::ExecutionFailed(reason) => write!(f, "Query execution failed: {reason}"),
            Outcome::Done(rows) => write!(f, "{} row(s)", rows.len()),
        }
    }
}

/// Everything that happened to one question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionReport {
    pub question: String,
    pub stages: Vec<Stage>,
    pub matched_tables: Vec<String>,
    pub schemas: Schemas,
    pub query: Option<String>,
    pub outcome: Outcome,
}

impl QuestionReport {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            stages: Vec::new(),
            matched_tables: Vec::new(),
            schemas: Vec::new(),
            query: None,
            outcome: Outcome::NoTablesMatched,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(%stage, "pipeline stage");
        self.stages.push(stage);
    }

    fn finish(mut self, outcome: Outcome) -> Self {
        match &outcome {
            Outcome::Done(rows) => info!(rows = rows.len(), "question answered"),
            other => warn!(outcome = %other, "question halted"),
        }
        self.outcome = outcome;
        self
    }
}

/// A question-answering session over one tool server and one model.
pub struct Pipeline {
    client: ToolClient,
    model: Box<dyn ChatModel>,
    catalog: Catalog,
}

impl Pipeline {
    /// Load the catalog and get ready for questions.
    pub async fn start(client: ToolClient, model: Box<dyn ChatModel>) -> Result<Self, ClientError> {
        let catalog = Catalog::load(&client).await?;
        Ok(Self {
            client,
            model,
            catalog,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn ask(&self, question: &str) -> QuestionReport {
        let mut report = QuestionReport::new(question);
        let model = self.model.as_ref();

        report.enter(Stage::MatchingTables);
        let table_match = match TableMatcher::new(model, &self.catalog).run(question).await {
            Ok(m) => m,
            Err(e) => return report.finish(stage_failure(Stage::MatchingTables, e)),
        };

        if !table_match.unknown.is_empty() {
            let mut messages = Vec::with_capacity(table_match.unknown.len());
            for name in &table_match.unknown {
                match self.client.table_not_found(name).await {
                    Ok(message) => messages.push(message),
                    Err(e) => {
                        return report.finish(Outcome::ToolFailed {
                            stage: Stage::MatchingTables,
                            reason: e.to_string(),
                        })
                    }
                }
            }
            return report.finish(Outcome::TableNotFound(messages));
        }

        report.enter(Stage::AwaitingValidMatch);
        if table_match.matched.is_empty() {
            return report.finish(Outcome::NoTablesMatched);
        }
        report.matched_tables = table_match.matched;

        report.enter(Stage::FetchingSchemas);
        report.schemas = report
            .matched_tables
            .iter()
            .map(|t| {
                let columns = self
                    .catalog
                    .get(t)
                    .map(|e| e.columns.clone())
                    .unwrap_or_default();
                (t.clone(), columns)
            })
            .collect();
        if report.schemas.iter().all(|(_, columns)| columns.is_empty()) {
            return report.finish(Outcome::EmptySchemas);
        }

        report.enter(Stage::PlanningQuery);
        let query = match QueryPlanner::new(model).run(question, &report.schemas).await {
            Ok(q) => q,
            Err(e) => return report.finish(stage_failure(Stage::PlanningQuery, e)),
        };
        report.query = Some(query.clone());

        report.enter(Stage::ValidatingQuery);
        let mut scope = SchemaScope::new();
        for (table, columns) in &report.schemas {
            scope.add_table(table, columns.iter().map(|c| c.column.as_str()));
        }
        let validation = validate_query(&query, &scope);
        if !validation.is_accepted() {
            return report.finish(Outcome::Rejected(validation));
        }

        report.enter(Stage::Executing);
        match self.client.run_sql(&query).await {
            Ok(rows) => report.finish(Outcome::Done(rows)),
            Err(ClientError::Transport(TransportError::Tool { message, .. })) => {
                report.finish(Outcome::ExecutionFailed(message))
            }
            Err(e) => report.finish(Outcome::ToolFailed {
                stage: Stage::Executing,
                reason: e.to_string(),
            }),
        }
    }

    pub fn close(self) {
        self.client.close();
    }
}

fn stage_failure(stage: Stage, error: StageError) -> Outcome {
    match error {
        StageError::Parse(e) => Outcome::ParseFailed {
            stage,
            reason: e.to_string(),
        },
        StageError::Model(e) => Outcome::ModelFailed {
            stage,
            reason: e.to_string(),
        },
    }
}
