#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use askdb_agent::llm::{CompletionRequest, CompletionResponse, FinishReason, Usage};
use askdb_agent::matcher::NOT_FOUND_RULE;
use askdb_agent::{ChatModel, LlmError};
use askdb_protocol::{ToolCall, ToolSpec, ToolTransport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

pub struct StoreDb {
    _dir: TempDir,
    pub path: PathBuf,
}

/// orders(id, total) with six rows and customers(id, name) with two.
pub fn store_db() -> anyhow::Result<StoreDb> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store.db");
    let conn = rusqlite::Connection::open(&path)?;
    conn.execute_batch(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL NOT NULL);
         CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO orders (id, total) VALUES
             (1, 10.0), (2, 250.5), (3, 99.9), (4, 5.0), (5, 180.0), (6, 42.0);
         INSERT INTO customers (id, name) VALUES (1, 'Ada'), (2, 'Grace');",
    )?;
    Ok(StoreDb { _dir: dir, path })
}

/// Replies with queued strings in order and records every request.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::default();
        for reply in replies {
            model.push(reply);
        }
        model
    }

    pub fn push(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(CompletionResponse {
                content,
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
                model: "scripted".to_string(),
            }),
            Some(Err(reason)) => Err(LlmError::Api(reason)),
            None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}

/// Answers the matching stage by reading its directive: listed tables named in
/// the question are matched, and when none is, the directive's not-found rule
/// is obeyed if present (the last two words of the question in snake_case),
/// otherwise the reply is an empty list.
#[derive(Clone, Default)]
pub struct DirectiveFollowingModel {
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl DirectiveFollowingModel {
    fn reply(system: &str, question: &str) -> String {
        let listed = system
            .lines()
            .find_map(|l| l.strip_prefix("The database contains exactly these tables: "))
            .unwrap_or_default();
        let question = question.to_lowercase();
        let mut matched: Vec<String> = listed
            .split(", ")
            .filter(|t| !t.is_empty() && question.contains(&t.to_lowercase()))
            .map(str::to_string)
            .collect();
        if matched.is_empty() && system.contains(NOT_FOUND_RULE) {
            let words: Vec<&str> = question.split_whitespace().collect();
            matched.push(words[words.len().saturating_sub(2)..].join("_"));
        }
        serde_json::json!({ "matched_tables": matched }).to_string()
    }
}

#[async_trait]
impl ChatModel for DirectiveFollowingModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let system = &request.messages[0].content;
        if !system.contains("matched_tables") {
            return Err(LlmError::InvalidResponse("only the matching stage is scripted".into()));
        }
        Ok(CompletionResponse {
            content: Self::reply(system, &request.messages[1].content),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            model: "directive-following".to_string(),
        })
    }
}

/// Wraps a transport and records the name of every tool called.
pub struct RecordingTransport<T> {
    inner: T,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl<T> RecordingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl<T: ToolTransport> ToolTransport for RecordingTransport<T> {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, TransportError> {
        self.inner.list_tools().await
    }

    async fn call(&self, call: &ToolCall) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(call.name.clone());
        self.inner.call(call).await
    }
}

pub fn count(calls: &Arc<Mutex<Vec<String>>>, tool: &str) -> usize {
    calls.lock().unwrap().iter().filter(|c| *c == tool).count()
}
