//! End-to-end tests across crates:
//! - tool server over HTTP, backed by a temporary SQLite file
//! - tool client + pipeline talking to it over HTTP
//! - a real provider client talking to a local fake chat-completions service
//!
//! Run with: cargo test --test integration_tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use askdb_agent::{
    HttpTransport, LlmConfig, Outcome, Pipeline, Provider, Stage, ToolClient, UnifiedClient,
};
use askdb_server::{bind, serve_http, SqliteConnector, ToolServer};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

// ============================================================================
// Fixtures
// ============================================================================

fn create_database(path: &std::path::Path) -> anyhow::Result<()> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, total REAL NOT NULL);
         CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO orders (id, total) VALUES
             (1, 10.0), (2, 250.5), (3, 99.9), (4, 5.0), (5, 180.0), (6, 42.0), (7, 61.0);
         INSERT INTO customers (id, name) VALUES (1, 'Ada'), (2, 'Grace');",
    )?;
    Ok(())
}

/// Chooses a reply from the directive and question it is sent.
fn model_reply(body: &Value) -> String {
    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();

    if system.contains("matched_tables") {
        if user.contains("shipping") {
            return r#"{"matched_tables": ["shipping_costs"]}"#.to_string();
        }
        if user.contains("weather") {
            return r#"{"matched_tables": []}"#.to_string();
        }
        if user.contains("gibberish") {
            return "I think you want the orders table.".to_string();
        }
        return r#"{"matched_tables": ["orders"]}"#.to_string();
    }
    if user.contains("price") {
        return r#"{"query": "SELECT TOP 5 price FROM orders"}"#.to_string();
    }
    r#"{"query": "SELECT TOP 5 o.total FROM orders o ORDER BY o.total DESC"}"#.to_string()
}

/// OpenAI-style `/chat/completions` endpoint backed by [`model_reply`].
async fn start_fake_model() -> anyhow::Result<(String, Arc<Mutex<usize>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}/v1", listener.local_addr()?);
    let hits = Arc::new(Mutex::new(0usize));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let counter = counter.clone();
                    async move {
                        let bytes = req.into_body().collect().await?.to_bytes();
                        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                        *counter.lock().unwrap() += 1;
                        let reply = json!({
                            "model": "fake-gpt",
                            "choices": [{
                                "message": {"role": "assistant", "content": model_reply(&body)},
                                "finish_reason": "stop"
                            }],
                            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
                        });
                        Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from(
                            reply.to_string(),
                        ))))
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    Ok((base, hits))
}

// ============================================================================
// Tool server + pipeline
// ============================================================================

#[tokio::test]
async fn test_questions_end_to_end_over_http() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("store.db");
    create_database(&db_path)?;

    let listener = bind("127.0.0.1:0").await?;
    let server_url = format!("http://{}", listener.local_addr()?);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(serve_http(
        listener,
        ToolServer::new(SqliteConnector::new(&db_path)),
        async {
            let _ = stop_rx.await;
        },
    ));

    let (model_url, model_hits) = start_fake_model().await?;
    let model = UnifiedClient::from_config(LlmConfig {
        provider: Provider::OpenAI,
        api_key: "sk-test".to_string(),
        model: "gpt-4o".to_string(),
        base_url: model_url,
        api_version: None,
        timeout: Duration::from_secs(5),
    })?;

    let client =
        ToolClient::connect(HttpTransport::new(&server_url, Duration::from_secs(5))?).await?;
    let pipeline = Pipeline::start(client, Box::new(model)).await?;
    assert_eq!(pipeline.catalog().table_names(), vec!["customers", "orders"]);

    // Answered.
    let report = pipeline.ask("top five orders by total").await;
    match &report.outcome {
        Outcome::Done(rows) => {
            assert_eq!(rows.len(), 5);
            assert_eq!(rows[0]["total"], json!(250.5));
            assert_eq!(rows[4]["total"], json!(42.0));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.stages.last(), Some(&Stage::Executing));

    // Unknown table.
    let report = pipeline.ask("show me shipping costs").await;
    assert_eq!(
        report.outcome,
        Outcome::TableNotFound(vec![
            "Error: Table 'shipping_costs' not found in the database.".to_string()
        ])
    );

    // Nothing relevant.
    let report = pipeline.ask("what is the weather").await;
    assert_eq!(report.outcome, Outcome::NoTablesMatched);

    // Unknown column.
    let report = pipeline.ask("orders by price").await;
    assert!(matches!(report.outcome, Outcome::Rejected(_)));
    assert!(report.outcome.to_string().contains("price"));

    // Prose instead of JSON, then the session keeps going.
    let report = pipeline.ask("gibberish").await;
    assert!(matches!(
        report.outcome,
        Outcome::ParseFailed {
            stage: Stage::MatchingTables,
            ..
        }
    ));
    assert!(pipeline.ask("top five orders by total").await.outcome.is_done());

    // Two model calls per planned question, one per question halted at matching.
    assert_eq!(*model_hits.lock().unwrap(), 9);

    pipeline.close();
    let _ = stop_tx.send(());
    serving.await??;
    Ok(())
}
