mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use askdb_protocol::{ColumnInfo, FailureKind, ToolOutput};
use askdb_server::{Connection, Connector, DatabaseError, SqliteConnector, ToolServer};
use proptest::prelude::*;
use serde_json::Value;

/// Counts how many connections the server opens.
struct Counting {
    inner: SqliteConnector,
    opened: Arc<AtomicUsize>,
}

impl Connector for Counting {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.connect()
    }
}

fn counting(db: &common::ShopDb) -> (ToolServer, Arc<AtomicUsize>) {
    let opened = Arc::new(AtomicUsize::new(0));
    let server = ToolServer::new(Counting {
        inner: SqliteConnector::new(&db.path),
        opened: opened.clone(),
    });
    (server, opened)
}

#[tokio::test]
async fn lists_base_tables() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let server = ToolServer::new(SqliteConnector::new(&db.path));

    let tables = server.list_tables().await?.into_tables()?;
    let names: Vec<(&str, &str)> = tables
        .iter()
        .map(|t| (t.schema.as_str(), t.table.as_str()))
        .collect();
    assert_eq!(names, vec![("main", "customers"), ("main", "orders")]);
    Ok(())
}

#[tokio::test]
async fn lists_columns_in_declaration_order() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let server = ToolServer::new(SqliteConnector::new(&db.path));

    let columns = server.list_columns("ORDERS").await?.into_columns()?;
    let expected = [
        ("id", "INTEGER"),
        ("customer_id", "INTEGER"),
        ("total", "REAL"),
        ("placed_at", "TEXT"),
    ]
    .map(|(c, t)| ColumnInfo {
        column: c.to_string(),
        data_type: t.to_string(),
    });
    assert_eq!(columns, expected.to_vec());

    let missing = server.list_columns("shipping_costs").await?;
    assert_eq!(missing, ToolOutput::ListColumns(vec![]));
    Ok(())
}

#[tokio::test]
async fn top_query_returns_at_most_n_rows() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let server = ToolServer::new(SqliteConnector::new(&db.path));

    let rows = server
        .run_sql("SELECT TOP 5 o.total FROM orders o ORDER BY o.total DESC")
        .await?
        .into_rows()?;
    assert_eq!(rows.len(), 5);
    let totals: Vec<f64> = rows.iter().filter_map(|r| r["total"].as_f64()).collect();
    assert_eq!(totals, vec![120.0, 88.8, 64.1, 42.0, 19.5]);
    assert!(rows.iter().all(|r| r.len() == 1));
    Ok(())
}

#[tokio::test]
async fn rows_keep_select_list_order() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let server = ToolServer::new(SqliteConnector::new(&db.path));

    let rows = server
        .run_sql("select email, name, id from customers where id = 2")
        .await?
        .into_rows()?;
    assert_eq!(rows.len(), 1);
    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["email", "name", "id"]);
    assert_eq!(rows[0]["email"], Value::Null);
    assert_eq!(rows[0]["name"], Value::from("Bob Jones"));
    Ok(())
}

#[tokio::test]
async fn non_select_is_rejected_without_touching_the_database() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let (server, opened) = counting(&db);

    let err = server.run_sql("DELETE FROM orders").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::DisallowedStatement);
    assert_eq!(err.to_string(), "Only SELECT queries are allowed.");
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    let rows = server
        .run_sql("SELECT COUNT(*) AS n FROM orders")
        .await?
        .into_rows()?;
    assert_eq!(rows[0]["n"], Value::from(8));
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn driver_errors_carry_the_cause() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let server = ToolServer::new(SqliteConnector::new(&db.path));

    let err = server
        .run_sql("SELECT TOP 5 price FROM orders")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Execution);
    assert!(err.to_string().contains("no such column"), "{err}");
    Ok(())
}

#[tokio::test]
async fn every_call_opens_its_own_connection() -> anyhow::Result<()> {
    let db = common::shop_db()?;
    let (server, opened) = counting(&db);

    server.list_tables().await?;
    server.list_columns("orders").await?;
    server.run_sql("SELECT id FROM customers").await?;
    assert_eq!(opened.load(Ordering::SeqCst), 3);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .run_sql(&format!("SELECT total FROM orders WHERE id = {}", i + 1))
                    .await
            })
        })
        .collect();
    for handle in handles {
        let rows = handle.await??.into_rows()?;
        assert_eq!(rows.len(), 1);
    }
    assert_eq!(opened.load(Ordering::SeqCst), 11);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn gate_never_reaches_the_database(
        ws in "[ \t\n]{0,3}",
        head in "(delete|update|insert|drop|with|exec|create|alter|truncate|merge)",
        rest in "[ -~]{0,30}",
    ) {
        let db = common::shop_db().unwrap();
        let (server, opened) = counting(&db);
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        let query = format!("{ws}{head} {rest}");
        let result = rt.block_on(server.run_sql(&query));

        let kind = result.err().map(|e| e.kind());
        prop_assert_eq!(kind, Some(FailureKind::DisallowedStatement));
        prop_assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn table_not_found_names_the_table(table in "[A-Za-z_][A-Za-z0-9_ ]{0,24}") {
        let server = ToolServer::new(SqliteConnector::new("unused.db"));
        let message = server.table_not_found(&table).into_message().unwrap();
        prop_assert!(message.contains(&table));
        prop_assert_eq!(message, format!("Error: Table '{table}' not found in the database."));
    }
}
