//! askdb CLI
//!
//! - `serve`: run the SQL tool server over HTTP or stdio
//! - `ask`: answer questions against a tool server (interactive by default)
//! - `call`: invoke one tool and print its raw result
//! - `tables`: print the schema catalog a client would see

use anyhow::{anyhow, Context, Result};
use askdb_agent::config::SERVER_URL_ENV;
use askdb_agent::{AgentConfig, HttpTransport, LlmConfig, Pipeline, ToolClient, UnifiedClient};
use askdb_protocol::{ToolCall, ToolPayload};
use askdb_server::config::{BIND_HOST_ENV, BIND_PORT_ENV, DATABASE_ENV, TRANSPORT_ENV};
use askdb_server::{
    bind, serve_http, serve_stdio, LocalTransport, ServerConfig, SqliteConnector, ToolServer,
    Transport,
};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod render;
mod repl;

#[derive(Parser)]
#[command(name = "askdb")]
#[command(author, version, about = "Ask questions of a SQL database in plain language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool server.
    ///
    /// Flags override the `ASKDB_*` environment settings.
    Serve {
        /// SQLite database file to serve (`ASKDB_DATABASE`)
        #[arg(long)]
        database: Option<PathBuf>,
        /// Bind host (`ASKDB_BIND_HOST`)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (`ASKDB_BIND_PORT`)
        #[arg(long)]
        port: Option<u16>,
        /// `http` or `stdio` (`ASKDB_TRANSPORT`)
        #[arg(long)]
        transport: Option<String>,
    },

    /// Answer questions. Without a question, starts an interactive session.
    Ask {
        #[command(flatten)]
        target: TargetArgs,
        /// Ask this one question and exit
        question: Vec<String>,
    },

    /// Invoke one tool and print its result as JSON.
    Call {
        #[command(flatten)]
        target: TargetArgs,
        /// Tool name (`list_tables`, `list_columns`, `run_sql`, `table_not_found`)
        tool: String,
        /// Tool argument as `key=value`; repeatable
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
        /// Print the full response envelope instead of the unwrapped result
        #[arg(long)]
        raw: bool,
    },

    /// Print every table and its columns.
    Tables {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Which tool server a client command talks to.
#[derive(Args, Clone)]
struct TargetArgs {
    /// Embed a tool server over this SQLite file instead of connecting to one
    #[arg(long, conflicts_with = "server")]
    database: Option<PathBuf>,
    /// Tool server base URL (`ASKDB_SERVER_URL`)
    #[arg(long)]
    server: Option<String>,
    /// Tool server request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    match cli.command {
        Commands::Serve {
            database,
            host,
            port,
            transport,
        } => {
            let mut overrides = HashMap::new();
            if let Some(database) = database {
                overrides.insert(DATABASE_ENV, database.display().to_string());
            }
            if let Some(host) = host {
                overrides.insert(BIND_HOST_ENV, host);
            }
            if let Some(port) = port {
                overrides.insert(BIND_PORT_ENV, port.to_string());
            }
            if let Some(transport) = transport {
                overrides.insert(TRANSPORT_ENV, transport);
            }
            let config = ServerConfig::from_lookup(|key| {
                overrides
                    .get(key)
                    .cloned()
                    .or_else(|| std::env::var(key).ok())
            })?;
            rt.block_on(cmd_serve(config))
        }
        Commands::Ask { target, question } => {
            let config = AgentConfig::from_env()?;
            let question = question.join(" ");
            cmd_ask(&rt, &target, config, question.trim())
        }
        Commands::Call {
            target,
            tool,
            args,
            raw,
        } => rt.block_on(cmd_call(&target, &tool, &args, raw)),
        Commands::Tables { target } => rt.block_on(cmd_tables(&target)),
    }
}

/// Logs go to stderr so stdout stays clean for answers and the stdio transport.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_serve(config: ServerConfig) -> Result<()> {
    let server = ToolServer::new(SqliteConnector::new(&config.database));
    server
        .probe()
        .await
        .with_context(|| format!("cannot open {}", config.database.display()))?;

    match config.transport {
        Transport::Http => {
            let listener = bind(&config.bind_addr()).await?;
            serve_http(listener, server, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        }
        Transport::Stdio => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            tokio::select! {
                served = serve_stdio(stdin, tokio::io::stdout(), server) => served?,
                _ = tokio::signal::ctrl_c() => info!("interrupted; stopping stdio server"),
            }
        }
    }
    Ok(())
}

async fn connect(target: &TargetArgs) -> Result<ToolClient> {
    if let Some(database) = &target.database {
        let server = ToolServer::new(SqliteConnector::new(database));
        return Ok(ToolClient::connect(LocalTransport::new(server)).await?);
    }

    let url = match &target.server {
        Some(url) => url.clone(),
        None => std::env::var(SERVER_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("set {SERVER_URL_ENV}, or pass --server or --database"))?,
    };
    let transport = HttpTransport::new(&url, Duration::from_secs(target.timeout_secs))?;
    ToolClient::connect(transport)
        .await
        .with_context(|| format!("cannot reach tool server at {url}"))
}

fn cmd_ask(rt: &Runtime, target: &TargetArgs, config: AgentConfig, question: &str) -> Result<()> {
    let mut target = target.clone();
    if target.server.is_none() {
        target.server = config.server_url.clone();
    }
    let pipeline = rt.block_on(start_pipeline(&target, config.llm))?;

    if question.is_empty() {
        repl::run(rt, &pipeline)?;
    } else {
        let report = rt.block_on(pipeline.ask(question));
        print!("{}", render::report(&report));
    }
    pipeline.close();
    Ok(())
}

async fn start_pipeline(target: &TargetArgs, llm: LlmConfig) -> Result<Pipeline> {
    info!(provider = ?llm.provider, model = %llm.model, "using model");
    let model = UnifiedClient::from_config(llm)?;
    let client = connect(target).await?;
    let pipeline = Pipeline::start(client, Box::new(model))
        .await
        .context("failed to load the schema catalog")?;
    Ok(pipeline)
}

async fn cmd_call(target: &TargetArgs, tool: &str, args: &[String], raw: bool) -> Result<()> {
    let mut call = ToolCall {
        name: tool.to_string(),
        arguments: Default::default(),
    };
    for arg in args {
        let (key, value) = parse_key_value(arg)?;
        call = call.with_arg(key, value);
    }

    let client = connect(target).await?;
    let response = client.call(&call).await?;
    let value = if raw {
        response
    } else {
        ToolPayload::from_value(response).into_value()
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    client.close();
    Ok(())
}

async fn cmd_tables(target: &TargetArgs) -> Result<()> {
    let client = connect(target).await?;
    let tables = client.list_tables().await?;
    if tables.is_empty() {
        println!("{}", "no tables".yellow());
    }
    for table in tables {
        let columns = client.list_columns(&table.table).await?;
        println!("{}", render::table_heading(&table.schema, &table.table));
        print!("{}", render::columns(&columns));
    }
    client.close();
    Ok(())
}

fn parse_key_value(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim(), value))
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {arg:?}"))
}
