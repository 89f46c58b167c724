//! Interactive question loop.
//!
//! By default we use `rustyline` for line editing and history.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

use anyhow::Result;
use askdb_agent::{Pipeline, QuestionReport};
use colored::Colorize;
use tokio::runtime::Runtime;

use crate::render;

const PROMPT: &str = "Ask a question (Ctrl-C to exit): ";

pub fn run(rt: &Runtime, pipeline: &Pipeline) -> Result<()> {
    println!("{}", "askdb".green().bold());
    println!(
        "{} tables: {}\n",
        pipeline.catalog().len(),
        pipeline.catalog().table_names().join(", ")
    );

    #[cfg(feature = "repl-rustyline")]
    {
        run_rustyline(rt, pipeline)
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        run_simple(rt, pipeline)
    }
}

/// One question, abandoned if Ctrl-C arrives first.
fn ask_interruptible(rt: &Runtime, pipeline: &Pipeline, question: &str) -> Option<QuestionReport> {
    rt.block_on(async {
        tokio::select! {
            report = pipeline.ask(question) => Some(report),
            _ = tokio::signal::ctrl_c() => None,
        }
    })
}

fn goodbye() {
    println!("\n{}", "Exiting. Goodbye!".green());
}

#[cfg(feature = "repl-rustyline")]
fn run_rustyline(rt: &Runtime, pipeline: &Pipeline) -> Result<()> {
    use anyhow::anyhow;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                goodbye();
                return Ok(());
            }
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        rl.add_history_entry(question)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        match ask_interruptible(rt, pipeline, question) {
            Some(report) => println!("{}", render::report(&report)),
            None => {
                goodbye();
                return Ok(());
            }
        }
    }
}

#[cfg(not(feature = "repl-rustyline"))]
fn run_simple(rt: &Runtime, pipeline: &Pipeline) -> Result<()> {
    use std::io::{self, Write};

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            goodbye();
            return Ok(());
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match ask_interruptible(rt, pipeline, question) {
            Some(report) => println!("{}", render::report(&report)),
            None => {
                goodbye();
                return Ok(());
            }
        }
    }
}
