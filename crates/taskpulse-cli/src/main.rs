use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use log::LevelFilter;
use std::io::Write;
use taskpulse_core::assistant::ToolStatus;
use taskpulse_core::{Assistant, AssistantFactory, StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

mod config_loader;

use config_loader::ConfigLoader;

#[derive(Parser, Debug)]
#[clap(name = "Taskpulse", author, version = "0.1.0", about = "Ask questions about your Asana projects")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "taskpulse.yaml", help = "Path to the YAML configuration file")]
    config: String,

    #[clap(long, short, help = "Log level; overrides logging.level from the configuration")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The question, e.g. "Which tasks are overdue?"
        query: String,
    },
    /// Interactive session with streamed answers
    Chat,
    /// Print the tool schemas offered to the model
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::from_file(&cli.config)
        .await
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    let level = cli.log_level.unwrap_or_else(|| config.logging.level.clone());
    env_logger::Builder::new()
        .filter_level(level.parse().unwrap_or(LevelFilter::Info))
        .init();

    let assistant = AssistantFactory::create_from_config(&config)?;

    match cli.command {
        Commands::Ask { query } => ask(&assistant, &query).await,
        Commands::Chat => chat(&assistant).await,
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&assistant.tools())?);
            Ok(())
        }
    }
}

async fn ask(assistant: &Assistant, query: &str) -> Result<()> {
    let response = assistant.generate_response(query).await?;
    println!("{}", response.text);

    if let Some(failure) = &response.failure {
        eprintln!("warning: the answer is incomplete ({})", failure);
    }
    if let Some(spec) = &response.visualization {
        println!("{}", serde_json::to_string_pretty(spec)?);
    }
    Ok(())
}

async fn chat(assistant: &Assistant) -> Result<()> {
    println!("Taskpulse chat. Type /reset to start over, /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                assistant.reset().await?;
                println!("Conversation cleared.");
            }
            query => {
                if let Err(e) = stream_answer(assistant, query).await {
                    eprintln!("error: {}", e);
                }
            }
        }
    }
    Ok(())
}

async fn stream_answer(assistant: &Assistant, query: &str) -> Result<()> {
    let mut stream = assistant.generate_streaming_response(query).await?;
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::TextDelta(fragment) => {
                print!("{}", fragment);
                stdout.flush()?;
            }
            StreamEvent::ToolStarted { tool_name, .. } => {
                log::debug!("Calling {}", tool_name);
            }
            StreamEvent::ToolFinished {
                tool_name, status, ..
            } => {
                if let ToolStatus::Error(kind) = status {
                    eprintln!("\n[{} failed: {:?}]", tool_name, kind);
                }
            }
            StreamEvent::VisualizationReady(spec) => {
                log::debug!("Chart available: {:?} '{}'", spec.kind, spec.title);
            }
            StreamEvent::Completed(summary) => {
                println!();
                if summary.partial {
                    eprintln!("[answer incomplete after {} iterations]", summary.iterations);
                }
                if let Some(spec) = summary.visualization {
                    println!("{}", serde_json::to_string(&spec)?);
                }
            }
            StreamEvent::Failed(e) => {
                println!();
                return Err(e.into());
            }
        }
    }
    Ok(())
}
