//! Unified RAG - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use unified_rag::cli::{demo, Args, Commands};
use unified_rag::dashboard::{self, DEFAULT_WINDOW_MINUTES};
use unified_rag::{logging, Config, Query, RetrievalResult};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    match args.command {
        Commands::Demo => run_demo(&config).await,
        Commands::Query {
            text,
            strategy,
            max_results,
            threshold,
            requester,
            agent,
            domains,
            json,
        } => {
            let mut query = Query::new(text)
                .with_max_results(max_results)
                .with_threshold(threshold)
                .with_domains(domains);
            if let Some(strategy) = strategy {
                query = query.with_strategy(strategy);
            }
            if let Some(requester) = requester {
                query = query.with_requester(requester);
            }
            if let Some(agent) = agent {
                query = query.with_agent(agent);
            }
            run_query(&config, query, json).await
        }
        Commands::Dashboard { window, json } => run_dashboard(&config, window, json).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn run_demo(config: &Config) -> Result<()> {
    let service = demo::seeded_service(config)
        .await
        .context("Failed to seed demo store")?;

    println!("{}", "Running demo workload".bold().cyan());
    for (query, result) in demo::run_workload(&service).await {
        print_result(&query, &result);
    }

    println!();
    print!("{}", dashboard::render(&service.dashboard(DEFAULT_WINDOW_MINUTES)));
    Ok(())
}

async fn run_query(config: &Config, query: Query, json: bool) -> Result<()> {
    let service = demo::seeded_service(config)
        .await
        .context("Failed to seed demo store")?;
    let result = service.query(query.clone()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&query, &result);
        if !result.context_text.is_empty() {
            println!("\n{}\n{}", "Context:".bold(), result.context_text);
        }
    }
    Ok(())
}

async fn run_dashboard(config: &Config, window: u64, json: bool) -> Result<()> {
    let service = demo::seeded_service(config)
        .await
        .context("Failed to seed demo store")?;
    demo::run_workload(&service).await;

    let snapshot = service.dashboard(window);
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", dashboard::render(&snapshot));
    }
    Ok(())
}

fn print_result(query: &Query, result: &RetrievalResult) {
    let strategy = if result.is_error() {
        result.strategy_used.red().bold()
    } else if result.is_degraded() {
        result.strategy_used.yellow().bold()
    } else {
        result.strategy_used.green().bold()
    };

    let mut flags = Vec::new();
    if result.cached {
        flags.push("cached".to_string());
    }
    if let Some(from) = result.degraded_from {
        flags.push(format!("fallback from {}", from));
    }
    if result.timing.estimated {
        flags.push("timing estimated".to_string());
    }

    println!(
        "\n{} {} [{}] {:.2}ms {}",
        "▶".cyan(),
        query.text.bold(),
        strategy,
        result.elapsed_ms,
        if flags.is_empty() {
            String::new()
        } else {
            format!("({})", flags.join(", ")).dimmed().to_string()
        }
    );

    if let Some(error) = &result.error {
        println!("  {} {}", "error:".red(), error);
        return;
    }

    if result.passages.is_empty() {
        println!("  {}", "no passages".dimmed());
    }
    for passage in &result.passages {
        println!(
            "  {:.3}  {:<16} {}",
            passage.score,
            passage.source_id,
            passage.content.dimmed()
        );
    }
}
