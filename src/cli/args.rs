//! Command-line argument parsing
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use crate::rag::types::StrategyKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Retrieval orchestration with circuit breakers, caching and cost tracking
#[derive(Parser, Debug)]
#[command(name = "unified-rag")]
#[command(version)]
#[command(about = "Run retrieval strategies against a demo knowledge store", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.unified-rag/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: default warnings only, -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seed the demo store, run queries across every strategy, print the dashboard
    Demo,

    /// Run one query against the demo store
    Query {
        /// Query text
        #[arg(value_name = "TEXT")]
        text: String,

        /// Strategy: semantic, hybrid, keyword, agent-optimized, entity-aware
        #[arg(short, long, value_parser = parse_strategy)]
        strategy: Option<StrategyKind>,

        /// Maximum passages returned
        #[arg(long, default_value_t = 10)]
        max_results: usize,

        /// Minimum similarity score
        #[arg(long, default_value_t = 0.3)]
        threshold: f32,

        /// Requester identity (required by agent-optimized)
        #[arg(long)]
        requester: Option<String>,

        /// Agent identity
        #[arg(long)]
        agent: Option<String>,

        /// Restrict to a domain; repeatable
        #[arg(long = "domain", value_name = "DOMAIN")]
        domains: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the demo workload and print only the dashboard snapshot
    Dashboard {
        /// Window in minutes
        #[arg(long, default_value_t = 60)]
        window: u64,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display the effective configuration as TOML
    Config,
}

fn parse_strategy(value: &str) -> Result<StrategyKind, String> {
    value.parse::<StrategyKind>().map_err(|e| e.to_string())
}
