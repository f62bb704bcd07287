use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "redisobj",
    about = "Inspect record plans and run the redisobj mapping against an in-memory store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log plan compilation, freshness checks and pipelines to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Store configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoRecord {
    /// Root with a keyed child, a list and a map
    Root,
    /// Order with an embedded shipping address
    Order,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the compiled plan of a demo record
    Plan(PlanArgs),
    /// Print every key a demo record maps to
    Keys(PlanArgs),
    /// Write, rewrite and read back a demo record
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct PlanArgs {
    #[arg(long, value_enum, default_value = "root")]
    pub record: DemoRecord,
}

#[derive(Args)]
pub struct DemoArgs {
    #[arg(long, value_enum, default_value = "root")]
    pub record: DemoRecord,
    /// Enable content-digest caching
    #[arg(long)]
    pub cache: bool,
    /// TTL in seconds applied to every written key
    #[arg(long)]
    pub ttl: Option<u64>,
    /// Number of identical writes before the read
    #[arg(long, default_value = "2")]
    pub passes: usize,
}
