use crate::loc::LocTool;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devboard")]
#[command(about = "Generates dashboard JSON from local git repositories or the GitHub API")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, default_value = "dashboard_data.json", help = "Output JSON file")]
    pub output: PathBuf,

    #[arg(long, default_value = "projects_config.json", help = "Manual project metadata (progress, goals)")]
    pub config: PathBuf,

    #[arg(long, default_value = "loc_history.json", help = "Accumulated LOC history file")]
    pub loc_history: PathBuf,

    #[arg(long, value_delimiter = ',', help = "Repository names to exclude entirely")]
    pub exclude: Vec<String>,

    #[arg(long, value_delimiter = ',', help = "Repository names that are forks (kept, but excluded from LOC)")]
    pub forks: Vec<String>,

    #[arg(long, default_value_t = 90, help = "Trailing window for daily commit buckets, in days")]
    pub window_days: u32,

    #[arg(long, default_value_t = 12, help = "Trailing calendar months for LOC series")]
    pub months: u32,

    #[arg(long, default_value_t = 12, help = "Trailing weeks for the code change series")]
    pub weeks: u32,

    #[arg(long, default_value_t = 10, help = "Releases kept per repository")]
    pub release_limit: usize,

    #[arg(long, value_enum, default_value = "tokei", help = "External line counter")]
    pub loc_tool: LocTool,

    #[arg(long, value_delimiter = ',', default_value = "HTML,SVG,JSON", help = "Languages dropped from LOC output")]
    pub exclude_langs: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan local git repositories
    Local(LocalArgs),
    /// Fetch repository data from the GitHub API
    Github(GithubArgs),
    /// Backfill historical LOC measurements
    History(HistoryArgs),
}

#[derive(Args, Clone)]
pub struct LocalArgs {
    #[arg(long, help = "Directory containing git repositories")]
    pub path: PathBuf,

    #[arg(long, help = "Only count commits whose author name or email equals this value")]
    pub author: Option<String>,

    #[arg(long, help = "Only include repositories whose origin owner matches")]
    pub owner: Option<String>,
}

#[derive(Args, Clone)]
pub struct GithubArgs {
    #[arg(long, help = "Fetch all non-fork repositories of this user")]
    pub user: Option<String>,

    #[arg(long, num_args = 1.., help = "Specific repositories to fetch (owner/name)")]
    pub repos: Vec<String>,

    #[arg(long, env = "GITHUB_TOKEN", help = "GitHub API token")]
    pub token: Option<String>,

    #[arg(long, help = "Clone repositories and run the line counter instead of estimating")]
    pub clone: bool,

    #[arg(long, default_value = ".repos_cache", help = "Directory used for clones")]
    pub clone_dir: PathBuf,
}

#[derive(Args, Clone)]
pub struct HistoryArgs {
    #[arg(long, help = "Directory containing git repositories")]
    pub path: PathBuf,

    #[arg(long, default_value_t = 1, help = "Days to backfill when no explicit range is given")]
    pub days: u32,

    #[arg(long, help = "Range start (YYYY-MM-DD)")]
    pub start: Option<String>,

    #[arg(long, help = "Range end (YYYY-MM-DD)")]
    pub end: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Local(args) => crate::local::exec(self.common, args),
            Commands::Github(args) => crate::github::exec(self.common, args),
            Commands::History(args) => crate::history::exec(self.common, args),
        }
    }
}
