use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const SCHEMA_VERSION: u32 = 1;

/// Languages holding less than this share of total lines are folded into "Other".
pub const OTHER_THRESHOLD_PERCENT: f64 = 3.0;

/// A repository discovered by the scanner. Lifecycle: built once per run, read-only.
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub owner: String,
    pub full_name: String,
    pub path: PathBuf,
    pub is_fork: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub parent_ids: Vec<String>,
}

impl CommitInfo {
    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// Case-sensitive exact match on author name or email.
    pub fn matches_author(&self, author: Option<&str>) -> bool {
        match author {
            Some(a) => self.author_name == a || self.author_email == a,
            None => true,
        }
    }
}

/// Lines added/deleted by a single commit, summed over its text files.
#[derive(Debug, Clone, Copy)]
pub struct CommitDelta {
    pub timestamp: DateTime<Utc>,
    pub added: u64,
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub tag: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayActivity {
    pub date: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChange {
    pub date: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyLocChange {
    pub month: String,
    pub month_short: String,
    pub additions: u64,
    pub deletions: u64,
    pub net: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageShare {
    pub language: String,
    pub lines: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthLoc {
    pub month: String,
    pub loc: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoLocSeries {
    pub name: String,
    pub data: Vec<u64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocHistoryByRepo {
    pub months: Vec<String>,
    pub repos: Vec<RepoLocSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u32,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub loc: BTreeMap<String, u64>,
    pub commits: u64,
    pub recent_commits: u64,
    pub last_commit: String,
    pub created_at: String,
    pub updated_at: String,
    pub url: String,
    pub commit_history: Vec<DayActivity>,
    pub code_changes: Vec<CodeChange>,
    pub monthly_loc_changes: Vec<MonthlyLocChange>,
    pub releases: Vec<Release>,
    pub progress: u32,
    pub goals: Vec<String>,
    pub completed_goals: Vec<String>,
    pub is_fork: bool,
}

impl Project {
    pub fn total_loc(&self) -> u64 {
        self.loc.values().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_loc: u64,
    pub total_commits: u64,
    pub avg_progress: u32,
    pub this_week_commits: u64,
    pub last_week_commits: u64,
    pub week_trend: i64,
    pub project_count: usize,
    pub fork_count: usize,
}

/// The full output document, written in one piece after aggregation completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub stats: DashboardStats,
    pub languages: BTreeMap<String, u64>,
    pub language_breakdown: Vec<LanguageShare>,
    pub commit_history: Vec<DayActivity>,
    pub loc_history: Vec<MonthLoc>,
    pub loc_history_by_repo: LocHistoryByRepo,
    pub projects: Vec<Project>,
    pub releases: Vec<Release>,
}

/// One line-count snapshot of a repository at a given date.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Measurement {
    pub total: u64,
    pub languages: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepoHistory {
    /// Keyed by measurement date, YYYY-MM-DD.
    pub measurements: BTreeMap<String, Measurement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocHistoryFile {
    pub repos: BTreeMap<String, RepoHistory>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}
