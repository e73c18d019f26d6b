use crate::aggregate;
use crate::cli::{CommonArgs, GithubArgs};
use crate::error::{DevboardError, Result};
use crate::loc::{self, LocTool};
use crate::model::{CodeChange, Project, Release};
use crate::report;
use crate::util::stable_id;
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use console::style;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "devboard-dashboard";
const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct GhOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhRepo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    pub owner: GhOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhCommit {
    pub sha: String,
    pub commit: GhCommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhCommitDetail {
    #[serde(default)]
    pub author: Option<GhCommitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhCommitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

pub struct GitHubClient {
    http: reqwest::blocking::Client,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, token })
    }

    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<reqwest::blocking::Response> {
        let mut request = self
            .http
            .get(format!("{API_BASE}{endpoint}"))
            .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {token}"));
        }

        let response = request.send()?;
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            let reset = response
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            return Err(DevboardError::Api(format!(
                "rate limit exceeded (resets at epoch {reset})"
            )));
        }
        Ok(response.error_for_status()?)
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        Ok(self.get(endpoint, query)?.json()?)
    }

    fn get_paginated<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut q: Vec<(&str, String)> = query.to_vec();
            q.push(("per_page", PER_PAGE.to_string()));
            q.push(("page", page.to_string()));

            let batch: Vec<T> = self.get_json(endpoint, &q)?;
            let len = batch.len();
            results.extend(batch);
            if len < PER_PAGE {
                break;
            }
        }
        Ok(results)
    }

    pub fn user_repos(&self, user: &str) -> Result<Vec<GhRepo>> {
        self.get_paginated(
            &format!("/users/{user}/repos"),
            &[("type", "owner".to_string()), ("sort", "updated".to_string())],
        )
    }

    pub fn repo(&self, owner: &str, name: &str) -> Result<GhRepo> {
        self.get_json(&format!("/repos/{owner}/{name}"), &[])
    }

    /// Per-language byte counts.
    pub fn languages(&self, owner: &str, name: &str) -> Result<BTreeMap<String, u64>> {
        self.get_json(&format!("/repos/{owner}/{name}/languages"), &[])
    }

    pub fn commits(
        &self,
        owner: &str,
        name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GhCommit>> {
        let mut query = Vec::new();
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339()));
        }
        self.get_paginated(&format!("/repos/{owner}/{name}/commits"), &query)
    }

    pub fn releases(&self, owner: &str, name: &str) -> Result<Vec<GhRelease>> {
        self.get_paginated(&format!("/repos/{owner}/{name}/releases"), &[])
    }

    /// Weekly [timestamp, additions, deletions] triples. GitHub answers 202
    /// while still computing these; that and any parse trouble yield an
    /// empty series rather than an error.
    pub fn code_frequency(&self, owner: &str, name: &str) -> Vec<(i64, i64, i64)> {
        let response = match self.get(&format!("/repos/{owner}/{name}/stats/code_frequency"), &[]) {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };
        if response.status() == reqwest::StatusCode::ACCEPTED {
            return Vec::new();
        }
        let weeks: Vec<Vec<i64>> = match response.json() {
            Ok(w) => w,
            Err(_) => return Vec::new(),
        };
        weeks
            .into_iter()
            .filter(|w| w.len() >= 3)
            .map(|w| (w[0], w[1], w[2]))
            .collect()
    }
}

/// Rough line estimate from GitHub's byte counts, roughly calibrated per
/// language.
pub fn estimate_loc(languages_bytes: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
    const DEFAULT_BYTES_PER_LINE: u64 = 45;
    let bytes_per_line = |lang: &str| -> u64 {
        match lang {
            "Python" | "Go" => 35,
            "Ruby" => 30,
            "JavaScript" | "PHP" | "C" => 40,
            "TypeScript" | "C++" | "Rust" | "CSS" => 45,
            "Java" | "C#" | "Markdown" => 50,
            "HTML" => 60,
            _ => DEFAULT_BYTES_PER_LINE,
        }
    };

    languages_bytes
        .iter()
        .filter(|(_, &bytes)| bytes > 0)
        .map(|(lang, &bytes)| (lang.clone(), (bytes / bytes_per_line(lang)).max(1)))
        .collect()
}

/// Clone (depth 1) or update a repository so the real counter can run on it.
pub fn clone_or_update(owner: &str, name: &str, clone_dir: &Path) -> Result<PathBuf> {
    let target = clone_dir.join(format!("{owner}_{name}"));
    std::fs::create_dir_all(clone_dir)?;

    let status = if target.exists() {
        Command::new("git")
            .args(["-C"])
            .arg(&target)
            .args(["pull", "--quiet"])
            .status()?
    } else {
        let url = format!("https://github.com/{owner}/{name}.git");
        Command::new("git")
            .args(["clone", "--depth", "1", "--quiet", &url])
            .arg(&target)
            .status()?
    };

    if !status.success() {
        return Err(DevboardError::GitRepo(format!(
            "Failed to clone or update {owner}/{name}"
        )));
    }
    Ok(target)
}

pub fn exec(common: CommonArgs, args: GithubArgs) -> anyhow::Result<()> {
    let client = GitHubClient::new(args.token.clone()).context("Failed to build HTTP client")?;
    if args.token.is_none() {
        eprintln!(
            "{} no GitHub token provided; API rate limits will be stricter",
            style("warning:").yellow().bold()
        );
    }

    let mut targets: Vec<(String, String)> = Vec::new();
    if !args.repos.is_empty() {
        for spec in &args.repos {
            match spec.split_once('/') {
                Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                    targets.push((owner.to_string(), name.to_string()));
                }
                _ => eprintln!(
                    "{} invalid repo spec '{spec}', expected owner/name",
                    style("warning:").yellow().bold()
                ),
            }
        }
    } else if let Some(user) = &args.user {
        let repos = client
            .user_repos(user)
            .with_context(|| format!("Failed to list repositories for {user}"))?;
        targets = repos
            .into_iter()
            .filter(|r| !r.fork)
            .map(|r| (r.owner.login, r.name))
            .collect();
    } else {
        bail!("Specify --user or --repos for GitHub mode");
    }

    targets.retain(|(_, name)| !common.exclude.iter().any(|e| e.eq_ignore_ascii_case(name)));
    if targets.is_empty() {
        bail!("No repositories found to process");
    }

    let now = Utc::now();
    let mut projects = Vec::new();
    for (owner, name) in &targets {
        println!("{} {owner}/{name}", style("Fetching").cyan().bold());
        match collect_remote_project(&client, &common, &args, owner, name, now) {
            Ok(project) => projects.push(project),
            Err(e) => eprintln!(
                "{} skipping {owner}/{name}: {e}",
                style("warning:").yellow().bold()
            ),
        }
    }

    if projects.is_empty() {
        bail!("No repositories were successfully processed");
    }

    report::finalize(projects, &common, now)
}

fn collect_remote_project(
    client: &GitHubClient,
    common: &CommonArgs,
    args: &GithubArgs,
    owner: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Project> {
    let info = client.repo(owner, name)?;
    let is_fork = info.fork || common.forks.iter().any(|f| f.eq_ignore_ascii_case(name));

    let languages_bytes = client.languages(owner, name).unwrap_or_default();
    let loc = if is_fork {
        BTreeMap::new()
    } else if args.clone && common.loc_tool != LocTool::None {
        match clone_or_update(owner, name, &args.clone_dir)
            .and_then(|path| loc::count_lines(&path, common.loc_tool, &common.exclude_langs))
        {
            Ok(loc) => loc,
            Err(e) => {
                eprintln!(
                    "{} LOC count failed for {owner}/{name}, falling back to estimate: {e}",
                    style("warning:").yellow().bold()
                );
                filtered_estimate(&languages_bytes, &common.exclude_langs)
            }
        }
    } else {
        filtered_estimate(&languages_bytes, &common.exclude_langs)
    };

    let window_start = now - Duration::days(common.window_days as i64);
    let recent: Vec<DateTime<Utc>> = client
        .commits(owner, name, Some(window_start))?
        .iter()
        .filter_map(|c| c.commit.author.as_ref())
        .filter_map(|a| a.date.as_deref())
        .filter_map(parse_rfc3339)
        .collect();
    let commit_history = aggregate::daily_buckets(&recent, &[], now, common.window_days);
    let recent_commits: u64 = commit_history.iter().map(|d| d.commits).sum();

    let total_commits = client.commits(owner, name, None)?.len() as u64;

    let code_changes: Vec<CodeChange> = client
        .code_frequency(owner, name)
        .iter()
        .rev()
        .take(common.weeks as usize)
        .rev()
        .filter_map(|&(ts, added, deleted)| {
            DateTime::from_timestamp(ts, 0).map(|date| CodeChange {
                date: date.format("%Y-%m-%d").to_string(),
                additions: added.max(0) as u64,
                deletions: deleted.unsigned_abs(),
            })
        })
        .collect();

    let releases: Vec<Release> = client
        .releases(owner, name)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| {
            let date = r.published_at.as_deref().and_then(parse_rfc3339)?;
            Some(Release {
                message: r.name.clone().unwrap_or_else(|| r.tag_name.clone()),
                tag: r.tag_name,
                date,
                repo: name.to_string(),
                url: r.html_url,
            })
        })
        .take(common.release_limit)
        .collect();

    let language = info
        .language
        .clone()
        .or_else(|| loc::primary_language(&loc))
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(Project {
        id: stable_id(&info.full_name),
        name: info.name.clone(),
        description: info
            .description
            .clone()
            .unwrap_or_else(|| format!("Repository: {}", info.name)),
        full_name: info.full_name,
        language,
        stars: info.stargazers_count,
        forks: info.forks_count,
        open_issues: info.open_issues_count,
        loc,
        commits: total_commits,
        recent_commits,
        last_commit: info.pushed_at.clone().unwrap_or_default(),
        created_at: info.created_at.unwrap_or_default(),
        updated_at: info.updated_at.unwrap_or_default(),
        url: info.html_url.unwrap_or_default(),
        commit_history,
        code_changes,
        monthly_loc_changes: Vec::new(),
        releases,
        progress: 0,
        goals: Vec::new(),
        completed_goals: Vec::new(),
        is_fork,
    })
}

fn filtered_estimate(
    languages_bytes: &BTreeMap<String, u64>,
    exclude_langs: &[String],
) -> BTreeMap<String, u64> {
    estimate_loc(languages_bytes)
        .into_iter()
        .filter(|(lang, _)| !exclude_langs.iter().any(|e| e.eq_ignore_ascii_case(lang)))
        .collect()
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
