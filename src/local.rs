use crate::aggregate;
use crate::cli::{CommonArgs, LocalArgs};
use crate::error::Result;
use crate::git::GitRepo;
use crate::loc;
use crate::model::{CommitInfo, Project, Repository};
use crate::report;
use crate::scan;
use crate::util::{stable_id, trailing_month_starts};
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

pub fn exec(common: CommonArgs, args: LocalArgs) -> anyhow::Result<()> {
    let repo_paths = scan::discover_repos(&args.path).context("Failed to scan repositories")?;
    if repo_paths.is_empty() {
        bail!("No git repositories found in {}", args.path.display());
    }

    let mut discovered = Vec::new();
    for path in &repo_paths {
        match GitRepo::open(path) {
            Ok(repo) => discovered.push(scan::build_repository(path, &repo, &common.forks)),
            Err(e) => warn(&format!("cannot open {}: {e}", path.display())),
        }
    }

    let repos = scan::apply_filters(discovered, &common.exclude, args.owner.as_deref());
    if repos.is_empty() {
        bail!("No repositories left after filtering");
    }

    let now = Utc::now();
    let pb = ProgressBar::new(repos.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:30.green} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut projects = Vec::new();
    for repo in &repos {
        pb.set_message(repo.name.clone());
        match collect_project(repo, &common, args.author.as_deref(), now) {
            Ok(project) => projects.push(project),
            Err(e) => warn(&format!("skipping {}: {e}", repo.name)),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if projects.is_empty() {
        bail!("No repositories were successfully processed");
    }

    report::finalize(projects, &common, now)
}

fn collect_project(
    rec: &Repository,
    common: &CommonArgs,
    author: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Project> {
    let repo = GitRepo::open(&rec.path)?;
    let history = repo.history()?;

    let authored: Vec<CommitInfo> = history
        .iter()
        .filter(|c| c.matches_author(author))
        .cloned()
        .collect();
    let commit_times: Vec<DateTime<Utc>> = authored.iter().map(|c| c.timestamp).collect();

    // Deltas have to cover both the weekly and the calendar-month series.
    let window_start = now - Duration::days(common.window_days as i64);
    let delta_since = trailing_month_starts(now, common.months)
        .first()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
        .unwrap_or(window_start)
        .min(window_start);
    let deltas = repo.line_deltas(&authored, delta_since)?;

    let commit_history = aggregate::daily_buckets(&commit_times, &deltas, now, common.window_days);
    let recent_commits: u64 = commit_history.iter().map(|d| d.commits).sum();
    let code_changes = aggregate::weekly_code_changes(&deltas, now, common.weeks);
    let monthly_loc_changes = aggregate::monthly_loc_changes(&deltas, now, common.months);

    let loc = if rec.is_fork {
        BTreeMap::new()
    } else {
        match loc::count_lines(&rec.path, common.loc_tool, &common.exclude_langs) {
            Ok(loc) => loc,
            Err(e) => {
                warn(&format!("LOC count failed for {}: {e}", rec.name));
                BTreeMap::new()
            }
        }
    };

    let releases = match repo.releases(&rec.name, common.release_limit) {
        Ok(releases) => releases,
        Err(e) => {
            warn(&format!("cannot read tags for {}: {e}", rec.name));
            Vec::new()
        }
    };

    let first = history.iter().map(|c| c.timestamp).min();
    let last = history.iter().map(|c| c.timestamp).max();
    let last_commit = last.map(|t| t.to_rfc3339()).unwrap_or_default();

    Ok(Project {
        id: stable_id(&rec.full_name),
        name: rec.name.clone(),
        full_name: rec.full_name.clone(),
        description: repo
            .description()
            .unwrap_or_else(|| format!("Repository: {}", rec.name)),
        language: loc::primary_language(&loc).unwrap_or_else(|| "Unknown".to_string()),
        stars: 0,
        forks: 0,
        open_issues: 0,
        loc,
        commits: authored.len() as u64,
        recent_commits,
        last_commit: last_commit.clone(),
        created_at: first.map(|t| t.to_rfc3339()).unwrap_or_default(),
        updated_at: last_commit,
        url: repo.origin_url().unwrap_or_default(),
        commit_history,
        code_changes,
        monthly_loc_changes,
        releases,
        progress: 0,
        goals: Vec::new(),
        completed_goals: Vec::new(),
        is_fork: rec.is_fork,
    })
}

fn warn(msg: &str) {
    eprintln!("{} {msg}", style("warning:").yellow().bold());
}
