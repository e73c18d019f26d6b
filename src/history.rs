use crate::cli::{CommonArgs, HistoryArgs};
use crate::error::{DevboardError, Result};
use crate::git::GitRepo;
use crate::loc;
use crate::model::{CommitInfo, LocHistoryFile, Measurement};
use crate::scan;
use crate::util::day_key;
use anyhow::{bail, Context};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use console::style;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub fn load(path: &Path) -> Result<LocHistoryFile> {
    if !path.exists() {
        return Ok(LocHistoryFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save(history: &mut LocHistoryFile, path: &Path) -> Result<()> {
    history.last_updated = Some(Utc::now());
    std::fs::write(path, serde_json::to_string_pretty(history)?)?;
    Ok(())
}

/// Daily snapshot dates, inclusive on both ends.
pub fn date_range(args: &HistoryArgs, today: NaiveDate) -> Result<Vec<NaiveDate>> {
    let end = match &args.end {
        Some(s) => parse_date(s)?,
        None => today,
    };
    let start = match &args.start {
        Some(s) => parse_date(s)?,
        None => end - Days::new(args.days as u64),
    };
    if start > end {
        return Err(DevboardError::InvalidDate(format!(
            "start ({start}) is after end ({end})"
        )));
    }

    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    Ok(dates)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DevboardError::InvalidDate(format!("{s}: {e}")))
}

pub fn newest_commit_before(
    history: &[CommitInfo],
    cutoff: DateTime<Utc>,
) -> Option<&CommitInfo> {
    history
        .iter()
        .filter(|c| c.timestamp <= cutoff)
        .max_by_key(|c| c.timestamp)
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

pub fn exec(common: CommonArgs, args: HistoryArgs) -> anyhow::Result<()> {
    let repo_paths = scan::discover_repos(&args.path).context("Failed to scan repositories")?;
    if repo_paths.is_empty() {
        bail!("No git repositories found in {}", args.path.display());
    }

    let dates = date_range(&args, Utc::now().date_naive())?;
    let mut history = load(&common.loc_history).context("Failed to load LOC history")?;

    // Checkouts happen in throwaway shared clones so work trees stay untouched.
    let temp = TempDir::new().context("Failed to create temp directory")?;

    println!(
        "Measuring {} snapshots across {} repositories",
        style(dates.len()).cyan(),
        style(repo_paths.len()).cyan()
    );

    for path in &repo_paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        if common.exclude.iter().any(|e| e.eq_ignore_ascii_case(&name)) {
            continue;
        }

        let commits = match GitRepo::open(path).and_then(|repo| repo.history()) {
            Ok(commits) => commits,
            Err(e) => {
                warn(&format!("skipping {name}: {e}"));
                continue;
            }
        };
        let created = commits.iter().map(|c| c.timestamp.date_naive()).min();

        println!("{} {name}", style("Repository").cyan().bold());
        let mut clone_path: Option<PathBuf> = None;

        for date in &dates {
            let key = day_key(*date);
            let entry = history.repos.entry(name.clone()).or_default();
            if entry.measurements.contains_key(&key) {
                continue;
            }

            if created.map_or(true, |c| *date < c) {
                entry.measurements.insert(key, Measurement::default());
                continue;
            }
            let Some(commit) = newest_commit_before(&commits, end_of_day(*date)) else {
                entry.measurements.insert(key, Measurement::default());
                continue;
            };
            let short: String = commit.id.chars().take(8).collect();

            let clone = match &clone_path {
                Some(p) => p.clone(),
                None => match shared_clone(path, temp.path(), &name) {
                    Ok(p) => {
                        clone_path = Some(p.clone());
                        p
                    }
                    Err(e) => {
                        warn(&format!("cannot clone {name}: {e}"));
                        break;
                    }
                },
            };

            if let Err(e) = checkout(&clone, &commit.id) {
                warn(&format!("checkout {short} failed for {name}: {e}"));
                continue;
            }

            let languages = match loc::count_lines(&clone, common.loc_tool, &common.exclude_langs)
            {
                Ok(languages) => languages,
                Err(e) => {
                    warn(&format!("LOC count failed for {name} at {key}: {e}"));
                    continue;
                }
            };
            let total: u64 = languages.values().sum();
            println!("  {key}: {total} lines ({short})");

            entry.measurements.insert(
                key,
                Measurement {
                    total,
                    languages,
                    commit: Some(short),
                },
            );
        }

        // Persist per repository, so an interrupted run keeps its progress.
        save(&mut history, &common.loc_history).context("Failed to save LOC history")?;
    }

    println!(
        "LOC history saved to {}",
        style(common.loc_history.display()).bold()
    );
    Ok(())
}

fn shared_clone(source: &Path, temp_base: &Path, name: &str) -> Result<PathBuf> {
    let target = temp_base.join(name);
    if !target.exists() {
        let status = Command::new("git")
            .args(["clone", "--shared", "--quiet"])
            .arg(source)
            .arg(&target)
            .status()?;
        if !status.success() {
            return Err(DevboardError::GitRepo(format!(
                "git clone --shared failed for {}",
                source.display()
            )));
        }
    }
    Ok(target)
}

fn checkout(clone: &Path, commit: &str) -> Result<()> {
    let status = Command::new("git")
        .arg("-C")
        .arg(clone)
        .args(["checkout", "--quiet", "--force", commit])
        .status()?;
    if !status.success() {
        return Err(DevboardError::GitRepo(format!(
            "git checkout {commit} failed"
        )));
    }
    Ok(())
}

fn warn(msg: &str) {
    eprintln!("{} {msg}", style("warning:").yellow().bold());
}
