//! Pure aggregation and bucketing over per-repository results.
//!
//! Every function here is a deterministic function of its inputs; `now` is
//! always injected so identical inputs produce byte-identical output.

use crate::model::{
    CodeChange, CommitDelta, Dashboard, DashboardStats, DayActivity, LanguageShare,
    LocHistoryByRepo, LocHistoryFile, Measurement, MonthLoc, MonthlyLocChange, Project,
    RepoLocSeries, SCHEMA_VERSION, OTHER_THRESHOLD_PERCENT,
};
use crate::util::{day_key, month_label, month_short, same_month, trailing_month_starts};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Daily commit/line activity over the trailing `days`-day window ending at
/// `now`. Always exactly `days` buckets; activity outside the window is
/// ignored.
pub fn daily_buckets(
    commit_times: &[DateTime<Utc>],
    deltas: &[CommitDelta],
    now: DateTime<Utc>,
    days: u32,
) -> Vec<DayActivity> {
    let today = now.date_naive();
    let start = today - Days::new(days.saturating_sub(1) as u64);

    let mut buckets: Vec<DayActivity> = (0..days as u64)
        .map(|i| DayActivity {
            date: day_key(start + Days::new(i)),
            commits: 0,
            additions: 0,
            deletions: 0,
        })
        .collect();

    let index_of = |date: NaiveDate| -> Option<usize> {
        if date < start || date > today {
            return None;
        }
        Some((date - start).num_days() as usize)
    };

    for ts in commit_times {
        if let Some(i) = index_of(ts.date_naive()) {
            buckets[i].commits += 1;
        }
    }
    for delta in deltas {
        if let Some(i) = index_of(delta.timestamp.date_naive()) {
            buckets[i].additions += delta.added;
            buckets[i].deletions += delta.deleted;
        }
    }

    buckets
}

/// Sum several daily series into one, keyed and ordered by date.
pub fn merge_daily<'a>(series: impl IntoIterator<Item = &'a [DayActivity]>) -> Vec<DayActivity> {
    let mut combined: BTreeMap<String, DayActivity> = BTreeMap::new();
    for days in series {
        for day in days {
            let entry = combined.entry(day.date.clone()).or_insert_with(|| DayActivity {
                date: day.date.clone(),
                commits: 0,
                additions: 0,
                deletions: 0,
            });
            entry.commits += day.commits;
            entry.additions += day.additions;
            entry.deletions += day.deletions;
        }
    }
    combined.into_values().collect()
}

/// Commits in the final 7 buckets vs the 7 before: (this week, last week, trend).
pub fn week_trend(daily: &[DayActivity]) -> (u64, u64, i64) {
    let this_week: u64 = daily.iter().rev().take(7).map(|d| d.commits).sum();
    let last_week: u64 = daily.iter().rev().skip(7).take(7).map(|d| d.commits).sum();
    (this_week, last_week, this_week as i64 - last_week as i64)
}

/// Line deltas bucketed into the trailing `weeks` 7-day periods, labelled by
/// period start date.
pub fn weekly_code_changes(
    deltas: &[CommitDelta],
    now: DateTime<Utc>,
    weeks: u32,
) -> Vec<CodeChange> {
    let today = now.date_naive();
    let mut changes = Vec::with_capacity(weeks as usize);

    for i in (0..weeks as u64).rev() {
        let start = today - Days::new((i + 1) * 7);
        let end = today - Days::new(i * 7);

        let mut additions = 0u64;
        let mut deletions = 0u64;
        for delta in deltas {
            let date = delta.timestamp.date_naive();
            if date > start && date <= end {
                additions += delta.added;
                deletions += delta.deleted;
            }
        }

        changes.push(CodeChange {
            date: day_key(start),
            additions,
            deletions,
        });
    }

    changes
}

/// Line deltas bucketed into the trailing `months` calendar months.
pub fn monthly_loc_changes(
    deltas: &[CommitDelta],
    now: DateTime<Utc>,
    months: u32,
) -> Vec<MonthlyLocChange> {
    trailing_month_starts(now, months)
        .into_iter()
        .map(|month_start| {
            let mut additions = 0u64;
            let mut deletions = 0u64;
            for delta in deltas {
                if same_month(delta.timestamp.date_naive(), month_start) {
                    additions += delta.added;
                    deletions += delta.deleted;
                }
            }
            MonthlyLocChange {
                month: month_label(month_start),
                month_short: month_short(month_start),
                additions,
                deletions,
                net: additions as i64 - deletions as i64,
            }
        })
        .collect()
}

/// Per-language line totals across non-fork projects only.
pub fn language_totals(projects: &[Project]) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for project in projects.iter().filter(|p| !p.is_fork) {
        for (lang, lines) in &project.loc {
            *totals.entry(lang.clone()).or_insert(0) += lines;
        }
    }
    totals
}

/// Percentage breakdown with the long tail folded into "Other".
pub fn language_breakdown(totals: &BTreeMap<String, u64>) -> Vec<LanguageShare> {
    let total: u64 = totals.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let percent_of = |lines: u64| -> f64 {
        let raw = lines as f64 * 100.0 / total as f64;
        (raw * 10.0).round() / 10.0
    };

    let mut shares = Vec::new();
    let mut other_lines = 0u64;
    for (lang, &lines) in totals {
        if (lines as f64) * 100.0 / (total as f64) < OTHER_THRESHOLD_PERCENT {
            other_lines += lines;
        } else {
            shares.push(LanguageShare {
                language: lang.clone(),
                lines,
                percent: percent_of(lines),
            });
        }
    }

    shares.sort_by(|a, b| b.lines.cmp(&a.lines).then(a.language.cmp(&b.language)));

    if other_lines > 0 {
        shares.push(LanguageShare {
            language: "Other".to_string(),
            lines: other_lines,
            percent: percent_of(other_lines),
        });
    }

    shares
}

/// The measurement best describing a repository at the start of a month:
/// newest within that month if any, else newest at or before the month start.
pub fn loc_at_month(
    measurements: &BTreeMap<String, Measurement>,
    month_start: NaiveDate,
) -> Option<u64> {
    let mut exact: Option<(NaiveDate, u64)> = None;
    let mut before: Option<(NaiveDate, u64)> = None;

    for (date_str, measurement) in measurements {
        let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };
        if same_month(date, month_start) {
            if exact.map_or(true, |(d, _)| date > d) {
                exact = Some((date, measurement.total));
            }
        } else if date <= month_start && before.map_or(true, |(d, _)| date > d) {
            before = Some((date, measurement.total));
        }
    }

    exact.or(before).map(|(_, total)| total)
}

/// LOC growth over the trailing months: aggregated totals plus the per-repo
/// series behind them. Forks contribute nothing.
pub fn loc_growth(
    projects: &[Project],
    history: &LocHistoryFile,
    now: DateTime<Utc>,
    months: u32,
) -> (Vec<MonthLoc>, LocHistoryByRepo) {
    let month_starts = trailing_month_starts(now, months);
    let month_names: Vec<String> = month_starts.iter().map(|d| month_short(*d)).collect();
    let last = month_starts.len().saturating_sub(1);

    let mut repos: Vec<RepoLocSeries> = projects
        .iter()
        .filter(|p| !p.is_fork)
        .map(|project| {
            let measurements = history.repos.get(&project.name).map(|r| &r.measurements);
            let data: Vec<u64> = month_starts
                .iter()
                .enumerate()
                .map(|(idx, month_start)| {
                    if idx == last {
                        // The final month always reflects what is on disk now.
                        project.total_loc()
                    } else {
                        measurements
                            .and_then(|m| loc_at_month(m, *month_start))
                            .unwrap_or(0)
                    }
                })
                .collect();
            RepoLocSeries {
                name: project.name.clone(),
                data,
                created_at: project.created_at.clone(),
            }
        })
        .collect();

    // Oldest first, so long-lived repos sit at the bottom of a stacked chart.
    repos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));

    let totals: Vec<MonthLoc> = month_starts
        .iter()
        .enumerate()
        .map(|(idx, month_start)| MonthLoc {
            month: month_short(*month_start),
            loc: repos.iter().map(|r| r.data.get(idx).copied().unwrap_or(0)).sum(),
        })
        .collect();

    (
        totals,
        LocHistoryByRepo {
            months: month_names,
            repos,
        },
    )
}

/// Assemble the output document from fully collected projects.
pub fn build_dashboard(
    projects: Vec<Project>,
    history: &LocHistoryFile,
    now: DateTime<Utc>,
    months: u32,
) -> Dashboard {
    let commit_history = merge_daily(projects.iter().map(|p| p.commit_history.as_slice()));
    let (this_week, last_week, trend) = week_trend(&commit_history);

    let languages = language_totals(&projects);
    let language_breakdown = language_breakdown(&languages);
    let (loc_history, loc_history_by_repo) = loc_growth(&projects, history, now, months);

    let total_loc: u64 = projects.iter().filter(|p| !p.is_fork).map(Project::total_loc).sum();
    let total_commits: u64 = projects.iter().map(|p| p.commits).sum();
    let fork_count = projects.iter().filter(|p| p.is_fork).count();
    let avg_progress = if projects.is_empty() {
        0
    } else {
        projects.iter().map(|p| p.progress).sum::<u32>() / projects.len() as u32
    };

    let mut releases: Vec<_> = projects.iter().flat_map(|p| p.releases.iter().cloned()).collect();
    releases.sort_by(|a, b| b.date.cmp(&a.date).then(a.repo.cmp(&b.repo)).then(a.tag.cmp(&b.tag)));

    Dashboard {
        version: SCHEMA_VERSION,
        generated_at: now,
        stats: DashboardStats {
            total_loc,
            total_commits,
            avg_progress,
            this_week_commits: this_week,
            last_week_commits: last_week,
            week_trend: trend,
            project_count: projects.len(),
            fork_count,
        },
        languages,
        language_breakdown,
        commit_history,
        loc_history,
        loc_history_by_repo,
        projects,
        releases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepoHistory;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn delta(ts: DateTime<Utc>, added: u64, deleted: u64) -> CommitDelta {
        CommitDelta { timestamp: ts, added, deleted }
    }

    fn project(name: &str, loc: &[(&str, u64)], is_fork: bool) -> Project {
        Project {
            id: crate::util::stable_id(name),
            name: name.to_string(),
            full_name: format!("jane/{name}"),
            description: String::new(),
            language: "Unknown".to_string(),
            stars: 0,
            forks: 0,
            open_issues: 0,
            loc: loc.iter().map(|(l, n)| (l.to_string(), *n)).collect(),
            commits: 0,
            recent_commits: 0,
            last_commit: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            url: String::new(),
            commit_history: Vec::new(),
            code_changes: Vec::new(),
            monthly_loc_changes: Vec::new(),
            releases: Vec::new(),
            progress: 0,
            goals: Vec::new(),
            completed_goals: Vec::new(),
            is_fork,
        }
    }

    #[test]
    fn daily_buckets_has_exactly_n_entries_and_respects_window() {
        let now = at(2026, 8, 7);
        let commits = vec![
            now,                          // today, counted
            at(2026, 5, 10),              // 89 days back, counted
            at(2026, 5, 9),               // 90 days back, outside
            at(2026, 1, 1),               // far outside
        ];
        let buckets = daily_buckets(&commits, &[], now, 90);

        assert_eq!(buckets.len(), 90);
        assert_eq!(buckets[0].date, "2026-05-10");
        assert_eq!(buckets[89].date, "2026-08-07");
        let total: u64 = buckets.iter().map(|b| b.commits).sum();
        assert_eq!(total, 2);
        assert_eq!(buckets[0].commits, 1);
        assert_eq!(buckets[89].commits, 1);
    }

    #[test]
    fn daily_buckets_fills_line_deltas() {
        let now = at(2026, 8, 7);
        let deltas = vec![delta(at(2026, 8, 6), 30, 10), delta(at(2026, 1, 1), 99, 99)];
        let buckets = daily_buckets(&[], &deltas, now, 7);
        assert_eq!(buckets[5].additions, 30);
        assert_eq!(buckets[5].deletions, 10);
        let far: u64 = buckets.iter().map(|b| b.additions).sum();
        assert_eq!(far, 30);
    }

    #[test]
    fn merge_daily_sums_per_date() {
        let a = vec![
            DayActivity { date: "2026-08-01".into(), commits: 2, additions: 5, deletions: 1 },
            DayActivity { date: "2026-08-02".into(), commits: 1, additions: 0, deletions: 0 },
        ];
        let b = vec![
            DayActivity { date: "2026-08-01".into(), commits: 3, additions: 2, deletions: 2 },
        ];
        let merged = merge_daily([a.as_slice(), b.as_slice()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].commits, 5);
        assert_eq!(merged[0].additions, 7);
        assert_eq!(merged[1].commits, 1);
    }

    #[test]
    fn week_trend_compares_last_two_weeks() {
        let now = at(2026, 8, 7);
        let commits: Vec<_> = (0..5)
            .map(|i| now - Days::new(i)) // 5 commits this week
            .chain((7..9).map(|i| now - Days::new(i))) // 2 last week
            .collect();
        let daily = daily_buckets(&commits, &[], now, 90);
        let (this_week, last_week, trend) = week_trend(&daily);
        assert_eq!(this_week, 5);
        assert_eq!(last_week, 2);
        assert_eq!(trend, 3);
    }

    #[test]
    fn weekly_code_changes_buckets_by_period() {
        let now = at(2026, 8, 7);
        let deltas = vec![
            delta(at(2026, 8, 6), 100, 40), // this week
            delta(at(2026, 7, 29), 10, 5),  // previous week
        ];
        let changes = weekly_code_changes(&deltas, now, 2);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].date, "2026-07-24");
        assert_eq!(changes[0].additions, 10);
        assert_eq!(changes[1].additions, 100);
        assert_eq!(changes[1].deletions, 40);
    }

    #[test]
    fn monthly_loc_changes_uses_calendar_months() {
        let now = at(2026, 8, 7);
        let deltas = vec![
            delta(at(2026, 7, 15), 100, 40),
            delta(at(2026, 7, 2), 20, 0),
            delta(at(2026, 6, 30), 7, 7),
        ];
        let changes = monthly_loc_changes(&deltas, now, 3);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].month, "Jun 2026");
        assert_eq!(changes[0].additions, 7);
        assert_eq!(changes[1].month, "Jul 2026");
        assert_eq!(changes[1].month_short, "Jul");
        assert_eq!(changes[1].additions, 120);
        assert_eq!(changes[1].deletions, 40);
        assert_eq!(changes[1].net, 80);
        assert_eq!(changes[2].month, "Aug 2026");
        assert_eq!(changes[2].additions, 0);
    }

    #[test]
    fn forks_never_reach_language_totals() {
        let projects = vec![
            project("app", &[("Python", 800), ("JavaScript", 200)], false),
            project("old-fork", &[("Python", 5000)], true),
        ];
        let totals = language_totals(&projects);
        assert_eq!(
            totals,
            BTreeMap::from([
                ("JavaScript".to_string(), 200),
                ("Python".to_string(), 800)
            ])
        );
    }

    #[test]
    fn breakdown_merges_small_languages_into_other() {
        let totals = BTreeMap::from([
            ("Rust".to_string(), 970u64),
            ("Shell".to_string(), 15),
            ("Lua".to_string(), 15),
        ]);
        let shares = language_breakdown(&totals);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].language, "Rust");
        assert_eq!(shares[1].language, "Other");
        assert_eq!(shares[1].lines, 30);
        assert_eq!(shares[1].percent, 3.0);

        let sum: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 0.5, "percentages sum to {sum}");
    }

    #[test]
    fn breakdown_of_empty_totals_is_empty() {
        assert!(language_breakdown(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn loc_at_month_prefers_exact_month_then_latest_before() {
        let measurements = BTreeMap::from([
            ("2026-05-20".to_string(), Measurement { total: 400, ..Default::default() }),
            ("2026-06-03".to_string(), Measurement { total: 500, ..Default::default() }),
            ("2026-06-15".to_string(), Measurement { total: 550, ..Default::default() }),
        ]);
        let june = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let july = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let april = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert_eq!(loc_at_month(&measurements, june), Some(550));
        assert_eq!(loc_at_month(&measurements, july), Some(550));
        assert_eq!(loc_at_month(&measurements, april), None);
    }

    #[test]
    fn loc_growth_final_month_uses_current_loc_and_skips_forks() {
        let mut app = project("app", &[("Rust", 1000)], false);
        app.created_at = "2026-01-01T00:00:00Z".to_string();
        let fork = project("old-fork", &[("Python", 5000)], true);

        let mut history = LocHistoryFile::default();
        history.repos.insert(
            "app".to_string(),
            RepoHistory {
                measurements: BTreeMap::from([
                    ("2026-06-10".to_string(), Measurement { total: 500, ..Default::default() }),
                    ("2026-07-01".to_string(), Measurement { total: 600, ..Default::default() }),
                ]),
            },
        );

        let (totals, by_repo) = loc_growth(&[app, fork], &history, at(2026, 8, 7), 3);
        assert_eq!(by_repo.months, vec!["Jun", "Jul", "Aug"]);
        assert_eq!(by_repo.repos.len(), 1);
        assert_eq!(by_repo.repos[0].data, vec![500, 600, 1000]);
        assert_eq!(totals[2], MonthLoc { month: "Aug".to_string(), loc: 1000 });
    }

    #[test]
    fn dashboard_totals_exclude_fork_loc_but_count_fork_commits() {
        let mut app = project("app", &[("Python", 800), ("JavaScript", 200)], false);
        app.commits = 10;
        let mut fork = project("old-fork", &[("Python", 5000)], true);
        fork.commits = 3;

        let dash = build_dashboard(vec![app, fork], &LocHistoryFile::default(), at(2026, 8, 7), 12);
        assert_eq!(dash.stats.total_loc, 1000);
        assert_eq!(dash.stats.total_commits, 13);
        assert_eq!(dash.stats.project_count, 2);
        assert_eq!(dash.stats.fork_count, 1);
        assert_eq!(dash.languages.get("Python"), Some(&800));
        assert!(dash.language_breakdown.iter().all(|s| s.language != "Other" || s.lines < 1000));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let build = || {
            let mut app = project("app", &[("Rust", 1234)], false);
            app.commits = 42;
            app.commit_history = daily_buckets(&[at(2026, 8, 5)], &[], at(2026, 8, 7), 30);
            build_dashboard(vec![app], &LocHistoryFile::default(), at(2026, 8, 7), 12)
        };
        let first = serde_json::to_string_pretty(&build()).unwrap();
        let second = serde_json::to_string_pretty(&build()).unwrap();
        assert_eq!(first, second);
    }
}
