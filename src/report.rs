use crate::aggregate;
use crate::cli::CommonArgs;
use crate::config;
use crate::history;
use crate::model::{Dashboard, Project};
use anyhow::Context;
use chrono::{DateTime, Utc};
use console::style;

/// Merge manual metadata, aggregate, and write the output document. The file
/// is only touched after the full aggregation succeeds.
pub fn finalize(
    mut projects: Vec<Project>,
    common: &CommonArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let overrides = config::load(&common.config).context("Failed to load project config")?;
    for project in &mut projects {
        config::apply(project, &overrides);
        if project.progress == 0 {
            project.progress = config::progress_heuristic(project);
        }
    }

    let loc_history = history::load(&common.loc_history).context("Failed to load LOC history")?;
    let dashboard = aggregate::build_dashboard(projects, &loc_history, now, common.months);

    let json = serde_json::to_string_pretty(&dashboard)?;
    std::fs::write(&common.output, json)
        .with_context(|| format!("Failed to write {}", common.output.display()))?;

    print_summary(&dashboard, common);
    Ok(())
}

fn print_summary(dashboard: &Dashboard, common: &CommonArgs) {
    let stats = &dashboard.stats;

    println!("{}", style("Summary").bold());
    println!("{}", "─".repeat(50));
    println!(
        "Projects: {} ({} forks)",
        style(stats.project_count).cyan(),
        stats.fork_count
    );
    println!(
        "Total LOC: {} (excluding forks)",
        style(stats.total_loc).cyan()
    );
    println!("Total commits: {}", style(stats.total_commits).cyan());
    println!("Average progress: {}%", style(stats.avg_progress).cyan());
    println!(
        "This week: {} commits ({}{} vs last week)",
        style(stats.this_week_commits).green(),
        if stats.week_trend >= 0 { "+" } else { "" },
        stats.week_trend
    );
    println!(
        "\nDashboard data written to {}",
        style(common.output.display()).bold()
    );
}
