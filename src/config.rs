use crate::error::{DevboardError, Result};
use crate::model::Project;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Manual per-project metadata, keyed by full name, merged into the output
/// for display purposes only.
pub type ProjectsConfig = BTreeMap<String, ProjectOverride>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectOverride {
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub goals: Option<Vec<String>>,
    #[serde(default)]
    pub completed_goals: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A missing file is fine; a malformed one is a configuration error.
pub fn load(path: &Path) -> Result<ProjectsConfig> {
    if !path.exists() {
        return Ok(ProjectsConfig::new());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        DevboardError::Config(format!("Invalid project config {}: {e}", path.display()))
    })
}

pub fn apply(project: &mut Project, config: &ProjectsConfig) {
    let Some(overrides) = config.get(&project.full_name) else {
        return;
    };
    if let Some(progress) = overrides.progress {
        project.progress = progress;
    }
    if let Some(goals) = &overrides.goals {
        project.goals = goals.clone();
    }
    if let Some(completed) = &overrides.completed_goals {
        project.completed_goals = completed.clone();
    }
    if let Some(description) = &overrides.description {
        if !description.is_empty() {
            project.description = description.clone();
        }
    }
}

/// Rough completion estimate from code size, recent activity, and open
/// issues. Used only when no manual progress is configured.
pub fn progress_heuristic(project: &Project) -> u32 {
    let total_loc = project.total_loc();
    let code_score = match total_loc {
        loc if loc > 10_000 => 40,
        loc if loc > 5_000 => 30,
        loc if loc > 1_000 => 20,
        _ => 10,
    };

    let activity_score = match project.recent_commits {
        c if c > 50 => 30,
        c if c > 20 => 20,
        c if c > 5 => 10,
        _ => 5,
    };

    let issue_score = match project.open_issues {
        0 => 30,
        i if i < 5 => 20,
        i if i < 10 => 10,
        _ => 5,
    };

    (code_score + activity_score + issue_score).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap as Map;

    fn project() -> Project {
        Project {
            id: 1,
            name: "app".into(),
            full_name: "jane/app".into(),
            description: "Repository: app".into(),
            language: "Rust".into(),
            stars: 0,
            forks: 0,
            open_issues: 0,
            loc: Map::from([("Rust".to_string(), 12_000u64)]),
            commits: 100,
            recent_commits: 60,
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
            is_fork: false,
        }
    }

    #[test]
    fn overrides_apply_by_full_name() {
        let json = r#"{
            "jane/app": {
                "progress": 75,
                "goals": ["ship v1"],
                "completed_goals": [],
                "description": "The app"
            }
        }"#;
        let config: ProjectsConfig = serde_json::from_str(json).unwrap();

        let mut p = project();
        apply(&mut p, &config);
        assert_eq!(p.progress, 75);
        assert_eq!(p.goals, vec!["ship v1".to_string()]);
        assert_eq!(p.description, "The app");
    }

    #[test]
    fn unknown_project_is_untouched() {
        let config = ProjectsConfig::new();
        let mut p = project();
        apply(&mut p, &config);
        assert_eq!(p.progress, 0);
        assert_eq!(p.description, "Repository: app");
    }

    #[test]
    fn heuristic_caps_at_100_and_rewards_activity() {
        let p = project();
        // 12k lines (40) + 60 recent commits (30) + 0 issues (30)
        assert_eq!(progress_heuristic(&p), 100);

        let mut quiet = project();
        quiet.loc = Map::from([("Rust".to_string(), 500u64)]);
        quiet.recent_commits = 0;
        quiet.open_issues = 12;
        assert_eq!(progress_heuristic(&quiet), 20);
    }
}
