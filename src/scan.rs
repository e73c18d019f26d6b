use crate::error::{DevboardError, Result};
use crate::git::GitRepo;
use crate::model::Repository;
use std::path::{Path, PathBuf};

/// Immediate subdirectories of `root` that contain a `.git` entry, sorted by
/// lowercased name so discovery order is stable across filesystems.
pub fn discover_repos(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(DevboardError::Config(format!(
            "Path does not exist or is not a directory: {}",
            root.display()
        )));
    }

    let mut repos = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.join(".git").exists() {
            repos.push(path);
        }
    }

    repos.sort_by_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(repos)
}

/// Owner segment of a git remote URL, or "local" when there is none to parse.
pub fn parse_owner(url: &str) -> String {
    let url = url.trim();

    // SSH form: git@host:owner/repo(.git)
    if let Some(rest) = url.strip_prefix("git@") {
        if let Some((_, path)) = rest.split_once(':') {
            if let Some((owner, _)) = path.split_once('/') {
                if !owner.is_empty() {
                    return owner.to_string();
                }
            }
        }
        return "local".to_string();
    }

    // URL form: scheme://host/owner/repo(.git)
    if let Some((_, rest)) = url.split_once("://") {
        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let _host = segments.next();
        if let Some(owner) = segments.next() {
            return owner.to_string();
        }
    }

    "local".to_string()
}

pub fn build_repository(path: &Path, repo: &GitRepo, fork_names: &[String]) -> Repository {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let owner = repo
        .origin_url()
        .map(|url| parse_owner(&url))
        .unwrap_or_else(|| "local".to_string());
    let is_fork = fork_names.iter().any(|f| f.eq_ignore_ascii_case(&name));

    Repository {
        full_name: format!("{owner}/{name}"),
        name,
        owner,
        path: path.to_path_buf(),
        is_fork,
    }
}

/// Drop excluded repositories unconditionally, then apply the owner filter.
pub fn apply_filters(
    repos: Vec<Repository>,
    exclude: &[String],
    owner: Option<&str>,
) -> Vec<Repository> {
    repos
        .into_iter()
        .filter(|r| !exclude.iter().any(|e| e.eq_ignore_ascii_case(&r.name)))
        .filter(|r| match owner {
            Some(o) => r.owner.eq_ignore_ascii_case(o),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn repo(name: &str, owner: &str, is_fork: bool) -> Repository {
        Repository {
            name: name.to_string(),
            owner: owner.to_string(),
            full_name: format!("{owner}/{name}"),
            path: PathBuf::from(name),
            is_fork,
        }
    }

    #[test]
    fn discovers_only_git_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("beta/.git")).unwrap();
        std::fs::create_dir_all(dir.path().join("Alpha/.git")).unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-repo")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();

        let found = discover_repos(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
    }

    #[test]
    fn discover_rejects_missing_path() {
        assert!(discover_repos(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn parses_owner_from_ssh_and_https() {
        assert_eq!(parse_owner("git@github.com:jane/devboard.git"), "jane");
        assert_eq!(parse_owner("https://github.com/jane/devboard.git"), "jane");
        assert_eq!(parse_owner("https://gitlab.example.org/team/tool"), "team");
        assert_eq!(parse_owner("/srv/git/bare.git"), "local");
        assert_eq!(parse_owner(""), "local");
    }

    #[test]
    fn exclude_list_drops_repos_case_insensitively() {
        let repos = vec![repo("app", "jane", false), repo("Scratch", "jane", false)];
        let kept = apply_filters(repos, &["scratch".to_string()], None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "app");
    }

    #[test]
    fn owner_filter_keeps_matching_owner_only() {
        let repos = vec![repo("app", "jane", false), repo("mirror", "upstream", false)];
        let kept = apply_filters(repos, &[], Some("Jane"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "app");
    }
}
