use crate::error::{DevboardError, Result};
use crate::model::{CommitDelta, CommitInfo, Release};
use chrono::{DateTime, Utc};
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open the repository at `path` (work tree or .git directory).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = discover(path.as_ref())?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured origin URL, with a trailing `.git` stripped.
    pub fn origin_url(&self) -> Option<String> {
        self.repo
            .config_snapshot()
            .string("remote.origin.url")
            .map(|url| {
                let url = url.to_string();
                url.strip_suffix(".git").map(str::to_string).unwrap_or(url)
            })
    }

    /// Repository description from .git/description, falling back to the
    /// first substantial README line.
    pub fn description(&self) -> Option<String> {
        let desc_file = self.repo.path().join("description");
        if let Ok(content) = std::fs::read_to_string(&desc_file) {
            let content = content.trim();
            if !content.is_empty() && !content.contains("Unnamed repository") {
                return Some(content.to_string());
            }
        }

        for readme in ["README.md", "README.rst", "README.txt", "README"] {
            let Ok(content) = std::fs::read_to_string(self.path.join(readme)) else {
                continue;
            };
            for line in content.lines().take(5) {
                let line = line.trim().trim_start_matches('#').trim();
                if line.len() > 5 {
                    return Some(line.chars().take(200).collect());
                }
            }
        }

        None
    }

    /// Walk the full commit graph from HEAD.
    pub fn history(&self) -> Result<Vec<CommitInfo>> {
        let mut head = self.repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;

        let mut commits = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let secs = commit.time()?.seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| DevboardError::InvalidDate(format!("Invalid timestamp: {secs}")))?;

            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
            let author = commit.author()?;

            commits.push(CommitInfo {
                id: commit_id.to_string(),
                author_name: author.name.to_string(),
                author_email: author.email.to_string(),
                timestamp,
                parent_ids: parents.iter().map(|id| id.to_string()).collect(),
            });

            for pid in parents {
                stack.push_back(pid);
            }
        }

        Ok(commits)
    }

    /// Line deltas for the given non-merge commits. Merge commits are passed
    /// over, as are binary blobs.
    pub fn line_deltas(&self, commits: &[CommitInfo], since: DateTime<Utc>) -> Result<Vec<CommitDelta>> {
        let mut deltas = Vec::new();

        for info in commits {
            if info.is_merge() || info.timestamp < since {
                continue;
            }

            let commit_id = ObjectId::from_hex(info.id.as_bytes())
                .map_err(|e| DevboardError::Parse(format!("Invalid commit ID: {e}")))?;
            let commit_tree = self.repo.find_commit(commit_id)?.tree()?;

            let parent_tree = match info.parent_ids.first() {
                Some(pid) => {
                    let parent_id = ObjectId::from_hex(pid.as_bytes())
                        .map_err(|e| DevboardError::Parse(format!("Invalid commit ID: {e}")))?;
                    Some(self.repo.find_commit(parent_id)?.tree()?)
                }
                None => None,
            };

            let changes: Vec<ChangeDetached> =
                self.repo
                    .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)?;

            let mut added = 0u64;
            let mut deleted = 0u64;
            for change in changes {
                let (a, d) = self.change_delta(change)?;
                added += a;
                deleted += d;
            }

            deltas.push(CommitDelta {
                timestamp: info.timestamp,
                added,
                deleted,
            });
        }

        Ok(deltas)
    }

    fn change_delta(&self, change: ChangeDetached) -> Result<(u64, u64)> {
        match change {
            ChangeDetached::Addition { id, .. } => {
                if let Ok(obj) = self.repo.find_object(id) {
                    if !is_binary(&obj) {
                        return Ok((count_lines(&obj), 0));
                    }
                }
                Ok((0, 0))
            }
            ChangeDetached::Deletion { id, .. } => {
                if let Ok(obj) = self.repo.find_object(id) {
                    if !is_binary(&obj) {
                        return Ok((0, count_lines(&obj)));
                    }
                }
                Ok((0, 0))
            }
            ChangeDetached::Modification { previous_id, id, .. } => {
                if let (Ok(old_obj), Ok(new_obj)) =
                    (self.repo.find_object(previous_id), self.repo.find_object(id))
                {
                    if !is_binary(&old_obj) && !is_binary(&new_obj) {
                        return Ok(line_diff(&old_obj, &new_obj));
                    }
                }
                Ok((0, 0))
            }
            ChangeDetached::Rewrite { source_id, id, copy, .. } => {
                if let (Ok(old_obj), Ok(new_obj)) =
                    (self.repo.find_object(source_id), self.repo.find_object(id))
                {
                    if !is_binary(&old_obj) && !is_binary(&new_obj) {
                        let (added, deleted) = line_diff(&old_obj, &new_obj);
                        // A copy contributes new lines; a rename only what was lost.
                        return if copy { Ok((added, 0)) } else { Ok((0, deleted)) };
                    }
                }
                Ok((0, 0))
            }
        }
    }

    /// Tags peeled to their target commit, newest first, capped at `limit`.
    pub fn releases(&self, repo_name: &str, limit: usize) -> Result<Vec<Release>> {
        let platform = self
            .repo
            .references()
            .map_err(|e| DevboardError::GitRepo(format!("Failed to read references: {e}")))?;
        let tags = platform
            .tags()
            .map_err(|e| DevboardError::GitRepo(format!("Failed to iterate tags: {e}")))?;

        let mut releases = Vec::new();
        for reference in tags.filter_map(|r| r.ok()) {
            let mut reference = reference;
            let tag = reference.name().shorten().to_string();

            let Ok(target) = reference.peel_to_id_in_place() else {
                continue;
            };
            // Tags pointing at trees or blobs carry no date; skip them.
            let Ok(commit) = self.repo.find_commit(target.detach()) else {
                continue;
            };

            let secs = commit.time()?.seconds;
            let date = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| DevboardError::InvalidDate(format!("Invalid timestamp: {secs}")))?;
            let message = commit.message()?.title.to_string();

            releases.push(Release {
                tag,
                date,
                message,
                repo: repo_name.to_string(),
                url: None,
            });
        }

        releases.sort_by(|a, b| b.date.cmp(&a.date));
        releases.truncate(limit);
        Ok(releases)
    }
}

fn is_binary(object: &gix::Object) -> bool {
    object.data.as_slice().iter().take(8192).any(|&b| b == 0)
}

fn count_lines(object: &gix::Object) -> u64 {
    std::str::from_utf8(object.data.as_slice())
        .map(|t| t.lines().count() as u64)
        .unwrap_or(0)
}

fn line_diff(old_object: &gix::Object, new_object: &gix::Object) -> (u64, u64) {
    let old_text = std::str::from_utf8(old_object.data.as_slice()).unwrap_or("");
    let new_text = std::str::from_utf8(new_object.data.as_slice()).unwrap_or("");

    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();

    let mut added = 0usize;
    let mut deleted = 0usize;
    let (mut oi, mut ni) = (0usize, 0usize);

    while oi < old_lines.len() || ni < new_lines.len() {
        if oi >= old_lines.len() {
            added += new_lines.len() - ni;
            break;
        }
        if ni >= new_lines.len() {
            deleted += old_lines.len() - oi;
            break;
        }

        if old_lines[oi] == new_lines[ni] {
            oi += 1;
            ni += 1;
            continue;
        }

        let mut found = false;
        for look_ahead in 1..=3 {
            if oi + look_ahead < old_lines.len() && old_lines[oi + look_ahead] == new_lines[ni] {
                deleted += look_ahead;
                oi += look_ahead;
                found = true;
                break;
            }
            if ni + look_ahead < new_lines.len() && old_lines[oi] == new_lines[ni + look_ahead] {
                added += look_ahead;
                ni += look_ahead;
                found = true;
                break;
            }
        }

        if !found {
            deleted += 1;
            added += 1;
            oi += 1;
            ni += 1;
        }
    }

    (added as u64, deleted as u64)
}
