use super::branches::validate_branch_name;
use anyhow::{anyhow, Context, Result};
use git2::{BranchType, Repository, StatusOptions};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// Returned by `create_worktree` when the target directory is already in
/// place, so callers can offer reuse instead of failing the whole create.
#[derive(Debug)]
pub struct WorktreeExistsError {
    pub path: std::path::PathBuf,
}

impl fmt::Display for WorktreeExistsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worktree path already exists: {}", self.path.display())
    }
}

impl std::error::Error for WorktreeExistsError {}

fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    let output = cmd
        .args(args)
        .output()
        .with_context(|| format!("run git {}", args.join(" ")))?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(anyhow!("git {}: {}", args.join(" "), combined.trim()));
    }
    Ok(combined)
}

pub fn is_bare_repo(path: &Path) -> bool {
    Repository::open(path).map(|repo| repo.is_bare()).unwrap_or(false)
}

pub fn branch_exists(repo_dir: &Path, branch: &str) -> bool {
    let Ok(repo) = Repository::open(repo_dir) else {
        return false;
    };
    let result = repo.find_branch(branch, BranchType::Local).is_ok();
    result
}

/// Uncommitted changes (staged, unstaged, or untracked) in a worktree.
pub fn is_worktree_dirty(path: &Path) -> Result<bool> {
    let repo = Repository::open(path)
        .with_context(|| format!("open worktree at {}", path.display()))?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(true);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(!statuses.is_empty())
}

// The bare repo needs +refs/heads/*:refs/remotes/origin/* so linked worktrees
// see remote tracking refs. A +refs/heads/*:refs/heads/* refspec must NOT be
// present: git refuses to move a local branch ref that is checked out in a
// linked worktree, which would make every fetch fail. New worktrees instead
// start from origin/<base>, so freshness never depends on local refs.
fn ensure_remote_tracking_refs(repo_dir: &Path) {
    let existing = run_git(Some(repo_dir), &["config", "--get-all", "remote.origin.fetch"])
        .unwrap_or_default();
    if existing.contains("refs/heads/*:refs/heads/*") {
        let _ = run_git(
            Some(repo_dir),
            &[
                "config",
                "--unset",
                "remote.origin.fetch",
                r"^\+refs/heads/\*:refs/heads/\*$",
            ],
        );
    }
    if !existing.contains("refs/remotes/origin/") {
        let _ = run_git(
            Some(repo_dir),
            &[
                "config",
                "--add",
                "remote.origin.fetch",
                "+refs/heads/*:refs/remotes/origin/*",
            ],
        );
    }
}

/// Clone `remote_url` as a bare repository at `dest`. No-op when `dest`
/// already exists. A fresh bare clone carries no refs/remotes/origin/* refs,
/// and worktree creation resolves its start point against those, so the
/// clone is followed by an immediate fetch.
pub fn clone_bare(remote_url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Ok(());
    }
    run_git(
        None,
        &[
            "clone",
            "--bare",
            remote_url,
            dest.to_str().ok_or_else(|| anyhow!("non-UTF-8 clone path"))?,
        ],
    )
    .map_err(|e| anyhow!("clone bare: {e}"))?;
    fetch_bare(dest)
}

/// Fetch the bare repository, pruning deleted upstream branches.
pub fn fetch_bare(repo_dir: &Path) -> Result<()> {
    ensure_remote_tracking_refs(repo_dir);
    run_git(Some(repo_dir), &["fetch", "--prune"])
        .map_err(|e| anyhow!("fetch {}: {e}", repo_dir.display()))?;
    Ok(())
}

/// Check out `branch` into `target_path` as a linked worktree of `repo_dir`.
///
/// An existing local branch is checked out as-is. A new branch starts at
/// `origin/<base_branch>` (the freshest fetched commit, not the possibly
/// stale local ref) and gets upstream tracking to it. An empty `base_branch`
/// falls back to HEAD.
pub fn create_worktree(
    repo_dir: &Path,
    branch: &str,
    target_path: &Path,
    base_branch: &str,
) -> Result<()> {
    validate_branch_name(branch)?;
    if Repository::open(repo_dir).is_err() {
        return Err(anyhow!("not a git repository: {}", repo_dir.display()));
    }
    let target = target_path
        .to_str()
        .ok_or_else(|| anyhow!("non-UTF-8 worktree path"))?;

    let result = if branch_exists(repo_dir, branch) {
        run_git(Some(repo_dir), &["worktree", "add", target, branch]).map(|out| (out, None))
    } else {
        let upstream = if base_branch.is_empty() {
            None
        } else {
            Some(format!("origin/{base_branch}"))
        };
        let start_point = upstream.clone().unwrap_or_else(|| "HEAD".to_string());
        run_git(
            Some(repo_dir),
            &["worktree", "add", "-b", branch, target, &start_point],
        )
        .map(|out| (out, upstream))
    };

    match result {
        Ok((_, upstream)) => {
            if let Some(upstream) = upstream {
                let _ = run_git(
                    Some(repo_dir),
                    &["branch", &format!("--set-upstream-to={upstream}"), branch],
                );
            }
            Ok(())
        }
        Err(e) => {
            if e.to_string().contains("already exists") {
                Err(anyhow::Error::new(WorktreeExistsError {
                    path: target_path.to_path_buf(),
                }))
            } else {
                Err(anyhow!("create worktree: {e}"))
            }
        }
    }
}

/// Remove a linked worktree. When git no longer recognizes the path as a
/// working tree, prune stale administrative refs and delete the directory
/// directly. The per-tool project registry entry is pruned either way.
pub fn remove_worktree(repo_dir: &Path, worktree_path: &Path, force: bool) -> Result<()> {
    let target = worktree_path
        .to_str()
        .ok_or_else(|| anyhow!("non-UTF-8 worktree path"))?;
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(target);

    match run_git(Some(repo_dir), &args) {
        Ok(_) => {
            prune_claude_project(worktree_path);
            Ok(())
        }
        Err(e) if e.to_string().contains("is not a working tree") => {
            let _ = run_git(Some(repo_dir), &["worktree", "prune"]);
            std::fs::remove_dir_all(worktree_path)
                .with_context(|| format!("remove worktree directory {}", worktree_path.display()))?;
            prune_claude_project(worktree_path);
            Ok(())
        }
        Err(e) => Err(anyhow!("remove worktree: {e}")),
    }
}

// Claude Code keeps a per-directory entry in ~/.claude.json's "projects" map;
// a deleted worktree would otherwise linger there forever. Best-effort only.
fn prune_claude_project(worktree_path: &Path) {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    let registry = home.join(".claude.json");
    let Ok(data) = std::fs::read_to_string(&registry) else {
        return;
    };
    let Ok(mut doc) = serde_json::from_str::<serde_json::Value>(&data) else {
        return;
    };
    let key = worktree_path.to_string_lossy().into_owned();
    let Some(projects) = doc.get_mut("projects").and_then(|p| p.as_object_mut()) else {
        return;
    };
    if projects.remove(&key).is_none() {
        return;
    }
    let Ok(mut updated) = serde_json::to_string_pretty(&doc) else {
        return;
    };
    updated.push('\n');
    let tmp = registry.with_extension("json.tmp");
    if std::fs::write(&tmp, updated).is_ok() {
        let _ = std::fs::rename(&tmp, &registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .status()
            .expect("git available");
        assert!(status.success(), "git {args:?} failed in {}", dir.display());
    }

    /// An "upstream" repo with one commit on main, plus a bare clone of it
    /// laid out the way the syncer and orchestrator expect.
    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        git(&upstream, &["init", "-b", "main"]);
        git(&upstream, &["config", "user.email", "test@example.com"]);
        git(&upstream, &["config", "user.name", "test"]);
        std::fs::write(upstream.join("README.md"), "hello\n").unwrap();
        git(&upstream, &["add", "."]);
        git(&upstream, &["commit", "-m", "init"]);

        let bare = tmp.path().join("repos").join("myrepo.git");
        std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
        clone_bare(upstream.to_str().unwrap(), &bare).unwrap();
        (tmp, upstream, bare)
    }

    #[test]
    fn clone_bare_is_idempotent_and_configures_refspec() {
        let (_tmp, upstream, bare) = fixture();
        assert!(is_bare_repo(&bare));
        // Second call is a no-op, not an error.
        clone_bare(upstream.to_str().unwrap(), &bare).unwrap();

        let refspec = run_git(
            Some(bare.as_path()),
            &["config", "--get-all", "remote.origin.fetch"],
        )
        .unwrap();
        assert!(refspec.contains("+refs/heads/*:refs/remotes/origin/*"));
        assert!(!refspec.contains("refs/heads/*:refs/heads/*"));
    }

    #[test]
    fn create_worktree_from_origin_base() {
        let (tmp, _upstream, bare) = fixture();
        fetch_bare(&bare).unwrap();

        let wt = tmp.path().join("worktrees").join("swift-fox");
        std::fs::create_dir_all(wt.parent().unwrap()).unwrap();
        create_worktree(&bare, "swift-fox", &wt, "main").unwrap();

        assert!(wt.join("README.md").exists());
        assert!(branch_exists(&bare, "swift-fox"));
        assert!(!is_worktree_dirty(&wt).unwrap());

        std::fs::write(wt.join("scratch.txt"), "wip\n").unwrap();
        assert!(is_worktree_dirty(&wt).unwrap());
    }

    #[test]
    fn existing_target_surfaces_sentinel() {
        let (tmp, _upstream, bare) = fixture();
        let wt = tmp.path().join("worktrees").join("bold-bear");
        std::fs::create_dir_all(&wt).unwrap();
        std::fs::write(wt.join("occupied"), "").unwrap();

        let err = create_worktree(&bare, "bold-bear", &wt, "main").unwrap_err();
        assert!(
            err.downcast_ref::<WorktreeExistsError>().is_some(),
            "expected WorktreeExistsError, got: {err}"
        );
    }

    #[test]
    fn invalid_branch_rejected_before_touching_git() {
        let (tmp, _upstream, bare) = fixture();
        let wt = tmp.path().join("worktrees").join("bad");
        let err = create_worktree(&bare, ".bad", &wt, "main").unwrap_err();
        assert!(err.downcast_ref::<WorktreeExistsError>().is_none());
        assert!(!wt.exists());
    }

    #[test]
    fn remove_worktree_cleans_directory() {
        let (tmp, _upstream, bare) = fixture();
        let wt = tmp.path().join("worktrees").join("calm-owl");
        std::fs::create_dir_all(wt.parent().unwrap()).unwrap();
        create_worktree(&bare, "calm-owl", &wt, "main").unwrap();

        remove_worktree(&bare, &wt, false).unwrap();
        assert!(!wt.exists());
    }

    #[test]
    fn remove_dirty_worktree_needs_force() {
        let (tmp, _upstream, bare) = fixture();
        let wt = tmp.path().join("worktrees").join("dark-crow");
        std::fs::create_dir_all(wt.parent().unwrap()).unwrap();
        create_worktree(&bare, "dark-crow", &wt, "main").unwrap();
        std::fs::write(wt.join("uncommitted.txt"), "wip\n").unwrap();

        assert!(remove_worktree(&bare, &wt, false).is_err());
        remove_worktree(&bare, &wt, true).unwrap();
        assert!(!wt.exists());
    }

    #[test]
    fn fetch_bare_fails_for_missing_repo() {
        assert!(fetch_bare(Path::new("/nonexistent/path/that/does/not/exist.git")).is_err());
    }
}
