use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// The (host, owner, repo) triple a remote URL resolves to. Local bare-clone
/// and worktree paths are derived from it, so two groups pointing at the
/// same remote share one bare repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

/// Accepts `https://host/owner/repo[.git]` and scp-style
/// `git@host:owner/repo[.git]`.
pub fn parse_repo_url(raw: &str) -> Result<RepoLocation> {
    if let Some(rest) = raw.strip_prefix("git@") {
        let (host, path) = rest
            .split_once(':')
            .ok_or_else(|| anyhow!("invalid SSH URL: {raw}"))?;
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, repo) = path
            .split_once('/')
            .ok_or_else(|| anyhow!("cannot parse owner/repo from SSH URL: {raw}"))?;
        if host.is_empty() || owner.is_empty() || repo.is_empty() {
            return Err(anyhow!("cannot parse owner/repo from SSH URL: {raw}"));
        }
        return Ok(RepoLocation {
            host: host.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        });
    }

    let parsed = Url::parse(raw).map_err(|e| anyhow!("invalid URL {raw}: {e}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("missing host in URL: {raw}"))?
        .to_string();
    let path = parsed.path().trim_start_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path
        .split_once('/')
        .ok_or_else(|| anyhow!("cannot parse owner/repo from URL: {raw}"))?;
    if owner.is_empty() || repo.is_empty() {
        return Err(anyhow!("cannot parse owner/repo from URL: {raw}"));
    }
    Ok(RepoLocation {
        host,
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

/// `<base>/<host>/<owner>/<repo>.git`
pub fn bare_repo_path(base: &Path, loc: &RepoLocation) -> PathBuf {
    base.join(&loc.host)
        .join(&loc.owner)
        .join(format!("{}.git", loc.repo))
}

/// `<base>/<host>/<owner>/<repo>/<branch>`
pub fn worktree_path(base: &Path, loc: &RepoLocation, branch: &str) -> PathBuf {
    base.join(&loc.host)
        .join(&loc.owner)
        .join(&loc.repo)
        .join(branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepted_forms() {
        let cases = [
            ("https://github.com/owner/myrepo", "github.com", "owner", "myrepo"),
            ("https://github.com/owner/myrepo.git", "github.com", "owner", "myrepo"),
            ("https://gitlab.com/org/project.git", "gitlab.com", "org", "project"),
            ("git@github.com:owner/myrepo.git", "github.com", "owner", "myrepo"),
            ("git@github.com:owner/myrepo", "github.com", "owner", "myrepo"),
        ];
        for (input, host, owner, repo) in cases {
            let loc = parse_repo_url(input).unwrap_or_else(|e| panic!("{input}: {e}"));
            assert_eq!(loc.host, host, "{input}");
            assert_eq!(loc.owner, owner, "{input}");
            assert_eq!(loc.repo, repo, "{input}");
        }
    }

    #[test]
    fn parse_rejected_forms() {
        for input in ["not-a-url", "https://github.com/onlyowner", "git@github.com"] {
            assert!(parse_repo_url(input).is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn local_path_layout() {
        let loc = parse_repo_url("https://github.com/owner/myrepo").unwrap();
        assert_eq!(
            bare_repo_path(Path::new("/home/user/.agent-workspace/repos"), &loc),
            PathBuf::from("/home/user/.agent-workspace/repos/github.com/owner/myrepo.git")
        );
        assert_eq!(
            worktree_path(
                Path::new("/home/user/.agent-workspace/worktrees"),
                &loc,
                "swift-fox"
            ),
            PathBuf::from("/home/user/.agent-workspace/worktrees/github.com/owner/myrepo/swift-fox")
        );
    }

    #[test]
    fn bare_path_round_trips_to_same_location() {
        let loc = parse_repo_url("git@gitlab.com:team/service.git").unwrap();
        let bare = bare_repo_path(Path::new("/r"), &loc);
        let reconstructed = format!(
            "https://{}/{}/{}",
            bare.parent().unwrap().parent().unwrap().file_name().unwrap().to_str().unwrap(),
            bare.parent().unwrap().file_name().unwrap().to_str().unwrap(),
            bare.file_name().unwrap().to_str().unwrap().trim_end_matches(".git"),
        );
        assert_eq!(parse_repo_url(&reconstructed).unwrap(), loc);
    }
}
