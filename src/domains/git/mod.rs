pub mod branches;
pub mod remote;
pub mod worktrees;

pub use branches::{sanitize_branch_name, validate_branch_name};
pub use remote::{bare_repo_path, parse_repo_url, worktree_path, RepoLocation};
pub use worktrees::{
    branch_exists, clone_bare, create_worktree, fetch_bare, is_bare_repo, is_worktree_dirty,
    remove_worktree, WorktreeExistsError,
};
