pub mod git;
pub mod monitor;
pub mod sessions;
pub mod syncer;
pub mod tmux;
