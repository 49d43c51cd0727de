pub mod config;
pub mod domains;
pub mod infrastructure;
