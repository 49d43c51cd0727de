pub mod database;
pub mod events;
pub mod logging;
pub mod notify;
