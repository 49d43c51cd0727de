pub mod connection;
pub mod db_accounts;
pub mod db_metadata;
pub mod db_schema;

pub use connection::Database;
pub use db_accounts::AccountMethods;
pub use db_metadata::MetadataMethods;
pub use db_schema::initialize_schema;
