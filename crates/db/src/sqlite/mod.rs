//! SQLite-Backend der Audit-Senke

pub mod audit;
pub mod pool;

pub use pool::SqliteDb;
