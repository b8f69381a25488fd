pub mod changes;
pub mod listing;
pub mod manager;
pub mod models;

pub use manager::{DatabaseError, DatabaseManager};
