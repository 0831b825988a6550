/// State management module
///
/// This module handles all persisted state:
/// - The SQLite thumbnail map and database identifier (store.rs)
/// - Shared data structures (data.rs)

pub mod data;
pub mod store;
