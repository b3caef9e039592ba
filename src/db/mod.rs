// Re-export the Database struct and other public items
mod cluster;
pub mod core;
mod gazetteer;
mod item;
mod schema;
mod store;

// Re-export Database and essential traits
pub use self::core::Database;
pub use self::core::DbLockErrorExt;
