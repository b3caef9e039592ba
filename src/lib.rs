pub mod clustering;
pub mod config;
pub mod db;
pub mod entity;
pub mod environment;
pub mod error;
pub mod logging;
pub mod store;

pub use clustering::ClusterEngine;
pub use config::ClusterConfig;
pub use db::Database;
pub use error::{ClusterError, Result};
pub use store::ClusterStore;

pub const TARGET_CLUSTER: &str = "cluster";
pub const TARGET_SCORING: &str = "scoring";
pub const TARGET_DB: &str = "db_query";
