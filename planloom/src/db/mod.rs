//! Database layer: a main registry pool, a small LRU of per-plan file pools,
//! and the repositories that operate over them (spec §4.1).

pub mod connection;
pub mod error;
pub mod models;
pub mod plan_store;
pub mod registry;
pub mod repositories;
pub mod schema;

pub use connection::{DatabaseConnection, DatabasePool, PoolStatistics};
pub use error::{DatabaseError, DbResult};
pub use plan_store::PlanFileCache;
