//! Plan Repository & Plan Tree (C1/C2, spec §3, §4.2): the data model and
//! storage service for plans, their task trees, and dependency graphs.

pub mod anchor;
pub mod error;
pub mod node;
pub mod repository;
pub mod tree;

pub use anchor::Anchor;
pub use error::{PlanError, PlanResult};
pub use node::{ContextSection, ExecutionResult, PlanNode, PlanNodeStatus};
pub use repository::{NewTask, PlanRepository, TaskUpdate, UpsertNode};
pub use tree::{PlanMeta, PlanTree};
