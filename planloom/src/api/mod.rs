//! HTTP API (spec §6): the chat turn endpoint, plan/task/job inspection
//! routes, and an SSE job-progress stream, all over the subsystems in
//! [`crate::agent`], [`crate::plan`], [`crate::jobs`], and [`crate::session`].

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use middleware::cors_layer;
pub use response::{ErrorResponse, PaginatedResponse, SuccessResponse};
pub use routes::create_router;
pub use state::AppState;

/// Re-export commonly used items.
pub mod prelude {
    pub use crate::api::error::{ApiError, ApiResult};
    pub use crate::api::response::*;
    pub use crate::api::state::AppState;
}
