//! Route handlers, grouped by resource (spec §6).

pub mod chat;
pub mod jobs;
pub mod plans;
pub mod sessions;
