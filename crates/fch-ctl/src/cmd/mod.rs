//! CLI command modules.

pub mod http;
pub mod query;
pub mod routers;
