//! API middleware components

pub mod logging;
pub mod tenant;

pub use logging::logging_middleware;
pub use tenant::{Tenant, TENANT_HEADER};
