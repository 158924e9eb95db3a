pub mod app;
pub mod cors;
pub mod error_boundary;
pub mod observability;
pub mod rate_limit;
pub mod routes;
pub mod schemas;
pub mod shutdown;
pub mod state;
pub mod validation;
