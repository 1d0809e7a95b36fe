pub mod build;
pub mod dev;
pub mod routes;
pub mod start;
