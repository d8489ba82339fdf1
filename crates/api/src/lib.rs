//! HTTP API: server wiring, routing, and request/response mapping for
//! backup scheduling.

pub mod app;
pub mod config;
pub mod context;
pub mod gateway;
pub mod middleware;
