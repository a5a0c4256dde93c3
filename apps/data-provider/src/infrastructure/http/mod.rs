//! HTTP/REST API adapter.
//!
//! Inbound adapter implementing the data provider's REST endpoints on top of
//! the session guardian and bar aggregator.
//!
//! # Endpoints
//!
//! - `GET /api/positions` - Open positions
//! - `POST /api/historical` - Daily bars per symbol
//! - `POST /api/scanner` - Market scanner rows
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe
//! - `GET /readyz` - Readiness probe (a login has succeeded)
//! - `GET /metrics` - Prometheus metrics in text format

mod controller;
mod error;
mod request;
mod response;
mod server;

pub use controller::{AppState, create_router};
pub use error::ApiError;
pub use request::*;
pub use response::*;
pub use server::{HttpServer, HttpServerError};
