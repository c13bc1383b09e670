//! HTTP/WebSocket surface (spec.md §6), grounded in the teacher's `api`
//! module layout (`error`, `models`, `server`, `routes`, `openapi`).

pub mod error;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, AppState};
