//! Route composition (spec.md §6), grounded in the teacher's
//! `api::routes::create_router` (public/protected nesting, Swagger UI
//! merge). This crate has no auth layer, so there is no public/protected
//! split — every route is mounted directly under `AppState`.

pub mod batch;
pub mod health;
pub mod logging;
pub mod summarize;
pub mod ws;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;
use crate::api::server::AppState;

pub fn create_router(state: AppState) -> Router {
    let summarize_api = summarize::router().merge(batch::router()).nest("/health", health::router());

    let api = Router::new().nest("/summarize", summarize_api).nest("/logging", logging::router());

    // `/batchProgressHub` is spec'd as a bare top-level path (SignalR-hub
    // style), not nested under `/api`, unlike every other endpoint.
    Router::new()
        .nest("/api", api)
        .merge(ws::router())
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
