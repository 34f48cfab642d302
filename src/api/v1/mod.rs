//! Versioned API endpoints

pub mod translate;

use axum::{routing::post, Router};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new().route("/translate", post(translate::translate))
}
