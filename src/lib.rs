// Library exports for Blobby
// This allows integration tests and external code to use Blobby modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod mail;
pub mod routes;
pub mod sanitize;
pub mod state;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::home::index))
        .route("/all_posts", get(routes::home::all_posts))
        .route("/about", get(routes::home::about))
        .merge(routes::auth::router())
        .merge(routes::posts::router())
        .merge(routes::account::router())
        .merge(routes::contact::router())
        .with_state(state)
}
