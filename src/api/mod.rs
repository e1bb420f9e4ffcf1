pub mod auth;
pub mod error;
mod travel;
mod users;
pub mod validation;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use error::{ApiError, ApiJson, ErrorCode};

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public apart from register-admin, which checks its own extractor)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/register-admin", post(auth::register_admin))
        .route("/login", post(auth::login));

    // Every travel handler takes an AuthContext, so all of these require a token
    let travel_routes = Router::new()
        .route("/", get(travel::list_travels).post(travel::create_travel))
        .route(
            "/:id",
            get(travel::get_travel)
                .put(travel::update_travel)
                .delete(travel::delete_travel),
        )
        .route("/:id/status", patch(travel::update_travel_status));

    // Admin only
    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id/status", put(users::update_user_status));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/travel", travel_routes)
        .nest("/api/user", user_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
