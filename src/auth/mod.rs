use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod dto;
pub(crate) mod extractors;
mod google;
pub mod handlers;
pub mod jwt;
mod password;
pub mod repo;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/verify-email", get(handlers::verify_email))
        .route("/auth/google", get(handlers::google_start))
        .route("/auth/google/callback", get(handlers::google_callback))
}
