use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod repo;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/photos/signed-upload", post(handlers::signed_upload))
        .route("/photos/signed-view/*key", get(handlers::signed_view))
        .route("/photos", post(handlers::create).get(handlers::feed))
        .route("/photos/owner", get(handlers::owner))
        .route("/photos/recent", get(handlers::recent))
        .route("/photos/search", post(handlers::search))
        .route(
            "/photos/:id",
            get(handlers::get_one)
                .patch(handlers::update)
                .delete(handlers::delete),
        )
}
