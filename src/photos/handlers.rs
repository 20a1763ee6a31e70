use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::dto::{
    CreatePhotoRequest, FeedQuery, OwnerQuery, PhotoPage, PhotoResponse, SearchRequest,
    SignedUploadRequest, SignedUploadResponse, SignedViewResponse, UpdatePhotoRequest,
};
use super::service;

#[instrument(skip(state, payload))]
pub async fn signed_upload(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(payload): Json<SignedUploadRequest>,
) -> ApiResult<Json<SignedUploadResponse>> {
    let resp = service::signed_upload_url(&state, &payload.mime_type).await?;
    Ok(Json(resp))
}

#[instrument(skip(state))]
pub async fn signed_view(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(key): Path<String>,
) -> ApiResult<Json<SignedViewResponse>> {
    let url = service::signed_view_url(&state, &key).await?;
    Ok(Json(SignedViewResponse { url }))
}

#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePhotoRequest>,
) -> ApiResult<(StatusCode, Json<PhotoResponse>)> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Title must not be empty".into()));
    }
    if payload.image_key.trim().is_empty() {
        return Err(ApiError::Validation("image_key must not be empty".into()));
    }
    let photo = service::create(
        &state,
        user_id,
        payload.title.trim(),
        &payload.description,
        &payload.image_key,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

#[instrument(skip(state))]
pub async fn feed(
    State(state): State<AppState>,
    Query(q): Query<FeedQuery>,
) -> ApiResult<Json<PhotoPage>> {
    let page = service::feed(&state, q.query.as_deref(), q.cursor, q.limit).await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn owner(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<PhotoResponse>>> {
    let items = service::owner(&state, user_id, q.query.as_deref()).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn recent(State(state): State<AppState>) -> ApiResult<Json<Vec<PhotoResponse>>> {
    let items = service::recent(&state).await?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> ApiResult<Json<Vec<PhotoResponse>>> {
    let items = service::search(&state, &payload.keyword).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PhotoResponse>> {
    let photo = service::get(&state, id).await?;
    Ok(Json(photo))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePhotoRequest>,
) -> ApiResult<Json<PhotoResponse>> {
    let photo = service::update(
        &state,
        id,
        user_id,
        payload.title.as_deref(),
        payload.description.as_deref(),
        payload.image_key.as_deref(),
    )
    .await?;
    Ok(Json(photo))
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    service::delete(&state, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
