use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::dto::{PhotoPage, PhotoResponse, SignedUploadResponse};
use super::repo;

/// Upload URLs are short; the client requests one right before PUTting.
const UPLOAD_TTL_SECS: u64 = 5 * 60;
const VIEW_TTL_SECS: u64 = 10 * 60;

const MAX_PAGE_LIMIT: i64 = 50;
const RECENT_LIMIT: i64 = 12;

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Mint a pre-signed PUT under a fresh generated key. The key comes back to
/// us later as `image_key` on the created photo.
pub async fn signed_upload_url(st: &AppState, mime_type: &str) -> ApiResult<SignedUploadResponse> {
    let ext = ext_from_mime(mime_type)
        .ok_or_else(|| ApiError::Validation(format!("Unsupported image type: {}", mime_type)))?;
    let key = format!("photos/{}.{}", Uuid::new_v4(), ext);
    let url = st
        .storage
        .presign_put(&key, mime_type, UPLOAD_TTL_SECS)
        .await?;
    Ok(SignedUploadResponse { url, key })
}

pub async fn signed_view_url(st: &AppState, key: &str) -> ApiResult<String> {
    let url = st.storage.presign_get(key, VIEW_TTL_SECS).await?;
    Ok(url)
}

pub async fn create(
    st: &AppState,
    poster_id: i64,
    title: &str,
    description: &str,
    image_key: &str,
) -> ApiResult<PhotoResponse> {
    let row = repo::insert(&st.db, poster_id, title, description, image_key).await?;
    info!(photo_id = %row.id, poster_id = %poster_id, "photo created");
    Ok(row.into())
}

pub async fn feed(
    st: &AppState,
    query: Option<&str>,
    cursor: Option<i64>,
    limit: i64,
) -> ApiResult<PhotoPage> {
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);
    // Fetch one extra row to know whether a next page exists.
    let mut rows = repo::find_page(&st.db, query, cursor, limit + 1).await?;
    let next_cursor = if rows.len() as i64 > limit {
        rows.truncate(limit as usize);
        rows.last().map(|r| r.id)
    } else {
        None
    };
    Ok(PhotoPage {
        items: rows.into_iter().map(Into::into).collect(),
        next_cursor,
    })
}

pub async fn owner(
    st: &AppState,
    poster_id: i64,
    query: Option<&str>,
) -> ApiResult<Vec<PhotoResponse>> {
    let rows = repo::list_by_owner(&st.db, poster_id, query).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn recent(st: &AppState) -> ApiResult<Vec<PhotoResponse>> {
    let rows = repo::recent(&st.db, RECENT_LIMIT).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn search(st: &AppState, keyword: &str) -> ApiResult<Vec<PhotoResponse>> {
    let rows = repo::search(&st.db, keyword).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn get(st: &AppState, id: i64) -> ApiResult<PhotoResponse> {
    let row = repo::find_by_id(&st.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Photo not found".into()))?;
    Ok(row.into())
}

/// Load + ownership gate shared by update and delete. A photo that exists
/// but belongs to someone else is a 403, never a silent success.
async fn owned_photo(st: &AppState, id: i64, user_id: i64) -> ApiResult<repo::Photo> {
    let photo = repo::find_bare(&st.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Photo not found".into()))?;
    if photo.poster_id != user_id {
        warn!(photo_id = %id, user_id = %user_id, owner_id = %photo.poster_id, "ownership mismatch");
        return Err(ApiError::Forbidden("Not the photo owner".into()));
    }
    Ok(photo)
}

pub async fn update(
    st: &AppState,
    id: i64,
    user_id: i64,
    title: Option<&str>,
    description: Option<&str>,
    image_key: Option<&str>,
) -> ApiResult<PhotoResponse> {
    owned_photo(st, id, user_id).await?;
    let row = repo::update(&st.db, id, title, description, image_key).await?;
    Ok(row.into())
}

pub async fn delete(st: &AppState, id: i64, user_id: i64) -> ApiResult<()> {
    let photo = owned_photo(st, id, user_id).await?;
    repo::delete(&st.db, id).await?;

    // The record is gone; a leftover object is only wasted storage, so a
    // failed delete is logged and not surfaced.
    if let Err(e) = st.storage.delete_object(&photo.image_key).await {
        warn!(error = %e, key = %photo.image_key, "storage object delete failed");
    }
    info!(photo_id = %id, user_id = %user_id, "photo deleted");
    Ok(())
}
