use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo::PhotoRow;

#[derive(Debug, Deserialize)]
pub struct CreatePhotoRequest {
    pub title: String,
    pub description: String,
    pub image_key: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhotoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
}

#[derive(Debug, Deserialize)]
pub struct SignedUploadRequest {
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct SignedUploadResponse {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct SignedViewResponse {
    pub url: String,
}

/// Query string for the public feed (keyword + infinite scroll).
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub query: Option<String>,
    pub cursor: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    12
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Poster {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_key: String,
    pub created_at: OffsetDateTime,
    pub poster: Poster,
}

impl From<PhotoRow> for PhotoResponse {
    fn from(r: PhotoRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            image_key: r.image_key,
            created_at: r.created_at,
            poster: Poster {
                id: r.poster_id,
                name: r.poster_name,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoPage {
    pub items: Vec<PhotoResponse>,
    pub next_cursor: Option<i64>,
}
