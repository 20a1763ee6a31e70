use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// Photo record as stored. `image_key` is the object-storage key the client
/// uploaded to via a pre-signed URL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_key: String,
    pub poster_id: i64,
    pub created_at: OffsetDateTime,
}

/// Photo joined with the poster's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct PhotoRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_key: String,
    pub poster_id: i64,
    pub created_at: OffsetDateTime,
    pub poster_name: String,
}

const ROW_SELECT: &str = r#"
    SELECT p.id, p.title, p.description, p.image_key, p.poster_id, p.created_at,
           u.name AS poster_name
      FROM photos p
      JOIN users u ON u.id = p.poster_id
"#;

pub async fn insert(
    db: &PgPool,
    poster_id: i64,
    title: &str,
    description: &str,
    image_key: &str,
) -> anyhow::Result<PhotoRow> {
    let row = sqlx::query_as::<_, PhotoRow>(
        r#"
        WITH inserted AS (
            INSERT INTO photos (title, description, image_key, poster_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, description, image_key, poster_id, created_at
        )
        SELECT i.id, i.title, i.description, i.image_key, i.poster_id, i.created_at,
               u.name AS poster_name
          FROM inserted i
          JOIN users u ON u.id = i.poster_id
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(image_key)
    .bind(poster_id)
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Keyword + cursor page, newest first. `cursor` is the id of the last item
/// of the previous page; callers ask for one extra row to detect "more".
pub async fn find_page(
    db: &PgPool,
    query: Option<&str>,
    cursor: Option<i64>,
    limit: i64,
) -> anyhow::Result<Vec<PhotoRow>> {
    let rows = sqlx::query_as::<_, PhotoRow>(&format!(
        r#"{ROW_SELECT}
         WHERE ($1::text IS NULL OR p.title ILIKE '%' || $1 || '%' OR p.description ILIKE '%' || $1 || '%')
           AND ($2::bigint IS NULL OR p.id < $2)
         ORDER BY p.id DESC
         LIMIT $3
        "#
    ))
    .bind(query)
    .bind(cursor)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_owner(
    db: &PgPool,
    poster_id: i64,
    query: Option<&str>,
) -> anyhow::Result<Vec<PhotoRow>> {
    let rows = sqlx::query_as::<_, PhotoRow>(&format!(
        r#"{ROW_SELECT}
         WHERE p.poster_id = $1
           AND ($2::text IS NULL OR p.title ILIKE '%' || $2 || '%' OR p.description ILIKE '%' || $2 || '%')
         ORDER BY p.created_at DESC
        "#
    ))
    .bind(poster_id)
    .bind(query)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn recent(db: &PgPool, limit: i64) -> anyhow::Result<Vec<PhotoRow>> {
    let rows = sqlx::query_as::<_, PhotoRow>(&format!(
        "{ROW_SELECT} ORDER BY p.created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn search(db: &PgPool, keyword: &str) -> anyhow::Result<Vec<PhotoRow>> {
    let rows = sqlx::query_as::<_, PhotoRow>(&format!(
        r#"{ROW_SELECT}
         WHERE p.title ILIKE '%' || $1 || '%' OR p.description ILIKE '%' || $1 || '%'
         ORDER BY p.created_at DESC
        "#
    ))
    .bind(keyword)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<PhotoRow>> {
    let row = sqlx::query_as::<_, PhotoRow>(&format!("{ROW_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Bare row for the mutation path (ownership check before update/delete).
pub async fn find_bare(db: &PgPool, id: i64) -> anyhow::Result<Option<Photo>> {
    let row = sqlx::query_as::<_, Photo>(
        "SELECT id, title, description, image_key, poster_id, created_at FROM photos WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn update(
    db: &PgPool,
    id: i64,
    title: Option<&str>,
    description: Option<&str>,
    image_key: Option<&str>,
) -> anyhow::Result<PhotoRow> {
    let row = sqlx::query_as::<_, PhotoRow>(
        r#"
        WITH updated AS (
            UPDATE photos
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   image_key = COALESCE($4, image_key)
             WHERE id = $1
            RETURNING id, title, description, image_key, poster_id, created_at
        )
        SELECT u2.id, u2.title, u2.description, u2.image_key, u2.poster_id, u2.created_at,
               u.name AS poster_name
          FROM updated u2
          JOIN users u ON u.id = u2.poster_id
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(image_key)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM photos WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
