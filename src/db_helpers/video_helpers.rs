use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    media::UploadedMedia,
    models::{Video, VideoRow},
};

use super::{
    is_liked, is_subscribed, likes_count, owner_join,
    pipeline::{PageRequest, Paginated, Pipeline, Sort, VIEWER},
    subscribers_count, UpdateBuilder, NOW, OWNER_FIELDS,
};

pub const VIDEO_SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
    ("title", "title"),
    ("views", "views"),
    ("duration", "duration"),
    ("likesCount", "likes_count"),
];

const VIDEO_COLUMNS: &str = "id, video_file_handle, thumbnail_handle, is_published, owner_id";

/// Enriched videos: owner summary with channel stats, like count and the
/// viewer's like. `source` must bind the videos table as `v`.
pub(crate) fn video_pipeline(source: &str, viewer: Option<i64>) -> Pipeline {
    Pipeline::new(source, viewer)
        .project(&[
            ("v.id", "id"),
            ("v.video_file", "video_file"),
            ("v.thumbnail", "thumbnail"),
            ("v.title", "title"),
            ("v.description", "description"),
            ("v.duration", "duration"),
            ("v.views", "views"),
            ("v.is_published", "is_published"),
            ("v.created_at", "created_at"),
            ("v.updated_at", "updated_at"),
        ])
        .lookup(&owner_join("v.owner_id"), OWNER_FIELDS)
        .add_field(&subscribers_count("v.owner_id"), "owner_subscribers_count")
        .add_field(&is_subscribed("v.owner_id"), "owner_is_subscribed")
        .add_field(&likes_count("video", "v.id"), "likes_count")
        .add_field(&is_liked("video", "v.id"), "is_liked")
}

pub struct VideoFilter {
    pub owner_id: Option<i64>,
    pub query: Option<String>,
    pub sort: Sort,
}

pub struct NewVideo<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub video_file: &'a UploadedMedia,
    pub thumbnail: &'a UploadedMedia,
    pub owner_id: i64,
}

pub async fn list_videos(
    pool: &SqlitePool,
    viewer: Option<i64>,
    filter: VideoFilter,
    page: PageRequest,
) -> Result<Paginated<VideoRow>, RequestError> {
    let mut pipeline = video_pipeline("videos v", viewer).match_eq("v.is_published", 1_i64);
    if let Some(owner_id) = filter.owner_id {
        pipeline = pipeline.match_eq("v.owner_id", owner_id);
    }
    let videos = pipeline
        .search(&["v.title", "v.description"], filter.query.as_deref())
        .sort(filter.sort)
        .paginate(pool, page)
        .await?;
    Ok(videos)
}

/// A single enriched video. Unpublished videos are only returned to their owner.
pub async fn get_video_row(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Option<VideoRow>, RequestError> {
    let video = video_pipeline("videos v", viewer)
        .match_eq("v.id", id)
        .match_clause(&format!("v.is_published = 1 OR v.owner_id = {VIEWER}"), vec![])
        .fetch_optional(pool)
        .await?;
    Ok(video)
}

pub async fn get_video(pool: &SqlitePool, id: i64) -> Result<Option<Video>, RequestError> {
    let query = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?");
    let video = sqlx::query_as::<Sqlite, Video>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(video)
}

/// Counts one view and, for a signed-in viewer, moves the video to the top
/// of their watch history. Returns `false` when the viewer may not see it.
pub async fn record_view(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<bool, RequestError> {
    let mut tx = pool.begin().await?;
    let counted = sqlx::query(
        "UPDATE videos SET views = views + 1 WHERE id = ? AND (is_published = 1 OR owner_id = ?)",
    )
    .bind(id)
    .bind(viewer)
    .execute(&mut tx)
    .await?;
    if counted.rows_affected() == 0 {
        return Ok(false);
    }
    if let Some(user_id) = viewer {
        let query = format!(
            "INSERT INTO watch_history (user_id, video_id) VALUES (?, ?) \
             ON CONFLICT (user_id, video_id) DO UPDATE SET watched_at = {NOW}"
        );
        sqlx::query(&query)
            .bind(user_id)
            .bind(id)
            .execute(&mut tx)
            .await?;
    }
    tx.commit().await?;
    Ok(true)
}

pub async fn insert_video(pool: &SqlitePool, video: NewVideo<'_>) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let id = sqlx::query::<Sqlite>(
        r#"
        INSERT INTO videos (video_file, video_file_handle, thumbnail, thumbnail_handle, title, description, duration, owner_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&video.video_file.url)
    .bind(&video.video_file.handle)
    .bind(&video.thumbnail.url)
    .bind(&video.thumbnail.handle)
    .bind(video.title)
    .bind(video.description)
    .bind(video.video_file.duration.unwrap_or(0.0))
    .bind(video.owner_id)
    .execute(&mut tx)
    .await?
    .last_insert_rowid();
    tx.commit().await?;
    Ok(id)
}

pub async fn update_video(
    pool: &SqlitePool,
    id: i64,
    title: Option<String>,
    description: Option<String>,
) -> Result<(), RequestError> {
    let updated = UpdateBuilder::new("videos")
        .set("title", title)
        .set("description", description)
        .execute(pool, id)
        .await?;
    if !updated {
        return Err(RequestError::not_found("Video not found"));
    }
    Ok(())
}

/// Flips the published flag and returns the new value.
pub async fn toggle_publish(pool: &SqlitePool, id: i64) -> Result<bool, RequestError> {
    let mut tx = pool.begin().await?;
    let flipped = sqlx::query::<Sqlite>(&format!(
        "UPDATE videos SET is_published = NOT is_published, updated_at = {NOW} WHERE id = ?"
    ))
    .bind(id)
    .execute(&mut tx)
    .await?;
    if flipped.rows_affected() == 0 {
        return Err(RequestError::not_found("Video not found"));
    }
    let (published,) =
        sqlx::query_as::<Sqlite, (bool,)>("SELECT is_published FROM videos WHERE id = ?")
            .bind(id)
            .fetch_one(&mut tx)
            .await?;
    tx.commit().await?;
    Ok(published)
}

/// Deletes the video and everything that points at it, children first, in
/// one transaction.
pub async fn delete_video_cascade(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        "DELETE FROM likes WHERE target_type = 'comment' \
         AND target_id IN (SELECT id FROM comments WHERE video_id = ?)",
    )
    .bind(id)
    .execute(&mut tx)
    .await?;
    for statement in [
        "DELETE FROM likes WHERE target_type = 'video' AND target_id = ?",
        "DELETE FROM comments WHERE video_id = ?",
        "DELETE FROM playlist_videos WHERE video_id = ?",
        "DELETE FROM watch_history WHERE video_id = ?",
    ] {
        sqlx::query(statement).bind(id).execute(&mut tx).await?;
    }
    let deleted = sqlx::query("DELETE FROM videos WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(RequestError::not_found("Video not found"));
    }
    tx.commit().await?;
    tracing::info!(video_id = id, "deleted video and its dependents");
    Ok(())
}
