use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Comment, CommentRow},
};

use super::{
    is_liked, likes_count, owner_join,
    pipeline::{PageRequest, Paginated, Pipeline, Sort, VIEWER},
    UpdateBuilder, OWNER_FIELDS,
};

pub const COMMENT_SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
    ("likesCount", "likes_count"),
];

/// Enriched comments: owner, the video they were left on and like stats.
/// Comments on videos the viewer may not see are filtered out.
pub(crate) fn comment_pipeline(source: &str, viewer: Option<i64>) -> Pipeline {
    Pipeline::new(source, viewer)
        .project(&[
            ("c.id", "id"),
            ("c.content", "content"),
            ("c.created_at", "created_at"),
            ("c.updated_at", "updated_at"),
        ])
        .lookup(
            "JOIN videos cv ON cv.id = c.video_id",
            &[
                ("cv.id", "video_id"),
                ("cv.title", "video_title"),
                ("cv.thumbnail", "video_thumbnail"),
            ],
        )
        .lookup(&owner_join("c.owner_id"), OWNER_FIELDS)
        .add_field(&likes_count("comment", "c.id"), "likes_count")
        .add_field(&is_liked("comment", "c.id"), "is_liked")
        .match_clause(&format!("cv.is_published = 1 OR cv.owner_id = {VIEWER}"), vec![])
}

#[derive(Debug, Clone, Copy)]
pub enum CommentScope {
    Video(i64),
    Author(i64),
}

pub async fn list_comments(
    pool: &SqlitePool,
    viewer: Option<i64>,
    scope: CommentScope,
    sort: Sort,
    page: PageRequest,
) -> Result<Paginated<CommentRow>, RequestError> {
    let pipeline = comment_pipeline("comments c", viewer);
    let pipeline = match scope {
        CommentScope::Video(video_id) => pipeline.match_eq("c.video_id", video_id),
        CommentScope::Author(owner_id) => pipeline.match_eq("c.owner_id", owner_id),
    };
    let comments = pipeline.sort(sort).paginate(pool, page).await?;
    Ok(comments)
}

pub async fn get_comment_row(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Option<CommentRow>, RequestError> {
    let comment = comment_pipeline("comments c", viewer)
        .match_eq("c.id", id)
        .fetch_optional(pool)
        .await?;
    Ok(comment)
}

pub async fn get_comment(pool: &SqlitePool, id: i64) -> Result<Option<Comment>, RequestError> {
    let comment = sqlx::query_as::<Sqlite, Comment>(
        "SELECT id, owner_id FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(comment)
}

pub async fn insert_comment(
    pool: &SqlitePool,
    video_id: i64,
    owner_id: i64,
    content: &str,
) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let id = sqlx::query::<Sqlite>("INSERT INTO comments (content, video_id, owner_id) VALUES (?, ?, ?)")
        .bind(content)
        .bind(video_id)
        .bind(owner_id)
        .execute(&mut tx)
        .await?
        .last_insert_rowid();
    tx.commit().await?;
    Ok(id)
}

pub async fn update_comment(pool: &SqlitePool, id: i64, content: String) -> Result<(), RequestError> {
    let updated = UpdateBuilder::new("comments")
        .set("content", Some(content))
        .execute(pool, id)
        .await?;
    if !updated {
        return Err(RequestError::not_found("Comment not found"));
    }
    Ok(())
}

/// Deletes the comment and the likes on it.
pub async fn delete_comment(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM likes WHERE target_type = 'comment' AND target_id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(RequestError::not_found("Comment not found"));
    }
    tx.commit().await?;
    Ok(())
}
