use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{CommentRow, LikeKind, LikeSummary, LikeTarget, Stamped, TweetRow, VideoRow},
};

use super::{
    comment_pipeline,
    pipeline::{PageRequest, Paginated, Sort},
    tweet_pipeline, video_pipeline,
};

/// The outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub is_liked: bool,
    pub likes_count: i64,
}

/// Whether the like target exists. Videos, and comments on videos, count only
/// when the video is published or owned by `user_id`.
pub async fn like_target_exists(
    pool: &SqlitePool,
    target: LikeTarget,
    user_id: Option<i64>,
) -> Result<bool, RequestError> {
    let query = match target.kind() {
        LikeKind::Video => sqlx::query_as::<Sqlite, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM videos WHERE id = ? AND (is_published = 1 OR owner_id = ?))",
        )
        .bind(target.id())
        .bind(user_id),
        LikeKind::Comment => sqlx::query_as::<Sqlite, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM comments c JOIN videos cv ON cv.id = c.video_id \
             WHERE c.id = ? AND (cv.is_published = 1 OR cv.owner_id = ?))",
        )
        .bind(target.id())
        .bind(user_id),
        LikeKind::Tweet => {
            sqlx::query_as::<Sqlite, (bool,)>("SELECT EXISTS (SELECT 1 FROM tweets WHERE id = ?)")
                .bind(target.id())
        }
    };
    let (exists,) = query.fetch_one(pool).await?;
    Ok(exists)
}

/// Removes the user's like on `target` if there is one, otherwise adds it.
/// Both branches run in one write transaction and the table keeps a unique
/// key per (target, user), so concurrent toggles cannot leave duplicates.
pub async fn toggle_like(
    pool: &SqlitePool,
    target: LikeTarget,
    user_id: i64,
) -> Result<LikeState, RequestError> {
    let kind = target.kind().as_str();
    let mut tx = pool.begin().await?;
    let removed = sqlx::query(
        "DELETE FROM likes WHERE target_type = ? AND target_id = ? AND liked_by = ?",
    )
    .bind(kind)
    .bind(target.id())
    .bind(user_id)
    .execute(&mut tx)
    .await?;
    let is_liked = if removed.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO likes (target_type, target_id, liked_by) VALUES (?, ?, ?) \
             ON CONFLICT (target_type, target_id, liked_by) DO NOTHING",
        )
        .bind(kind)
        .bind(target.id())
        .bind(user_id)
        .execute(&mut tx)
        .await?;
        true
    } else {
        false
    };
    let (likes_count,) = sqlx::query_as::<Sqlite, (i64,)>(
        "SELECT COUNT(*) FROM likes WHERE target_type = ? AND target_id = ?",
    )
    .bind(kind)
    .bind(target.id())
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    tracing::debug!(?target, user_id, is_liked, "toggled like");
    Ok(LikeState {
        is_liked,
        likes_count,
    })
}

pub async fn like_status(
    pool: &SqlitePool,
    target: LikeTarget,
    user_id: i64,
) -> Result<bool, RequestError> {
    let (liked,) = sqlx::query_as::<Sqlite, (bool,)>(
        "SELECT EXISTS (SELECT 1 FROM likes WHERE target_type = ? AND target_id = ? AND liked_by = ?)",
    )
    .bind(target.kind().as_str())
    .bind(target.id())
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(liked)
}

pub async fn like_count(pool: &SqlitePool, target: LikeTarget) -> Result<i64, RequestError> {
    let (count,) = sqlx::query_as::<Sqlite, (i64,)>(
        "SELECT COUNT(*) FROM likes WHERE target_type = ? AND target_id = ?",
    )
    .bind(target.kind().as_str())
    .bind(target.id())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

fn liked_join(kind: LikeKind, id_column: &str) -> String {
    format!(
        "JOIN likes lk ON lk.target_type = '{}' AND lk.target_id = {id_column}",
        kind.as_str()
    )
}

/// Published videos the user liked, most recently liked first.
pub async fn get_liked_videos(
    pool: &SqlitePool,
    user_id: i64,
    page: PageRequest,
) -> Result<Paginated<Stamped<VideoRow>>, RequestError> {
    let source = format!("videos v {}", liked_join(LikeKind::Video, "v.id"));
    let videos = video_pipeline(&source, Some(user_id))
        .add_field("lk.created_at", "stamped_at")
        .match_eq("lk.liked_by", user_id)
        .match_eq("v.is_published", 1_i64)
        .sort(Sort::desc("stamped_at"))
        .paginate(pool, page)
        .await?;
    Ok(videos)
}

pub async fn get_liked_comments(
    pool: &SqlitePool,
    user_id: i64,
    page: PageRequest,
) -> Result<Paginated<Stamped<CommentRow>>, RequestError> {
    let source = format!("comments c {}", liked_join(LikeKind::Comment, "c.id"));
    let comments = comment_pipeline(&source, Some(user_id))
        .add_field("lk.created_at", "stamped_at")
        .match_eq("lk.liked_by", user_id)
        .sort(Sort::desc("stamped_at"))
        .paginate(pool, page)
        .await?;
    Ok(comments)
}

pub async fn get_liked_tweets(
    pool: &SqlitePool,
    user_id: i64,
    page: PageRequest,
) -> Result<Paginated<Stamped<TweetRow>>, RequestError> {
    let source = format!("tweets t {}", liked_join(LikeKind::Tweet, "t.id"));
    let tweets = tweet_pipeline(&source, Some(user_id))
        .add_field("lk.created_at", "stamped_at")
        .match_eq("lk.liked_by", user_id)
        .sort(Sort::desc("stamped_at"))
        .paginate(pool, page)
        .await?;
    Ok(tweets)
}

/// Counts what the liked lists show: likes on hidden videos, and on comments
/// left under them, are left out.
pub async fn get_like_summary(pool: &SqlitePool, user_id: i64) -> Result<LikeSummary, RequestError> {
    let summary = sqlx::query_as::<Sqlite, LikeSummary>(
        r#"
        SELECT COUNT(*)                                          AS total_likes,
               COALESCE(SUM(l.target_type = 'video'), 0)         AS video_likes,
               COALESCE(SUM(l.target_type = 'comment'), 0)       AS comment_likes,
               COALESCE(SUM(l.target_type = 'tweet'), 0)         AS tweet_likes
        FROM likes l
        LEFT JOIN videos v ON l.target_type = 'video' AND v.id = l.target_id
        LEFT JOIN comments c ON l.target_type = 'comment' AND c.id = l.target_id
        LEFT JOIN videos cv ON cv.id = c.video_id
        WHERE l.liked_by = ?
          AND (l.target_type = 'tweet'
               OR v.is_published = 1
               OR cv.is_published = 1
               OR cv.owner_id = l.liked_by)
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(summary)
}
