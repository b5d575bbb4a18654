use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{Tweet, TweetRow},
};

use super::{
    is_liked, likes_count, owner_join,
    pipeline::{PageRequest, Paginated, Pipeline, Sort},
    UpdateBuilder, OWNER_FIELDS,
};

pub const TWEET_SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
    ("likesCount", "likes_count"),
];

pub(crate) fn tweet_pipeline(source: &str, viewer: Option<i64>) -> Pipeline {
    Pipeline::new(source, viewer)
        .project(&[
            ("t.id", "id"),
            ("t.content", "content"),
            ("t.created_at", "created_at"),
            ("t.updated_at", "updated_at"),
        ])
        .lookup(&owner_join("t.owner_id"), OWNER_FIELDS)
        .add_field(&likes_count("tweet", "t.id"), "likes_count")
        .add_field(&is_liked("tweet", "t.id"), "is_liked")
}

#[derive(Debug, Clone, Copy)]
pub enum TweetScope {
    All,
    Author(i64),
    /// The user's own tweets and those of every channel they subscribe to.
    Feed(i64),
}

pub async fn list_tweets(
    pool: &SqlitePool,
    viewer: Option<i64>,
    scope: TweetScope,
    query: Option<&str>,
    sort: Sort,
    page: PageRequest,
) -> Result<Paginated<TweetRow>, RequestError> {
    let pipeline = tweet_pipeline("tweets t", viewer);
    let pipeline = match scope {
        TweetScope::All => pipeline,
        TweetScope::Author(owner_id) => pipeline.match_eq("t.owner_id", owner_id),
        TweetScope::Feed(user_id) => pipeline.match_clause(
            "t.owner_id = ? OR t.owner_id IN \
             (SELECT channel_id FROM subscriptions WHERE subscriber_id = ?)",
            vec![user_id.into(), user_id.into()],
        ),
    };
    let tweets = pipeline
        .search(&["t.content"], query)
        .sort(sort)
        .paginate(pool, page)
        .await?;
    Ok(tweets)
}

pub async fn get_tweet_row(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Option<TweetRow>, RequestError> {
    let tweet = tweet_pipeline("tweets t", viewer)
        .match_eq("t.id", id)
        .fetch_optional(pool)
        .await?;
    Ok(tweet)
}

pub async fn get_tweet(pool: &SqlitePool, id: i64) -> Result<Option<Tweet>, RequestError> {
    let tweet = sqlx::query_as::<Sqlite, Tweet>(
        "SELECT id, owner_id FROM tweets WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(tweet)
}

pub async fn insert_tweet(pool: &SqlitePool, owner_id: i64, content: &str) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let id = sqlx::query::<Sqlite>("INSERT INTO tweets (content, owner_id) VALUES (?, ?)")
        .bind(content)
        .bind(owner_id)
        .execute(&mut tx)
        .await?
        .last_insert_rowid();
    tx.commit().await?;
    Ok(id)
}

pub async fn update_tweet(pool: &SqlitePool, id: i64, content: String) -> Result<(), RequestError> {
    let updated = UpdateBuilder::new("tweets")
        .set("content", Some(content))
        .execute(pool, id)
        .await?;
    if !updated {
        return Err(RequestError::not_found("Tweet not found"));
    }
    Ok(())
}

/// Deletes the tweet and the likes on it.
pub async fn delete_tweet(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM likes WHERE target_type = 'tweet' AND target_id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM tweets WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(RequestError::not_found("Tweet not found"));
    }
    tx.commit().await?;
    Ok(())
}
