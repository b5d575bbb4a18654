use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    models::{ChannelRow, Stamped},
};

use super::{
    is_subscribed,
    pipeline::{PageRequest, Paginated, Pipeline, Sort},
    subscribers_count,
};

/// Channels as listed on subscription pages. `source` binds users as `u`.
fn channel_pipeline(source: &str, viewer: Option<i64>) -> Pipeline {
    Pipeline::new(source, viewer)
        .project(&[
            ("u.id", "id"),
            ("u.username", "username"),
            ("u.full_name", "full_name"),
            ("u.avatar", "avatar"),
            ("s.created_at", "stamped_at"),
        ])
        .add_field(&subscribers_count("u.id"), "subscribers_count")
        .add_field(&is_subscribed("u.id"), "is_subscribed")
}

/// Subscribes when not subscribed, unsubscribes otherwise. Returns whether the
/// subscriber is subscribed afterwards.
pub async fn toggle_subscription(
    pool: &SqlitePool,
    subscriber_id: i64,
    channel_id: i64,
) -> Result<bool, RequestError> {
    let mut tx = pool.begin().await?;
    let removed =
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(&mut tx)
            .await?;
    let subscribed = if removed.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO subscriptions (subscriber_id, channel_id) VALUES (?, ?) \
             ON CONFLICT (subscriber_id, channel_id) DO NOTHING",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .execute(&mut tx)
        .await?;
        true
    } else {
        false
    };
    tx.commit().await?;
    tracing::debug!(subscriber_id, channel_id, subscribed, "toggled subscription");
    Ok(subscribed)
}

pub async fn subscription_status(
    pool: &SqlitePool,
    subscriber_id: i64,
    channel_id: i64,
) -> Result<bool, RequestError> {
    let (subscribed,) = sqlx::query_as::<Sqlite, (bool,)>(
        "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?)",
    )
    .bind(subscriber_id)
    .bind(channel_id)
    .fetch_one(pool)
    .await?;
    Ok(subscribed)
}

pub async fn subscriber_count(pool: &SqlitePool, channel_id: i64) -> Result<i64, RequestError> {
    let (count,) =
        sqlx::query_as::<Sqlite, (i64,)>("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Users subscribed to `channel_id`, newest subscription first.
pub async fn get_channel_subscribers(
    pool: &SqlitePool,
    viewer: Option<i64>,
    channel_id: i64,
    page: PageRequest,
) -> Result<Paginated<Stamped<ChannelRow>>, RequestError> {
    let subscribers = channel_pipeline(
        "users u JOIN subscriptions s ON s.subscriber_id = u.id",
        viewer,
    )
    .match_eq("s.channel_id", channel_id)
    .sort(Sort::desc("stamped_at"))
    .paginate(pool, page)
    .await?;
    Ok(subscribers)
}

/// Channels `subscriber_id` is subscribed to, newest subscription first.
pub async fn get_subscribed_channels(
    pool: &SqlitePool,
    viewer: Option<i64>,
    subscriber_id: i64,
    page: PageRequest,
) -> Result<Paginated<Stamped<ChannelRow>>, RequestError> {
    let channels = channel_pipeline(
        "users u JOIN subscriptions s ON s.channel_id = u.id",
        viewer,
    )
    .match_eq("s.subscriber_id", subscriber_id)
    .sort(Sort::desc("stamped_at"))
    .paginate(pool, page)
    .await?;
    Ok(channels)
}
