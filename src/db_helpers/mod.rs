use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::PublicUser};

mod comment_helpers;
mod like_helpers;
pub mod pipeline;
mod playlist_helpers;
mod subscription_helpers;
mod tweet_helpers;
mod user_helpers;
mod video_helpers;

pub use comment_helpers::*;
pub use like_helpers::*;
pub use playlist_helpers::*;
pub use subscription_helpers::*;
pub use tweet_helpers::*;
pub use user_helpers::*;
pub use video_helpers::*;

use pipeline::{bind_statement, SqlParam, VIEWER};

/// Current time in the format every `*_at` column stores.
pub(crate) const NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

/// Public owner fields, read from a `users o` join.
const OWNER_FIELDS: &[(&str, &str)] = &[
    ("o.id", "owner_id"),
    ("o.username", "owner_username"),
    ("o.full_name", "owner_full_name"),
    ("o.avatar", "owner_avatar"),
];

fn owner_join(owner_column: &str) -> String {
    format!("JOIN users o ON o.id = {owner_column}")
}

fn likes_count(target_type: &str, id_column: &str) -> String {
    format!(
        "(SELECT COUNT(*) FROM likes lc WHERE lc.target_type = '{target_type}' AND lc.target_id = {id_column})"
    )
}

fn is_liked(target_type: &str, id_column: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM likes li WHERE li.target_type = '{target_type}' \
         AND li.target_id = {id_column} AND li.liked_by = {VIEWER})"
    )
}

fn subscribers_count(channel_column: &str) -> String {
    format!("(SELECT COUNT(*) FROM subscriptions sc WHERE sc.channel_id = {channel_column})")
}

fn is_subscribed(channel_column: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM subscriptions si WHERE si.channel_id = {channel_column} \
         AND si.subscriber_id = {VIEWER})"
    )
}

/// Builds `UPDATE <table> SET ... WHERE id = ?` from the fields that were
/// actually supplied. `updated_at` is always refreshed.
struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<String>,
    params: Vec<SqlParam>,
}

impl UpdateBuilder {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: vec![],
            params: vec![],
        }
    }

    fn set<T: Into<SqlParam>>(mut self, column: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.assignments.push(format!("{column} = ?"));
            self.params.push(value.into());
        }
        self
    }

    fn build(mut self, id: i64) -> (String, Vec<SqlParam>) {
        self.assignments.push(format!("updated_at = {NOW}"));
        self.params.push(SqlParam::Int(id));
        let query = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.table,
            self.assignments.join(", ")
        );
        (query, self.params)
    }

    /// Runs the update; `false` when no row has the id. The statement is run
    /// to completion so the write is committed before anything re-reads it.
    async fn execute<'c, E>(self, executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'c, Database = Sqlite>,
    {
        let (query, params) = self.build(id);
        let done = bind_statement(sqlx::query::<Sqlite>(&query), &params)
            .execute(executor)
            .await?;
        Ok(done.rows_affected() == 1)
    }
}

// ----------------- Helper Functions -----------------

pub async fn get_public_user_by_id(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<PublicUser>, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, PublicUser>(
        r#"
        SELECT id, username, email, full_name, avatar, cover_image, created_at, updated_at
        FROM users WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn user_exists(pool: &SqlitePool, id: i64) -> Result<bool, RequestError> {
    let (exists,) =
        sqlx::query_as::<Sqlite, (bool,)>("SELECT EXISTS (SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_builder_skips_missing_fields() {
        let (query, params) = UpdateBuilder::new("videos")
            .set("title", Some("New title"))
            .set("description", Option::<String>::None)
            .build(4);
        assert_eq!(
            query,
            format!("UPDATE videos SET title = ?, updated_at = {NOW} WHERE id = ?")
        );
        assert_eq!(params, vec![SqlParam::from("New title"), SqlParam::Int(4)]);
    }
}
