use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::RequestError,
    media::UploadedMedia,
    models::{ChannelProfileRow, PublicUser, Stamped, User, VideoRow},
};

use super::{
    is_subscribed,
    pipeline::{PageRequest, Paginated, Pipeline, Sort, VIEWER},
    subscribers_count, video_pipeline, UpdateBuilder, NOW,
};

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, password, \
     refresh_token, created_at, updated_at";

const PUBLIC_USER_COLUMNS: &str =
    "id, username, email, full_name, avatar, cover_image, created_at, updated_at";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar: &'a UploadedMedia,
    pub cover_image: Option<&'a UploadedMedia>,
}

/// Which image slot of a user profile an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn columns(&self) -> (&'static str, &'static str) {
        match self {
            ProfileImage::Avatar => ("avatar", "avatar_handle"),
            ProfileImage::CoverImage => ("cover_image", "cover_image_handle"),
        }
    }
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let user = sqlx::query_as::<Sqlite, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Finds the account a login names, by email or by username.
pub async fn get_user_by_login(
    pool: &SqlitePool,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<Option<User>, RequestError> {
    // a NULL never compares equal, so an absent identifier matches nothing
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? OR username = ? LIMIT 1");
    let user = sqlx::query_as::<Sqlite, User>(&query)
        .bind(email)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn username_or_email_taken(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<bool, RequestError> {
    let (taken,) = sqlx::query_as::<Sqlite, (bool,)>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = ? OR email = ?)",
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn insert_user(pool: &SqlitePool, user: NewUser<'_>) -> Result<PublicUser, RequestError> {
    let mut tx = pool.begin().await?;
    let query = format!(
        r#"
        INSERT INTO users (username, email, full_name, password, avatar, avatar_handle, cover_image, cover_image_handle)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#
    );
    let id = sqlx::query::<Sqlite>(&query)
        .bind(user.username)
        .bind(user.email)
        .bind(user.full_name)
        .bind(user.password_hash)
        .bind(&user.avatar.url)
        .bind(&user.avatar.handle)
        .bind(user.cover_image.map(|media| media.url.as_str()))
        .bind(user.cover_image.map(|media| media.handle.as_str()))
        .execute(&mut tx)
        .await?
        .last_insert_rowid();
    let created = sqlx::query_as::<Sqlite, PublicUser>(&format!(
        "SELECT {PUBLIC_USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(created)
}

pub async fn set_refresh_token(
    pool: &SqlitePool,
    id: i64,
    token: Option<&str>,
) -> Result<(), RequestError> {
    sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
        .bind(token)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores the new refresh token only if `current` is still the stored one,
/// so a refresh token can be exchanged at most once.
pub async fn rotate_refresh_token(
    pool: &SqlitePool,
    id: i64,
    current: &str,
    next: &str,
) -> Result<bool, RequestError> {
    let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ? AND refresh_token = ?")
        .bind(next)
        .bind(id)
        .bind(current)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_password(
    pool: &SqlitePool,
    id: i64,
    password_hash: &str,
) -> Result<(), RequestError> {
    let query = format!("UPDATE users SET password = ?, updated_at = {NOW} WHERE id = ?");
    sqlx::query(&query)
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_account(
    pool: &SqlitePool,
    id: i64,
    full_name: Option<String>,
    email: Option<String>,
) -> Result<PublicUser, RequestError> {
    let updated = UpdateBuilder::new("users")
        .set("full_name", full_name)
        .set("email", email)
        .execute(pool, id)
        .await?;
    if !updated {
        return Err(RequestError::not_found("User not found"));
    }
    super::get_public_user_by_id(pool, id)
        .await?
        .ok_or_else(|| RequestError::not_found("User not found"))
}

/// Points the profile image at `media` and returns the updated user together
/// with the handle of the image it replaced.
pub async fn replace_profile_image(
    pool: &SqlitePool,
    id: i64,
    slot: ProfileImage,
    media: &UploadedMedia,
) -> Result<(PublicUser, Option<String>), RequestError> {
    let (url_column, handle_column) = slot.columns();
    let mut tx = pool.begin().await?;

    let previous = sqlx::query_as::<Sqlite, (Option<String>,)>(&format!(
        "SELECT {handle_column} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut tx)
    .await?
    .ok_or_else(|| RequestError::not_found("User not found"))?
    .0;

    sqlx::query::<Sqlite>(&format!(
        "UPDATE users SET {url_column} = ?, {handle_column} = ?, updated_at = {NOW} WHERE id = ?"
    ))
    .bind(&media.url)
    .bind(&media.handle)
    .bind(id)
    .execute(&mut tx)
    .await?;
    let user = sqlx::query_as::<Sqlite, PublicUser>(&format!(
        "SELECT {PUBLIC_USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok((user, previous))
}

pub async fn get_channel_profile(
    pool: &SqlitePool,
    viewer: Option<i64>,
    username: &str,
) -> Result<Option<ChannelProfileRow>, RequestError> {
    let channel = Pipeline::new("users u", viewer)
        .project(&[
            ("u.id", "id"),
            ("u.username", "username"),
            ("u.email", "email"),
            ("u.full_name", "full_name"),
            ("u.avatar", "avatar"),
            ("u.cover_image", "cover_image"),
            ("u.created_at", "created_at"),
        ])
        .add_field(&subscribers_count("u.id"), "subscribers_count")
        .add_field(
            "(SELECT COUNT(*) FROM subscriptions sb WHERE sb.subscriber_id = u.id)",
            "channels_subscribed_to_count",
        )
        .add_field(&is_subscribed("u.id"), "is_subscribed")
        .match_eq("u.username", username)
        .fetch_optional(pool)
        .await?;
    Ok(channel)
}

/// Videos the user has watched, most recent first. Videos that have since
/// been unpublished stay visible only if the user owns them.
pub async fn get_watch_history(
    pool: &SqlitePool,
    user_id: i64,
    page: PageRequest,
) -> Result<Paginated<Stamped<VideoRow>>, RequestError> {
    let history = video_pipeline(
        "videos v JOIN watch_history w ON w.video_id = v.id",
        Some(user_id),
    )
    .add_field("w.watched_at", "stamped_at")
    .match_eq("w.user_id", user_id)
    .match_clause(&format!("v.is_published = 1 OR v.owner_id = {VIEWER}"), vec![])
    .sort(Sort::desc("stamped_at"))
    .paginate(pool, page)
    .await?;
    Ok(history)
}
