use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, FromRow, Row};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub password: String,
    pub refresh_token: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A user without credentials or media handles; safe to return to clients.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            cover_image: user.cover_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelProfileRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
    pub created_at: NaiveDateTime,
}

/// A user as seen in subscriber and channel listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// The stored video as ownership and cleanup checks see it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub video_file_handle: Option<String>,
    pub thumbnail_handle: Option<String>,
    pub is_published: bool,
    pub owner_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoRow {
    pub id: i64,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner_id: i64,
    pub owner_username: String,
    pub owner_full_name: String,
    pub owner_avatar: String,
    pub owner_subscribers_count: i64,
    pub owner_is_subscribed: bool,
    pub likes_count: i64,
    pub is_liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub content: String,
    pub video_id: i64,
    pub video_title: String,
    pub video_thumbnail: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub owner_full_name: String,
    pub owner_avatar: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tweet {
    pub id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TweetRow {
    pub id: i64,
    pub content: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub owner_full_name: String,
    pub owner_avatar: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Playlist {
    pub id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlaylistRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub owner_id: i64,
    pub owner_username: String,
    pub owner_full_name: String,
    pub owner_avatar: String,
    pub video_count: i64,
    pub total_duration: f64,
    pub first_video_id: Option<i64>,
    pub first_video_title: Option<String>,
    pub first_video_thumbnail: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    Video,
    Comment,
    Tweet,
}

impl LikeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeKind::Video => "video",
            LikeKind::Comment => "comment",
            LikeKind::Tweet => "tweet",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(LikeKind::Video),
            "comment" => Some(LikeKind::Comment),
            "tweet" => Some(LikeKind::Tweet),
            _ => None,
        }
    }
}

/// What a like points at. Exactly one target per like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video(i64),
    Comment(i64),
    Tweet(i64),
}

impl LikeTarget {
    pub fn new(kind: LikeKind, id: i64) -> Self {
        match kind {
            LikeKind::Video => LikeTarget::Video(id),
            LikeKind::Comment => LikeTarget::Comment(id),
            LikeKind::Tweet => LikeTarget::Tweet(id),
        }
    }

    pub fn kind(&self) -> LikeKind {
        match self {
            LikeTarget::Video(_) => LikeKind::Video,
            LikeTarget::Comment(_) => LikeKind::Comment,
            LikeTarget::Tweet(_) => LikeKind::Tweet,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LikeSummary {
    pub total_likes: i64,
    pub video_likes: i64,
    pub comment_likes: i64,
    pub tweet_likes: i64,
}

/// A row paired with the time of the relation that selected it: when it was
/// liked, subscribed to or watched. Read from the `stamped_at` column.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    pub at: NaiveDateTime,
    pub item: T,
}

impl<'r, T> FromRow<'r, SqliteRow> for Stamped<T>
where
    T: FromRow<'r, SqliteRow>,
{
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Stamped {
            at: row.try_get("stamped_at")?,
            item: T::from_row(row)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_kind_round_trips_through_its_name() {
        for kind in [LikeKind::Video, LikeKind::Comment, LikeKind::Tweet] {
            assert_eq!(LikeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LikeKind::parse("playlist"), None);
    }

    #[test]
    fn like_target_exposes_kind_and_id() {
        let target = LikeTarget::new(LikeKind::Tweet, 9);
        assert_eq!(target, LikeTarget::Tweet(9));
        assert_eq!(target.kind(), LikeKind::Tweet);
        assert_eq!(target.id(), 9);
    }
}
