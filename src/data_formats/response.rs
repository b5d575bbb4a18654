use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{
    ChannelProfileRow, ChannelRow, CommentRow, PlaylistRow, PublicUser, Stamped, TweetRow,
    VideoRow,
};

// ----------------- User Response -----------------
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfileResponse {
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

impl From<ChannelProfileRow> for ChannelProfileResponse {
    fn from(row: ChannelProfileRow) -> Self {
        ChannelProfileResponse {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            avatar: row.avatar,
            cover_image: row.cover_image,
            subscribers_count: row.subscribers_count,
            channels_subscribed_to_count: row.channels_subscribed_to_count,
            is_subscribed: row.is_subscribed,
            created_at: row.created_at,
        }
    }
}

/// Public fields of the user who owns a piece of content.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

impl From<ChannelRow> for ChannelResponse {
    fn from(row: ChannelRow) -> Self {
        ChannelResponse {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            avatar: row.avatar,
            subscribers_count: row.subscribers_count,
            is_subscribed: row.is_subscribed,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedChannelResponse {
    #[serde(flatten)]
    pub channel: ChannelResponse,
    pub subscribed_at: NaiveDateTime,
}

impl From<Stamped<ChannelRow>> for SubscribedChannelResponse {
    fn from(stamped: Stamped<ChannelRow>) -> Self {
        SubscribedChannelResponse {
            channel: stamped.item.into(),
            subscribed_at: stamped.at,
        }
    }
}

// ----------------- Video Response -----------------
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub id: i64,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub owner: ChannelResponse,
    pub likes_count: i64,
    pub is_liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<VideoRow> for VideoResponse {
    fn from(row: VideoRow) -> Self {
        VideoResponse {
            id: row.id,
            video_file: row.video_file,
            thumbnail: row.thumbnail,
            title: row.title,
            description: row.description,
            duration: row.duration,
            views: row.views,
            is_published: row.is_published,
            owner: ChannelResponse {
                id: row.owner_id,
                username: row.owner_username,
                full_name: row.owner_full_name,
                avatar: row.owner_avatar,
                subscribers_count: row.owner_subscribers_count,
                is_subscribed: row.owner_is_subscribed,
            },
            likes_count: row.likes_count,
            is_liked: row.is_liked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVideoResponse {
    #[serde(flatten)]
    pub video: VideoResponse,
    pub watched_at: NaiveDateTime,
}

impl From<Stamped<VideoRow>> for WatchedVideoResponse {
    fn from(stamped: Stamped<VideoRow>) -> Self {
        WatchedVideoResponse {
            video: stamped.item.into(),
            watched_at: stamped.at,
        }
    }
}

/// Any liked item together with when it was liked.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LikedResponse<T> {
    #[serde(flatten)]
    pub item: T,
    pub liked_at: NaiveDateTime,
}

impl<R, T: From<R>> From<Stamped<R>> for LikedResponse<T> {
    fn from(stamped: Stamped<R>) -> Self {
        LikedResponse {
            item: stamped.item.into(),
            liked_at: stamped.at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublishStatusResponse {
    pub id: i64,
    pub is_published: bool,
}

// ----------------- Comment Response -----------------
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: i64,
    pub title: String,
    pub thumbnail: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub content: String,
    pub video: VideoSummary,
    pub owner: OwnerResponse,
    pub likes_count: i64,
    pub is_liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        CommentResponse {
            id: row.id,
            content: row.content,
            video: VideoSummary {
                id: row.video_id,
                title: row.video_title,
                thumbnail: row.video_thumbnail,
            },
            owner: OwnerResponse {
                id: row.owner_id,
                username: row.owner_username,
                full_name: row.owner_full_name,
                avatar: row.owner_avatar,
            },
            likes_count: row.likes_count,
            is_liked: row.is_liked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ----------------- Tweet Response -----------------
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TweetResponse {
    pub id: i64,
    pub content: String,
    pub owner: OwnerResponse,
    pub likes_count: i64,
    pub is_liked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<TweetRow> for TweetResponse {
    fn from(row: TweetRow) -> Self {
        TweetResponse {
            id: row.id,
            content: row.content,
            owner: OwnerResponse {
                id: row.owner_id,
                username: row.owner_username,
                full_name: row.owner_full_name,
                avatar: row.owner_avatar,
            },
            likes_count: row.likes_count,
            is_liked: row.is_liked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// ----------------- Like Response -----------------
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LikeStateResponse {
    pub is_liked: bool,
    pub likes_count: i64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatusResponse {
    pub is_liked: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LikeCountResponse {
    pub likes_count: i64,
}

// ----------------- Subscription Response -----------------
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub is_subscribed: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberCountResponse {
    pub subscribers_count: i64,
}

// ----------------- Playlist Response -----------------
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub owner: OwnerResponse,
    pub video_count: i64,
    pub total_duration: f64,
    pub first_video: Option<VideoSummary>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<PlaylistRow> for PlaylistResponse {
    fn from(row: PlaylistRow) -> Self {
        let first_video = match (
            row.first_video_id,
            row.first_video_title,
            row.first_video_thumbnail,
        ) {
            (Some(id), Some(title), Some(thumbnail)) => Some(VideoSummary {
                id,
                title,
                thumbnail,
            }),
            _ => None,
        };
        PlaylistResponse {
            id: row.id,
            name: row.name,
            description: row.description,
            owner: OwnerResponse {
                id: row.owner_id,
                username: row.owner_username,
                full_name: row.owner_full_name,
                avatar: row.owner_avatar,
            },
            video_count: row.video_count,
            total_duration: row.total_duration,
            first_video,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetailResponse {
    #[serde(flatten)]
    pub playlist: PlaylistResponse,
    pub videos: Vec<VideoResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamp() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-10-17 09:30:00.250", "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn video_response_nests_owner() {
        let row = VideoRow {
            id: 1,
            video_file: "http://cdn/v.mp4".into(),
            thumbnail: "http://cdn/t.png".into(),
            title: "Intro".into(),
            description: "First upload".into(),
            duration: 12.5,
            views: 3,
            is_published: true,
            owner_id: 9,
            owner_username: "ada".into(),
            owner_full_name: "Ada Lovelace".into(),
            owner_avatar: "http://cdn/a.png".into(),
            owner_subscribers_count: 4,
            owner_is_subscribed: false,
            likes_count: 2,
            is_liked: true,
            created_at: timestamp(),
            updated_at: timestamp(),
        };
        let value = serde_json::to_value(VideoResponse::from(row)).unwrap();
        assert_eq!(value["owner"]["username"], "ada");
        assert_eq!(value["owner"]["subscribersCount"], 4);
        assert_eq!(value["isLiked"], true);
        assert_eq!(value["videoFile"], "http://cdn/v.mp4");
        assert_eq!(value["createdAt"], "2026-10-17T09:30:00.250");
    }

    #[test]
    fn liked_response_flattens_item() {
        let stamped = Stamped {
            at: timestamp(),
            item: TweetRow {
                id: 5,
                content: "hello".into(),
                owner_id: 1,
                owner_username: "ada".into(),
                owner_full_name: "Ada".into(),
                owner_avatar: "a".into(),
                likes_count: 1,
                is_liked: true,
                created_at: timestamp(),
                updated_at: timestamp(),
            },
        };
        let value = serde_json::to_value(LikedResponse::<TweetResponse>::from(stamped)).unwrap();
        assert_eq!(value["id"], 5);
        assert_eq!(value["content"], "hello");
        assert_eq!(value["likedAt"], "2026-10-17T09:30:00.250");
    }

    #[test]
    fn playlist_without_videos_has_no_first_video() {
        let row = PlaylistRow {
            id: 3,
            name: "Later".into(),
            description: "Watch later".into(),
            owner_id: 1,
            owner_username: "ada".into(),
            owner_full_name: "Ada".into(),
            owner_avatar: "a".into(),
            video_count: 0,
            total_duration: 0.0,
            first_video_id: None,
            first_video_title: None,
            first_video_thumbnail: None,
            created_at: timestamp(),
            updated_at: timestamp(),
        };
        let value = serde_json::to_value(PlaylistResponse::from(row)).unwrap();
        assert_eq!(value["firstVideo"], serde_json::Value::Null);
        assert_eq!(value["videoCount"], 0);
    }
}
