use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;

use super::{parse_id, ApiResult};
use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{
        ApiResponse, CommentResponse, LikeCountResponse, LikeStateResponse, LikeStatusResponse,
        LikedResponse, ListQuery, TweetResponse, VideoResponse,
    },
    db_helpers::{
        get_like_summary, get_liked_comments, get_liked_tweets, get_liked_videos, like_count,
        like_status, like_target_exists, pipeline::Paginated, toggle_like,
    },
    errors::RequestError,
    models::{LikeKind, LikeSummary, LikeTarget},
    AppContext,
};

pub(super) fn routes() -> Router {
    Router::new()
        .route("/toggle/v/:video_id", post(toggle_video_like))
        .route("/toggle/c/:comment_id", post(toggle_comment_like))
        .route("/toggle/t/:tweet_id", post(toggle_tweet_like))
        .route("/videos", get(get_liked_video_list))
        .route("/comments", get(get_liked_comment_list))
        .route("/tweets", get(get_liked_tweet_list))
        .route("/status/:content_type/:content_id", get(get_like_status))
        .route("/count/:content_type/:content_id", get(get_like_count))
        .route("/summary", get(get_user_like_summary))
}

fn label(kind: LikeKind) -> &'static str {
    match kind {
        LikeKind::Video => "Video",
        LikeKind::Comment => "Comment",
        LikeKind::Tweet => "Tweet",
    }
}

fn parse_target(content_type: &str, raw_id: &str) -> Result<LikeTarget, RequestError> {
    let kind = match LikeKind::parse(&content_type.trim().to_ascii_lowercase()) {
        Some(kind) => kind,
        None => {
            return Err(RequestError::bad_request(
                "Invalid content type, expected video, comment or tweet",
            ))
        }
    };
    Ok(LikeTarget::new(kind, parse_id(raw_id, kind.as_str())?))
}

async fn ensure_target_exists(
    ctx: &AppContext,
    target: LikeTarget,
    user_id: Option<i64>,
) -> Result<(), RequestError> {
    if !like_target_exists(&ctx.pool, target, user_id).await? {
        return Err(RequestError::not_found(format!(
            "{} not found",
            label(target.kind())
        )));
    }
    Ok(())
}

// ----------------- Toggle Handlers -----------------
async fn toggle_video_like(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<LikeStateResponse> {
    toggle(&ctx, &auth, parse_target("video", &video_id)?).await
}

async fn toggle_comment_like(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(comment_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<LikeStateResponse> {
    toggle(&ctx, &auth, parse_target("comment", &comment_id)?).await
}

async fn toggle_tweet_like(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(tweet_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<LikeStateResponse> {
    toggle(&ctx, &auth, parse_target("tweet", &tweet_id)?).await
}

async fn toggle(
    ctx: &AppContext,
    auth: &AuthUser,
    target: LikeTarget,
) -> ApiResult<LikeStateResponse> {
    ensure_target_exists(ctx, target, Some(auth.id())).await?;
    let state = toggle_like(&ctx.pool, target, auth.id()).await?;
    let (status, verb) = if state.is_liked {
        (StatusCode::CREATED, "liked")
    } else {
        (StatusCode::OK, "unliked")
    };
    let result = LikeStateResponse {
        is_liked: state.is_liked,
        likes_count: state.likes_count,
    };
    Ok(ApiResponse::with_status(
        status,
        result,
        format!("{} {verb} successfully", label(target.kind())),
    ))
}

// ----------------- Liked Content Handlers -----------------
async fn get_liked_video_list(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<LikedResponse<VideoResponse>>> {
    let videos = get_liked_videos(&ctx.pool, auth.id(), query.page_request()?).await?;
    Ok(ApiResponse::ok(
        videos.map(LikedResponse::from),
        "Liked videos fetched successfully",
    ))
}

async fn get_liked_comment_list(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<LikedResponse<CommentResponse>>> {
    let comments = get_liked_comments(&ctx.pool, auth.id(), query.page_request()?).await?;
    Ok(ApiResponse::ok(
        comments.map(LikedResponse::from),
        "Liked comments fetched successfully",
    ))
}

async fn get_liked_tweet_list(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<LikedResponse<TweetResponse>>> {
    let tweets = get_liked_tweets(&ctx.pool, auth.id(), query.page_request()?).await?;
    Ok(ApiResponse::ok(
        tweets.map(LikedResponse::from),
        "Liked tweets fetched successfully",
    ))
}

// ----------------- Status Handlers -----------------
async fn get_like_status(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path((content_type, content_id)), _): WithRejection<
        Path<(String, String)>,
        RequestError,
    >,
) -> ApiResult<LikeStatusResponse> {
    let target = parse_target(&content_type, &content_id)?;
    ensure_target_exists(&ctx, target, Some(auth.id())).await?;
    let is_liked = like_status(&ctx.pool, target, auth.id()).await?;
    Ok(ApiResponse::ok(
        LikeStatusResponse { is_liked },
        "Like status fetched successfully",
    ))
}

async fn get_like_count(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path((content_type, content_id)), _): WithRejection<
        Path<(String, String)>,
        RequestError,
    >,
) -> ApiResult<LikeCountResponse> {
    let target = parse_target(&content_type, &content_id)?;
    ensure_target_exists(&ctx, target, maybe_user.get_id()).await?;
    let likes_count = like_count(&ctx.pool, target).await?;
    Ok(ApiResponse::ok(
        LikeCountResponse { likes_count },
        "Like count fetched successfully",
    ))
}

async fn get_user_like_summary(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
) -> ApiResult<LikeSummary> {
    let summary = get_like_summary(&ctx.pool, auth.id()).await?;
    Ok(ApiResponse::ok(summary, "Like summary fetched successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_selects_target() {
        assert_eq!(parse_target("video", "3").unwrap(), LikeTarget::Video(3));
        assert_eq!(parse_target("Tweet", "8").unwrap(), LikeTarget::Tweet(8));
        assert!(matches!(
            parse_target("playlist", "3"),
            Err(RequestError::BadRequest(_))
        ));
        match parse_target("comment", "x1") {
            Err(RequestError::BadRequest(message)) => assert_eq!(message, "Invalid comment ID"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
