use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query},
    routing::{get, patch},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;

use super::{ensure_owner, missing_fields, non_blank, parse_id, ApiResult};
use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{
        ApiResponse, Empty, ListQuery, PublishStatusResponse, UpdateVideoRequest, VideoResponse,
    },
    db_helpers::{
        delete_video_cascade, get_video, get_video_row, insert_video, list_videos,
        pipeline::Paginated, record_view, toggle_publish, update_video, NewVideo, VideoFilter,
        VIDEO_SORT_FIELDS,
    },
    errors::RequestError,
    media::{self, MultipartForm},
    models::Video,
    AppContext,
};

pub(super) fn routes() -> Router {
    Router::new()
        .route("/", get(get_all_videos).post(publish_video))
        .route(
            "/:video_id",
            get(get_video_by_id).patch(update_video_details).delete(delete_video),
        )
        .route("/toggle/publish/:video_id", patch(toggle_publish_status))
}

async fn get_all_videos(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<VideoResponse>> {
    let owner_id = match non_blank(query.user_id.clone()) {
        Some(raw) => Some(parse_id(&raw, "user")?),
        None => None,
    };
    let filter = VideoFilter {
        owner_id,
        query: query.search_term(),
        sort: query.sort(VIDEO_SORT_FIELDS, "createdAt")?,
    };
    let videos = list_videos(
        &ctx.pool,
        maybe_user.get_id(),
        filter,
        query.page_request()?,
    )
    .await?;
    Ok(ApiResponse::ok(
        videos.map(VideoResponse::from),
        "Videos fetched successfully",
    ))
}

async fn publish_video(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, RequestError>,
) -> ApiResult<VideoResponse> {
    let mut form = MultipartForm::parse(multipart, &ctx.config.upload_tmp_dir).await?;
    let title = form.text("title");
    let description = form.text("description");
    let video_file = form.take_file("videoFile");
    let thumbnail = form.take_file("thumbnail");
    let (title, description, video_file, thumbnail) =
        match (title, description, video_file, thumbnail) {
            (Some(title), Some(description), Some(video_file), Some(thumbnail)) => {
                (title, description, video_file, thumbnail)
            }
            (title, description, video_file, thumbnail) => {
                return Err(missing_fields(
                    "All fields are required",
                    &[
                        ("title", title.is_some()),
                        ("description", description.is_some()),
                        ("videoFile", video_file.is_some()),
                        ("thumbnail", thumbnail.is_some()),
                    ],
                ))
            }
        };

    let host = ctx.media.as_ref();
    let video_file = media::upload(host, video_file).await?;
    let thumbnail = match media::upload(host, thumbnail).await {
        Ok(uploaded) => uploaded,
        Err(e) => {
            media::rollback_uploads(host, &[&video_file]).await;
            return Err(e.into());
        }
    };
    let new_video = NewVideo {
        title: &title,
        description: &description,
        video_file: &video_file,
        thumbnail: &thumbnail,
        owner_id: auth.id(),
    };
    let id = match insert_video(&ctx.pool, new_video).await {
        Ok(id) => id,
        Err(e) => {
            media::rollback_uploads(host, &[&video_file, &thumbnail]).await;
            return Err(e);
        }
    };
    tracing::info!(video_id = id, owner_id = auth.id(), "published video");

    let video = match get_video_row(&ctx.pool, Some(auth.id()), id).await? {
        Some(video) => video,
        None => return Err(RequestError::server_error("Video was not saved")),
    };
    Ok(ApiResponse::created(
        video.into(),
        "Video published successfully",
    ))
}

async fn get_video_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<VideoResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let viewer = maybe_user.get_id();
    if !record_view(&ctx.pool, viewer, video_id).await? {
        return Err(RequestError::not_found("Video not found"));
    }
    let video = match get_video_row(&ctx.pool, viewer, video_id).await? {
        Some(video) => video,
        None => return Err(RequestError::not_found("Video not found")),
    };
    Ok(ApiResponse::ok(video.into(), "Video fetched successfully"))
}

async fn update_video_details(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateVideoRequest>, RequestError>,
) -> ApiResult<VideoResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let title = non_blank(request.title);
    let description = non_blank(request.description);
    if title.is_none() && description.is_none() {
        return Err(RequestError::bad_request("At least one field is required"));
    }

    let video = find_owned_video(&ctx, video_id, auth.id(), "update").await?;
    update_video(&ctx.pool, video.id, title, description).await?;
    let video = match get_video_row(&ctx.pool, Some(auth.id()), video.id).await? {
        Some(video) => video,
        None => return Err(RequestError::not_found("Video not found")),
    };
    Ok(ApiResponse::ok(video.into(), "Video updated successfully"))
}

async fn delete_video(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<Empty> {
    let video_id = parse_id(&video_id, "video")?;
    let video = find_owned_video(&ctx, video_id, auth.id(), "delete").await?;
    delete_video_cascade(&ctx.pool, video.id).await?;

    // the rows are gone; a stale asset on the host is only logged
    let host = ctx.media.as_ref();
    for handle in [video.video_file_handle, video.thumbnail_handle]
        .into_iter()
        .flatten()
    {
        media::delete_quietly(host, &handle).await;
    }
    Ok(ApiResponse::ok(Empty::default(), "Video deleted successfully"))
}

async fn toggle_publish_status(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<PublishStatusResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let video = find_owned_video(&ctx, video_id, auth.id(), "update").await?;
    let is_published = toggle_publish(&ctx.pool, video.id).await?;
    let message = if is_published {
        "Video published"
    } else {
        "Video unpublished"
    };
    let result = PublishStatusResponse {
        id: video.id,
        is_published,
    };
    Ok(ApiResponse::ok(result, message))
}

/// Existence first, then ownership: a missing video is 404 for everyone.
async fn find_owned_video(
    ctx: &AppContext,
    video_id: i64,
    user_id: i64,
    action: &str,
) -> Result<Video, RequestError> {
    let video = match get_video(&ctx.pool, video_id).await? {
        Some(video) => video,
        None => return Err(RequestError::not_found("Video not found")),
    };
    ensure_owner(
        video.owner_id,
        user_id,
        &format!("You are not allowed to {action} this video"),
    )?;
    Ok(video)
}
