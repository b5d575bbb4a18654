use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    routing::{get, patch},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;

use super::{ensure_owner, missing_fields, non_blank, parse_id, ApiResult};
use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{
        ApiResponse, Empty, ListQuery, PlaylistDetailResponse, PlaylistRequest, PlaylistResponse,
        VideoResponse,
    },
    db_helpers::{
        add_playlist_video, delete_playlist, get_playlist, get_playlist_row, get_playlist_videos,
        get_video, insert_playlist, list_playlists, pipeline::Paginated, remove_playlist_video,
        update_playlist, user_exists, PlaylistFilter, PLAYLIST_SORT_FIELDS,
    },
    errors::RequestError,
    models::Playlist,
    AppContext,
};

pub(super) fn routes() -> Router {
    Router::new()
        .route("/", get(get_all_playlists).post(create_playlist))
        .route("/user/:user_id", get(get_user_playlists))
        .route(
            "/:playlist_id",
            get(get_playlist_by_id)
                .patch(update_playlist_details)
                .delete(delete_playlist_by_id),
        )
        .route("/add/:video_id/:playlist_id", patch(add_video_to_playlist))
        .route(
            "/remove/:video_id/:playlist_id",
            patch(remove_video_from_playlist),
        )
}

async fn get_all_playlists(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<PlaylistResponse>> {
    let filter = PlaylistFilter {
        owner_id: None,
        query: query.search_term(),
        non_empty: true,
        sort: query.sort(PLAYLIST_SORT_FIELDS, "updatedAt")?,
    };
    let playlists = list_playlists(
        &ctx.pool,
        maybe_user.get_id(),
        filter,
        query.page_request()?,
    )
    .await?;
    Ok(ApiResponse::ok(
        playlists.map(PlaylistResponse::from),
        "Playlists fetched successfully",
    ))
}

async fn get_user_playlists(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(user_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<PlaylistResponse>> {
    let user_id = parse_id(&user_id, "user")?;
    let filter = PlaylistFilter {
        owner_id: Some(user_id),
        query: query.search_term(),
        non_empty: false,
        sort: query.sort(PLAYLIST_SORT_FIELDS, "updatedAt")?,
    };
    let page = query.page_request()?;
    if !user_exists(&ctx.pool, user_id).await? {
        return Err(RequestError::not_found("User not found"));
    }
    let playlists = list_playlists(&ctx.pool, maybe_user.get_id(), filter, page).await?;
    Ok(ApiResponse::ok(
        playlists.map(PlaylistResponse::from),
        "User playlists fetched successfully",
    ))
}

async fn get_playlist_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(playlist_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<PlaylistDetailResponse> {
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let detail = playlist_detail(&ctx, maybe_user.get_id(), playlist_id).await?;
    Ok(ApiResponse::ok(detail, "Playlist fetched successfully"))
}

async fn create_playlist(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<PlaylistRequest>, RequestError>,
) -> ApiResult<PlaylistResponse> {
    let name = non_blank(request.name);
    let description = non_blank(request.description);
    let (name, description) = match (name, description) {
        (Some(name), Some(description)) => (name, description),
        (name, description) => {
            return Err(missing_fields(
                "Name and description are required",
                &[
                    ("name", name.is_some()),
                    ("description", description.is_some()),
                ],
            ))
        }
    };

    let id = insert_playlist(&ctx.pool, auth.id(), &name, &description).await?;
    let playlist = match get_playlist_row(&ctx.pool, Some(auth.id()), id).await? {
        Some(playlist) => playlist,
        None => return Err(RequestError::server_error("Playlist was not saved")),
    };
    Ok(ApiResponse::created(
        playlist.into(),
        "Playlist created successfully",
    ))
}

async fn update_playlist_details(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(playlist_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Json(request), _): WithRejection<Json<PlaylistRequest>, RequestError>,
) -> ApiResult<PlaylistResponse> {
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let name = non_blank(request.name);
    let description = non_blank(request.description);
    if name.is_none() && description.is_none() {
        return Err(RequestError::bad_request("At least one field is required"));
    }

    let playlist = find_owned_playlist(&ctx, playlist_id, auth.id(), "update").await?;
    update_playlist(&ctx.pool, playlist.id, name, description).await?;
    let playlist = match get_playlist_row(&ctx.pool, Some(auth.id()), playlist.id).await? {
        Some(playlist) => playlist,
        None => return Err(RequestError::not_found("Playlist not found")),
    };
    Ok(ApiResponse::ok(
        playlist.into(),
        "Playlist updated successfully",
    ))
}

async fn delete_playlist_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(playlist_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<Empty> {
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let playlist = find_owned_playlist(&ctx, playlist_id, auth.id(), "delete").await?;
    delete_playlist(&ctx.pool, playlist.id).await?;
    Ok(ApiResponse::ok(
        Empty::default(),
        "Playlist deleted successfully",
    ))
}

async fn add_video_to_playlist(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path((video_id, playlist_id)), _): WithRejection<
        Path<(String, String)>,
        RequestError,
    >,
) -> ApiResult<PlaylistDetailResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let playlist = find_owned_playlist(&ctx, playlist_id, auth.id(), "update").await?;
    let video = match get_video(&ctx.pool, video_id).await? {
        Some(video) => video,
        None => return Err(RequestError::not_found("Video not found")),
    };
    if !video.is_published {
        return Err(RequestError::bad_request(
            "Only published videos can be added to a playlist",
        ));
    }

    add_playlist_video(&ctx.pool, playlist.id, video.id).await?;
    let detail = playlist_detail(&ctx, Some(auth.id()), playlist.id).await?;
    Ok(ApiResponse::ok(detail, "Video added to playlist successfully"))
}

async fn remove_video_from_playlist(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path((video_id, playlist_id)), _): WithRejection<
        Path<(String, String)>,
        RequestError,
    >,
) -> ApiResult<PlaylistDetailResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let playlist_id = parse_id(&playlist_id, "playlist")?;
    let playlist = find_owned_playlist(&ctx, playlist_id, auth.id(), "update").await?;
    if !remove_playlist_video(&ctx.pool, playlist.id, video_id).await? {
        return Err(RequestError::bad_request("Video not found in playlist"));
    }
    let detail = playlist_detail(&ctx, Some(auth.id()), playlist.id).await?;
    Ok(ApiResponse::ok(
        detail,
        "Video removed from playlist successfully",
    ))
}

async fn playlist_detail(
    ctx: &AppContext,
    viewer: Option<i64>,
    playlist_id: i64,
) -> Result<PlaylistDetailResponse, RequestError> {
    let playlist = match get_playlist_row(&ctx.pool, viewer, playlist_id).await? {
        Some(playlist) => playlist,
        None => return Err(RequestError::not_found("Playlist not found")),
    };
    let videos = get_playlist_videos(&ctx.pool, viewer, playlist_id).await?;
    Ok(PlaylistDetailResponse {
        playlist: playlist.into(),
        videos: videos.into_iter().map(VideoResponse::from).collect(),
    })
}

async fn find_owned_playlist(
    ctx: &AppContext,
    playlist_id: i64,
    user_id: i64,
    action: &str,
) -> Result<Playlist, RequestError> {
    let playlist = match get_playlist(&ctx.pool, playlist_id).await? {
        Some(playlist) => playlist,
        None => return Err(RequestError::not_found("Playlist not found")),
    };
    ensure_owner(
        playlist.owner_id,
        user_id,
        &format!("You are not allowed to {action} this playlist"),
    )?;
    Ok(playlist)
}
