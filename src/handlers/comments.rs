use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;

use super::{ensure_owner, parse_id, required, ApiResult};
use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::{ApiResponse, CommentResponse, ContentRequest, Empty, ListQuery},
    db_helpers::{
        delete_comment, get_comment, get_comment_row, get_video_row, insert_comment,
        list_comments, pipeline::Paginated, update_comment, user_exists, CommentScope,
        COMMENT_SORT_FIELDS,
    },
    errors::RequestError,
    models::Comment,
    AppContext,
};

pub(super) fn routes() -> Router {
    Router::new()
        .route(
            "/video/:video_id",
            get(get_video_comments).post(add_comment),
        )
        .route("/user/:user_id", get(get_user_comments))
        .route(
            "/:comment_id",
            get(get_comment_by_id)
                .patch(update_comment_content)
                .delete(delete_comment_by_id),
        )
}

async fn get_video_comments(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<CommentResponse>> {
    let video_id = parse_id(&video_id, "video")?;
    let sort = query.sort(COMMENT_SORT_FIELDS, "createdAt")?;
    let page = query.page_request()?;
    let viewer = maybe_user.get_id();
    if get_video_row(&ctx.pool, viewer, video_id).await?.is_none() {
        return Err(RequestError::not_found("Video not found"));
    }
    let comments = list_comments(&ctx.pool, viewer, CommentScope::Video(video_id), sort, page)
        .await?;
    Ok(ApiResponse::ok(
        comments.map(CommentResponse::from),
        "Comments fetched successfully",
    ))
}

async fn get_user_comments(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(user_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<CommentResponse>> {
    let user_id = parse_id(&user_id, "user")?;
    let sort = query.sort(COMMENT_SORT_FIELDS, "createdAt")?;
    let page = query.page_request()?;
    if !user_exists(&ctx.pool, user_id).await? {
        return Err(RequestError::not_found("User not found"));
    }
    let comments = list_comments(
        &ctx.pool,
        maybe_user.get_id(),
        CommentScope::Author(user_id),
        sort,
        page,
    )
    .await?;
    Ok(ApiResponse::ok(
        comments.map(CommentResponse::from),
        "Comments fetched successfully",
    ))
}

async fn get_comment_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(comment_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<CommentResponse> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let comment = match get_comment_row(&ctx.pool, maybe_user.get_id(), comment_id).await? {
        Some(comment) => comment,
        None => return Err(RequestError::not_found("Comment not found")),
    };
    Ok(ApiResponse::ok(
        comment.into(),
        "Comment fetched successfully",
    ))
}

async fn add_comment(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(video_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Json(request), _): WithRejection<Json<ContentRequest>, RequestError>,
) -> ApiResult<CommentResponse> {
    let video_id = parse_id(&video_id, "video")?;
    let content = required(request.content, "Comment content is required")?;
    if get_video_row(&ctx.pool, Some(auth.id()), video_id)
        .await?
        .is_none()
    {
        return Err(RequestError::not_found("Video not found"));
    }
    let id = insert_comment(&ctx.pool, video_id, auth.id(), &content).await?;
    let comment = match get_comment_row(&ctx.pool, Some(auth.id()), id).await? {
        Some(comment) => comment,
        None => return Err(RequestError::server_error("Comment was not saved")),
    };
    Ok(ApiResponse::created(
        comment.into(),
        "Comment added successfully",
    ))
}

async fn update_comment_content(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(comment_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Json(request), _): WithRejection<Json<ContentRequest>, RequestError>,
) -> ApiResult<CommentResponse> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let content = required(request.content, "Comment content is required")?;
    let comment = find_owned_comment(&ctx, comment_id, auth.id(), "update").await?;
    update_comment(&ctx.pool, comment.id, content).await?;
    let comment = match get_comment_row(&ctx.pool, Some(auth.id()), comment.id).await? {
        Some(comment) => comment,
        None => return Err(RequestError::not_found("Comment not found")),
    };
    Ok(ApiResponse::ok(
        comment.into(),
        "Comment updated successfully",
    ))
}

async fn delete_comment_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(comment_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<Empty> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let comment = find_owned_comment(&ctx, comment_id, auth.id(), "delete").await?;
    delete_comment(&ctx.pool, comment.id).await?;
    Ok(ApiResponse::ok(
        Empty::default(),
        "Comment deleted successfully",
    ))
}

async fn find_owned_comment(
    ctx: &AppContext,
    comment_id: i64,
    user_id: i64,
    action: &str,
) -> Result<Comment, RequestError> {
    let comment = match get_comment(&ctx.pool, comment_id).await? {
        Some(comment) => comment,
        None => return Err(RequestError::not_found("Comment not found")),
    };
    ensure_owner(
        comment.owner_id,
        user_id,
        &format!("You are not allowed to {action} this comment"),
    )?;
    Ok(comment)
}
