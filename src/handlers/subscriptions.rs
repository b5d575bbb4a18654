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
        ApiResponse, ListQuery, SubscribedChannelResponse, SubscriberCountResponse,
        SubscriptionStatusResponse,
    },
    db_helpers::{
        get_channel_subscribers, get_subscribed_channels, pipeline::Paginated, subscriber_count,
        subscription_status, toggle_subscription, user_exists,
    },
    errors::RequestError,
    AppContext,
};

pub(super) fn routes() -> Router {
    Router::new()
        .route("/c/:channel_id", post(toggle_channel_subscription))
        .route("/c/:channel_id/subscribers", get(get_subscribers))
        .route("/u/:subscriber_id", get(get_subscribed_to))
        .route("/status/:channel_id", get(get_subscription_status))
        .route("/count/:channel_id", get(get_subscriber_count))
}

async fn find_channel(ctx: &AppContext, raw_id: &str) -> Result<i64, RequestError> {
    let channel_id = parse_id(raw_id, "channel")?;
    if !user_exists(&ctx.pool, channel_id).await? {
        return Err(RequestError::not_found("Channel not found"));
    }
    Ok(channel_id)
}

async fn toggle_channel_subscription(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(channel_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<SubscriptionStatusResponse> {
    if parse_id(&channel_id, "channel")? == auth.id() {
        return Err(RequestError::bad_request("You cannot subscribe to yourself"));
    }
    let channel_id = find_channel(&ctx, &channel_id).await?;
    let is_subscribed = toggle_subscription(&ctx.pool, auth.id(), channel_id).await?;
    let (status, message) = if is_subscribed {
        (StatusCode::CREATED, "Subscribed successfully")
    } else {
        (StatusCode::OK, "Unsubscribed successfully")
    };
    Ok(ApiResponse::with_status(
        status,
        SubscriptionStatusResponse { is_subscribed },
        message,
    ))
}

async fn get_subscribers(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(channel_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<SubscribedChannelResponse>> {
    let page = query.page_request()?;
    let channel_id = find_channel(&ctx, &channel_id).await?;
    let subscribers =
        get_channel_subscribers(&ctx.pool, maybe_user.get_id(), channel_id, page).await?;
    Ok(ApiResponse::ok(
        subscribers.map(SubscribedChannelResponse::from),
        "Subscribers fetched successfully",
    ))
}

async fn get_subscribed_to(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(subscriber_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<SubscribedChannelResponse>> {
    let subscriber_id = parse_id(&subscriber_id, "subscriber")?;
    let page = query.page_request()?;
    if !user_exists(&ctx.pool, subscriber_id).await? {
        return Err(RequestError::not_found("Subscriber not found"));
    }
    let channels = get_subscribed_channels(&ctx.pool, Some(auth.id()), subscriber_id, page).await?;
    Ok(ApiResponse::ok(
        channels.map(SubscribedChannelResponse::from),
        "Subscribed channels fetched successfully",
    ))
}

async fn get_subscription_status(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(channel_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<SubscriptionStatusResponse> {
    let channel_id = find_channel(&ctx, &channel_id).await?;
    let is_subscribed = subscription_status(&ctx.pool, auth.id(), channel_id).await?;
    Ok(ApiResponse::ok(
        SubscriptionStatusResponse { is_subscribed },
        "Subscription status fetched successfully",
    ))
}

async fn get_subscriber_count(
    Extension(ctx): Extension<Arc<AppContext>>,
    WithRejection(Path(channel_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<SubscriberCountResponse> {
    let channel_id = find_channel(&ctx, &channel_id).await?;
    let subscribers_count = subscriber_count(&ctx.pool, channel_id).await?;
    Ok(ApiResponse::ok(
        SubscriberCountResponse { subscribers_count },
        "Subscriber count fetched successfully",
    ))
}
