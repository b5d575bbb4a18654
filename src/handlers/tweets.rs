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
    data_formats::{ApiResponse, ContentRequest, Empty, ListQuery, TweetResponse},
    db_helpers::{
        delete_tweet, get_tweet, get_tweet_row, insert_tweet, list_tweets, pipeline::Paginated,
        update_tweet, user_exists, TweetScope, TWEET_SORT_FIELDS,
    },
    errors::RequestError,
    models::Tweet,
    AppContext,
};

const MAX_TWEET_LENGTH: usize = 280;

pub(super) fn routes() -> Router {
    Router::new()
        .route("/", get(get_all_tweets).post(create_tweet))
        .route("/feed/subscribed", get(get_subscribed_feed))
        .route("/user/:user_id", get(get_user_tweets))
        .route(
            "/:tweet_id",
            get(get_tweet_by_id)
                .patch(update_tweet_content)
                .delete(delete_tweet_by_id),
        )
}

/// Trimmed, non-blank and at most [`MAX_TWEET_LENGTH`] characters.
fn tweet_content(content: Option<String>) -> Result<String, RequestError> {
    let content = required(content, "Tweet content is required")?;
    if content.chars().count() > MAX_TWEET_LENGTH {
        return Err(RequestError::bad_request(format!(
            "Tweet content cannot exceed {MAX_TWEET_LENGTH} characters"
        )));
    }
    Ok(content)
}

async fn get_all_tweets(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<TweetResponse>> {
    let tweets = list_tweets(
        &ctx.pool,
        maybe_user.get_id(),
        TweetScope::All,
        query.search_term().as_deref(),
        query.sort(TWEET_SORT_FIELDS, "createdAt")?,
        query.page_request()?,
    )
    .await?;
    Ok(ApiResponse::ok(
        tweets.map(TweetResponse::from),
        "Tweets fetched successfully",
    ))
}

async fn get_subscribed_feed(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<TweetResponse>> {
    let tweets = list_tweets(
        &ctx.pool,
        Some(auth.id()),
        TweetScope::Feed(auth.id()),
        query.search_term().as_deref(),
        query.sort(TWEET_SORT_FIELDS, "createdAt")?,
        query.page_request()?,
    )
    .await?;
    Ok(ApiResponse::ok(
        tweets.map(TweetResponse::from),
        "Feed fetched successfully",
    ))
}

async fn get_user_tweets(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(user_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<TweetResponse>> {
    let user_id = parse_id(&user_id, "user")?;
    let sort = query.sort(TWEET_SORT_FIELDS, "createdAt")?;
    let page = query.page_request()?;
    if !user_exists(&ctx.pool, user_id).await? {
        return Err(RequestError::not_found("User not found"));
    }
    let tweets = list_tweets(
        &ctx.pool,
        maybe_user.get_id(),
        TweetScope::Author(user_id),
        query.search_term().as_deref(),
        sort,
        page,
    )
    .await?;
    Ok(ApiResponse::ok(
        tweets.map(TweetResponse::from),
        "User tweets fetched successfully",
    ))
}

async fn get_tweet_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(tweet_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<TweetResponse> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let tweet = match get_tweet_row(&ctx.pool, maybe_user.get_id(), tweet_id).await? {
        Some(tweet) => tweet,
        None => return Err(RequestError::not_found("Tweet not found")),
    };
    Ok(ApiResponse::ok(tweet.into(), "Tweet fetched successfully"))
}

async fn create_tweet(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<ContentRequest>, RequestError>,
) -> ApiResult<TweetResponse> {
    let content = tweet_content(request.content)?;
    let id = insert_tweet(&ctx.pool, auth.id(), &content).await?;
    let tweet = match get_tweet_row(&ctx.pool, Some(auth.id()), id).await? {
        Some(tweet) => tweet,
        None => return Err(RequestError::server_error("Tweet was not saved")),
    };
    Ok(ApiResponse::created(
        tweet.into(),
        "Tweet created successfully",
    ))
}

async fn update_tweet_content(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(tweet_id), _): WithRejection<Path<String>, RequestError>,
    WithRejection(Json(request), _): WithRejection<Json<ContentRequest>, RequestError>,
) -> ApiResult<TweetResponse> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let content = tweet_content(request.content)?;
    let tweet = find_owned_tweet(&ctx, tweet_id, auth.id(), "update").await?;
    update_tweet(&ctx.pool, tweet.id, content).await?;
    let tweet = match get_tweet_row(&ctx.pool, Some(auth.id()), tweet.id).await? {
        Some(tweet) => tweet,
        None => return Err(RequestError::not_found("Tweet not found")),
    };
    Ok(ApiResponse::ok(tweet.into(), "Tweet updated successfully"))
}

async fn delete_tweet_by_id(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Path(tweet_id), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<Empty> {
    let tweet_id = parse_id(&tweet_id, "tweet")?;
    let tweet = find_owned_tweet(&ctx, tweet_id, auth.id(), "delete").await?;
    delete_tweet(&ctx.pool, tweet.id).await?;
    Ok(ApiResponse::ok(Empty::default(), "Tweet deleted successfully"))
}

async fn find_owned_tweet(
    ctx: &AppContext,
    tweet_id: i64,
    user_id: i64,
    action: &str,
) -> Result<Tweet, RequestError> {
    let tweet = match get_tweet(&ctx.pool, tweet_id).await? {
        Some(tweet) => tweet,
        None => return Err(RequestError::not_found("Tweet not found")),
    };
    ensure_owner(
        tweet.owner_id,
        user_id,
        &format!("You are not allowed to {action} this tweet"),
    )?;
    Ok(tweet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_length_counts_characters() {
        let exact = "é".repeat(MAX_TWEET_LENGTH);
        assert_eq!(tweet_content(Some(exact.clone())).unwrap(), exact);

        let over = "a".repeat(MAX_TWEET_LENGTH + 1);
        match tweet_content(Some(over)) {
            Err(RequestError::BadRequest(message)) => {
                assert_eq!(message, "Tweet content cannot exceed 280 characters")
            }
            other => panic!("expected length rejection, got {other:?}"),
        }
    }

    #[test]
    fn tweet_content_is_trimmed() {
        assert_eq!(tweet_content(Some("  hi  ".into())).unwrap(), "hi");
        assert!(matches!(
            tweet_content(Some("   ".into())),
            Err(RequestError::BadRequest(_))
        ));
        assert!(tweet_content(None).is_err());
    }
}
