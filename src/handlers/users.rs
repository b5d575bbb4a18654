use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};

use super::{missing_fields, non_blank, ApiResult};
use crate::{
    authentication::{
        hash_password_argon2, issue_access_token, issue_refresh_token, verify_password_argon2,
        verify_refresh_token, with_session_cookies, without_session_cookies, AuthUser, MaybeUser,
        REFRESH_TOKEN_COOKIE,
    },
    data_formats::{
        ApiResponse, ChangePasswordRequest, ChannelProfileResponse, Empty, ListQuery,
        LoginRequest, LoginResponse, RefreshTokenRequest, TokenPair, UpdateAccountRequest,
        WatchedVideoResponse,
    },
    db_helpers::{
        get_channel_profile, get_user_by_id, get_user_by_login, get_watch_history, insert_user,
        pipeline::Paginated, replace_profile_image, rotate_refresh_token, set_refresh_token,
        update_account, update_password, username_or_email_taken, NewUser, ProfileImage,
    },
    errors::{is_unique_violation, RequestError},
    media::{self, MultipartForm},
    models::PublicUser,
    AppContext, JsonResponse,
};

type SessionResult<T> = Result<(CookieJar, JsonResponse<ApiResponse<T>>), RequestError>;

pub(super) fn routes() -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/logout", post(logout_user))
        .route("/refresh-token", post(refresh_access_token))
        .route("/change-password", post(change_password))
        .route("/current-user", get(get_current_user))
        .route("/update-account", patch(update_account_details))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .route("/c/:username", get(get_channel))
        .route("/watch-history", get(get_user_watch_history))
}

// ----------------- Session Handlers -----------------
async fn register_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    WithRejection(multipart, _): WithRejection<Multipart, RequestError>,
) -> ApiResult<PublicUser> {
    let mut form = MultipartForm::parse(multipart, &ctx.config.upload_tmp_dir).await?;
    let full_name = form.text("fullName");
    let email = form.text("email").map(|email| email.to_lowercase());
    let username = form.text("username").map(|username| username.to_lowercase());
    let password = form.text("password");
    let avatar = form.take_file("avatar");
    let cover_image = form.take_file("coverImage");

    let (full_name, email, username, password, avatar) =
        match (full_name, email, username, password, avatar) {
            (Some(full_name), Some(email), Some(username), Some(password), Some(avatar)) => {
                (full_name, email, username, password, avatar)
            }
            (full_name, email, username, password, avatar) => {
                return Err(missing_fields(
                    "All fields are required",
                    &[
                        ("fullName", full_name.is_some()),
                        ("email", email.is_some()),
                        ("username", username.is_some()),
                        ("password", password.is_some()),
                        ("avatar", avatar.is_some()),
                    ],
                ))
            }
        };

    if username_or_email_taken(&ctx.pool, &username, &email).await? {
        return Err(RequestError::bad_request(
            "User with email or username already exists",
        ));
    }

    let host = ctx.media.as_ref();
    let avatar = media::upload(host, avatar).await?;
    let cover_image = match cover_image {
        Some(file) => match media::upload(host, file).await {
            Ok(uploaded) => Some(uploaded),
            Err(e) => {
                media::rollback_uploads(host, &[&avatar]).await;
                return Err(e.into());
            }
        },
        None => None,
    };
    let mut uploaded = vec![&avatar];
    uploaded.extend(cover_image.as_ref());

    let password_hash = match hash_password_argon2(password).await {
        Ok(hash) => hash,
        Err(e) => {
            media::rollback_uploads(host, &uploaded).await;
            return Err(e.into());
        }
    };
    let new_user = NewUser {
        username: &username,
        email: &email,
        full_name: &full_name,
        password_hash: &password_hash,
        avatar: &avatar,
        cover_image: cover_image.as_ref(),
    };
    let user = match insert_user(&ctx.pool, new_user).await {
        Ok(user) => user,
        Err(e) => {
            media::rollback_uploads(host, &uploaded).await;
            if is_unique_violation(&e) {
                return Err(RequestError::bad_request(
                    "User with email or username already exists",
                ));
            }
            return Err(e);
        }
    };
    tracing::info!(user_id = user.id, "registered user");
    Ok(ApiResponse::created(user, "User registered successfully"))
}

async fn login_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    jar: CookieJar,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, RequestError>,
) -> SessionResult<LoginResponse> {
    let email = non_blank(request.email).map(|email| email.to_lowercase());
    let username = non_blank(request.username).map(|username| username.to_lowercase());
    if email.is_none() && username.is_none() {
        return Err(RequestError::bad_request("Username or email is required"));
    }
    let Some(password) = request.password.filter(|password| !password.is_empty()) else {
        return Err(RequestError::bad_request("Password is required"));
    };

    let user = match get_user_by_login(&ctx.pool, email.as_deref(), username.as_deref()).await? {
        Some(user) => user,
        None => return Err(RequestError::not_found("User does not exist")),
    };
    if !verify_password_argon2(password, &user.password).await? {
        return Err(RequestError::not_authorized("Invalid user credentials"));
    }

    let user = PublicUser::from(user);
    let access_token = issue_access_token(&ctx.config, &user)?;
    let refresh_token = issue_refresh_token(&ctx.config, user.id)?;
    set_refresh_token(&ctx.pool, user.id, Some(&refresh_token)).await?;

    let jar = with_session_cookies(jar, &ctx.config, &access_token, &refresh_token);
    let result = LoginResponse {
        user,
        access_token,
        refresh_token,
    };
    Ok((jar, ApiResponse::ok(result, "User logged in successfully")))
}

async fn logout_user(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    jar: CookieJar,
) -> SessionResult<Empty> {
    set_refresh_token(&ctx.pool, auth.id(), None).await?;
    let jar = without_session_cookies(jar, &ctx.config);
    Ok((jar, ApiResponse::ok(Empty::default(), "User logged out")))
}

async fn refresh_access_token(
    Extension(ctx): Extension<Arc<AppContext>>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> SessionResult<TokenPair> {
    let from_cookie = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty());
    let from_body = body.and_then(|Json(body)| non_blank(body.refresh_token));
    let Some(incoming) = from_cookie.or(from_body) else {
        return Err(RequestError::not_authorized("Unauthorized request"));
    };

    let id = verify_refresh_token(&ctx.config, &incoming)?;
    let user = match get_user_by_id(&ctx.pool, id).await? {
        Some(user) => user,
        None => return Err(RequestError::not_authorized("Invalid refresh token")),
    };
    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        return Err(RequestError::not_authorized(
            "Refresh token is expired or used",
        ));
    }

    let user = PublicUser::from(user);
    let access_token = issue_access_token(&ctx.config, &user)?;
    let refresh_token = issue_refresh_token(&ctx.config, user.id)?;
    if !rotate_refresh_token(&ctx.pool, user.id, &incoming, &refresh_token).await? {
        return Err(RequestError::not_authorized(
            "Refresh token is expired or used",
        ));
    }

    let jar = with_session_cookies(jar, &ctx.config, &access_token, &refresh_token);
    let result = TokenPair {
        access_token,
        refresh_token,
    };
    Ok((jar, ApiResponse::ok(result, "Access token refreshed")))
}

// ----------------- Account Handlers -----------------
async fn change_password(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<ChangePasswordRequest>, RequestError>,
) -> ApiResult<Empty> {
    let old_password = request.old_password.filter(|p| !p.is_empty());
    let new_password = request.new_password.filter(|p| !p.is_empty());
    let (old_password, new_password) = match (old_password, new_password) {
        (Some(old_password), Some(new_password)) => (old_password, new_password),
        (old_password, new_password) => {
            return Err(missing_fields(
                "All fields are required",
                &[
                    ("oldPassword", old_password.is_some()),
                    ("newPassword", new_password.is_some()),
                ],
            ))
        }
    };

    let user = match get_user_by_id(&ctx.pool, auth.id()).await? {
        Some(user) => user,
        None => return Err(RequestError::not_found("User not found")),
    };
    if !verify_password_argon2(old_password, &user.password).await? {
        return Err(RequestError::bad_request("Invalid old password"));
    }
    let password_hash = hash_password_argon2(new_password).await?;
    update_password(&ctx.pool, user.id, &password_hash).await?;
    Ok(ApiResponse::ok(
        Empty::default(),
        "Password changed successfully",
    ))
}

async fn get_current_user(auth: AuthUser) -> ApiResult<PublicUser> {
    Ok(ApiResponse::ok(auth.user, "User fetched successfully"))
}

async fn update_account_details(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Json(request), _): WithRejection<Json<UpdateAccountRequest>, RequestError>,
) -> ApiResult<PublicUser> {
    let full_name = non_blank(request.full_name);
    let email = non_blank(request.email).map(|email| email.to_lowercase());
    if full_name.is_none() && email.is_none() {
        return Err(RequestError::bad_request("At least one field is required"));
    }
    let user = update_account(&ctx.pool, auth.id(), full_name, email)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return RequestError::bad_request("Email is already in use");
            }
            e
        })?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn update_avatar(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, RequestError>,
) -> ApiResult<PublicUser> {
    let user = replace_image(&ctx, auth.id(), multipart, ProfileImage::Avatar).await?;
    Ok(ApiResponse::ok(user, "Avatar image updated successfully"))
}

async fn update_cover_image(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, RequestError>,
) -> ApiResult<PublicUser> {
    let user = replace_image(&ctx, auth.id(), multipart, ProfileImage::CoverImage).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

/// Uploads the new image, points the user at it and then drops the old asset.
async fn replace_image(
    ctx: &AppContext,
    user_id: i64,
    multipart: Multipart,
    slot: ProfileImage,
) -> Result<PublicUser, RequestError> {
    let (field, missing) = match slot {
        ProfileImage::Avatar => ("avatar", "Avatar file is missing"),
        ProfileImage::CoverImage => ("coverImage", "Cover image file is missing"),
    };
    let mut form = MultipartForm::parse(multipart, &ctx.config.upload_tmp_dir).await?;
    let Some(file) = form.take_file(field) else {
        return Err(RequestError::bad_request(missing));
    };

    let host = ctx.media.as_ref();
    let uploaded = media::upload(host, file).await?;
    let (user, old_handle) = match replace_profile_image(&ctx.pool, user_id, slot, &uploaded).await
    {
        Ok(replaced) => replaced,
        Err(e) => {
            media::rollback_uploads(host, &[&uploaded]).await;
            return Err(e);
        }
    };
    if let Some(handle) = old_handle {
        media::delete_quietly(host, &handle).await;
    }
    Ok(user)
}

// ----------------- Channel Handlers -----------------
async fn get_channel(
    Extension(ctx): Extension<Arc<AppContext>>,
    maybe_user: MaybeUser,
    WithRejection(Path(username), _): WithRejection<Path<String>, RequestError>,
) -> ApiResult<ChannelProfileResponse> {
    let username = username.trim().to_lowercase();
    if username.is_empty() {
        return Err(RequestError::bad_request("Username is missing"));
    }
    let channel = match get_channel_profile(&ctx.pool, maybe_user.get_id(), &username).await? {
        Some(channel) => channel,
        None => return Err(RequestError::not_found("Channel does not exist")),
    };
    Ok(ApiResponse::ok(
        channel.into(),
        "User channel fetched successfully",
    ))
}

async fn get_user_watch_history(
    Extension(ctx): Extension<Arc<AppContext>>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RequestError>,
) -> ApiResult<Paginated<WatchedVideoResponse>> {
    let history = get_watch_history(&ctx.pool, auth.id(), query.page_request()?).await?;
    Ok(ApiResponse::ok(
        history.map(WatchedVideoResponse::from),
        "Watch history fetched successfully",
    ))
}
