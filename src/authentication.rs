use std::sync::Arc;

use crate::config::AppConfig;
use crate::db_helpers::get_public_user_by_id;
use crate::errors::RequestError;
use crate::models::PublicUser;
use crate::AppContext;
use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Extension;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::OffsetDateTime;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessClaim {
    id: i64,
    username: String,
    full_name: String,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaim {
    id: i64,
    // unique per issue, so a rotated token never equals the one it replaces
    jti: String,
    exp: i64,
}

trait Expiring {
    fn subject(&self) -> i64;
    fn expires_at(&self) -> i64;
}

impl Expiring for AccessClaim {
    fn subject(&self) -> i64 {
        self.id
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl Expiring for RefreshClaim {
    fn subject(&self) -> i64 {
        self.id
    }
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// The caller of a protected route, resolved from its access token.
pub struct AuthUser {
    pub user: PublicUser,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// The caller of a public route; `None` when anonymous.
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.user.id)
    }
}

/// Access token from the `accessToken` cookie, else the `Authorization` header.
async fn access_token_from_parts<S>(parts: &mut Parts, state: &S) -> Option<String>
where
    S: Send + Sync,
{
    let jar = CookieJar::from_request_parts(parts, state)
        .await
        .unwrap_or_default();
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_owned());
        }
    }
    let header = parts.headers.get("Authorization")?;
    let header = match header.to_str() {
        Ok(header) => header,
        Err(_) => {
            tracing::debug!("Authorization header is not valid UTF-8");
            return None;
        }
    };
    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

async fn context_from_parts<S>(parts: &mut Parts, state: &S) -> Result<Arc<AppContext>, RequestError>
where
    S: Send + Sync,
{
    let Extension(ctx) = Extension::<Arc<AppContext>>::from_request_parts(parts, state)
        .await
        .map_err(|_| RequestError::server_error("Application context is missing"))?;
    Ok(ctx)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let ctx = context_from_parts(parts, state).await?;
        let token = match access_token_from_parts(parts, state).await {
            Some(token) => token,
            None => return Err(RequestError::not_authorized("Access token is missing")),
        };
        let id = verify_access_token(&ctx.config, &token)?;
        let user = match get_public_user_by_id(&ctx.pool, id).await? {
            Some(user) => user,
            None => return Err(RequestError::not_authorized("Invalid access token")),
        };
        Ok(AuthUser { user })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let ctx = context_from_parts(parts, state).await?;
        let token = match access_token_from_parts(parts, state).await {
            Some(token) => token,
            None => return Ok(MaybeUser(None)),
        };
        // a stale token on a public route is treated as anonymous
        let id = match verify_access_token(&ctx.config, &token) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid access token on public route");
                return Ok(MaybeUser(None));
            }
        };
        let user = get_public_user_by_id(&ctx.pool, id).await?;
        Ok(MaybeUser(user.map(|user| AuthUser { user })))
    }
}

fn encode_claim<T: Serialize>(claim: &T, secret: &str) -> Result<String> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claim,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_ref()),
    )
    .context("Failed to generate jwt token")
}

fn decode_claim<T>(token: &str, secret: &str) -> Result<i64, RequestError>
where
    T: DeserializeOwned + Expiring,
{
    let token_data = jsonwebtoken::decode::<T>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Error verifying token: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                RequestError::not_authorized("Token expired")
            }
            _ => RequestError::not_authorized("Invalid token"),
        }
    })?;
    let claim = token_data.claims;
    if claim.expires_at() < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(RequestError::not_authorized("Token expired"));
    }
    Ok(claim.subject())
}

pub fn issue_access_token(config: &AppConfig, user: &PublicUser) -> Result<String> {
    let expiry_date = OffsetDateTime::now_utc() + config.access_token_expiry;
    let claim = AccessClaim {
        id: user.id,
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        exp: expiry_date.unix_timestamp(),
    };
    encode_claim(&claim, &config.access_token_secret)
}

pub fn issue_refresh_token(config: &AppConfig, id: i64) -> Result<String> {
    let expiry_date = OffsetDateTime::now_utc() + config.refresh_token_expiry;
    let claim = RefreshClaim {
        id,
        jti: uuid::Uuid::new_v4().to_string(),
        exp: expiry_date.unix_timestamp(),
    };
    encode_claim(&claim, &config.refresh_token_secret)
}

pub fn verify_access_token(config: &AppConfig, token: &str) -> Result<i64, RequestError> {
    decode_claim::<AccessClaim>(token, &config.access_token_secret)
}

pub fn verify_refresh_token(config: &AppConfig, token: &str) -> Result<i64, RequestError> {
    decode_claim::<RefreshClaim>(token, &config.refresh_token_secret)
}

fn session_cookie(config: &AppConfig, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .path("/")
        .finish()
}

pub fn with_session_cookies(
    jar: CookieJar,
    config: &AppConfig,
    access_token: &str,
    refresh_token: &str,
) -> CookieJar {
    jar.add(session_cookie(
        config,
        ACCESS_TOKEN_COOKIE,
        access_token.to_owned(),
    ))
    .add(session_cookie(
        config,
        REFRESH_TOKEN_COOKIE,
        refresh_token.to_owned(),
    ))
}

pub fn without_session_cookies(jar: CookieJar, config: &AppConfig) -> CookieJar {
    jar.remove(session_cookie(config, ACCESS_TOKEN_COOKIE, String::new()))
        .remove(session_cookie(config, REFRESH_TOKEN_COOKIE, String::new()))
}

pub async fn verify_password_argon2(password: String, hash: &str) -> Result<bool> {
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to verify password"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, MediaConfig};

    fn config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: "sqlite::memory:".into(),
            access_token_secret: "access-secret".into(),
            access_token_expiry: time::Duration::minutes(15),
            refresh_token_secret: "refresh-secret".into(),
            refresh_token_expiry: time::Duration::days(10),
            cors_origin: "*".into(),
            environment: Environment::Development,
            media: MediaConfig::Local {
                root: "./public/media".into(),
                public_url: "http://localhost".into(),
            },
            upload_tmp_dir: "./public/temp".into(),
            max_upload_bytes: 1024,
        }
    }

    fn user() -> PublicUser {
        PublicUser {
            id: 7,
            username: "ada".into(),
            email: "ada@example.com".into(),
            full_name: "Ada Lovelace".into(),
            avatar: "http://localhost/media/a.png".into(),
            cover_image: None,
            created_at: chrono::NaiveDateTime::default(),
            updated_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn access_token_round_trip() {
        let config = config();
        let token = issue_access_token(&config, &user()).unwrap();
        assert_eq!(verify_access_token(&config, &token).unwrap(), 7);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let config = config();
        let refresh = issue_refresh_token(&config, 7).unwrap();
        assert!(verify_access_token(&config, &refresh).is_err());
        assert_eq!(verify_refresh_token(&config, &refresh).unwrap(), 7);
    }

    #[test]
    fn refresh_tokens_are_unique() {
        let config = config();
        let first = issue_refresh_token(&config, 7).unwrap();
        let second = issue_refresh_token(&config, 7).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = config();
        let claim = RefreshClaim {
            id: 7,
            jti: "fixed".into(),
            exp: (OffsetDateTime::now_utc() - time::Duration::hours(2)).unix_timestamp(),
        };
        let token = encode_claim(&claim, &config.refresh_token_secret).unwrap();
        match verify_refresh_token(&config, &token) {
            Err(RequestError::NotAuthorized(message)) => assert_eq!(message, "Token expired"),
            other => panic!("expected expiry rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password_argon2("hunter2".into()).await.unwrap();
        assert!(verify_password_argon2("hunter2".into(), &hash).await.unwrap());
        assert!(!verify_password_argon2("hunter3".into(), &hash).await.unwrap());
    }
}
