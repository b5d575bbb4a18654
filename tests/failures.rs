mod common;

use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use common::{file_part, spawn_app, spawn_app_with};
use reqwest::{multipart::Form, StatusCode};
use videotube::{
    config::Environment,
    media::{LocalMediaHost, MediaError, MediaHost, UploadedMedia},
};

/// Stores files locally but refuses the `fail_at`-th upload (1-based).
struct RefusingHost {
    inner: Arc<LocalMediaHost>,
    uploads: AtomicUsize,
    fail_at: usize,
}

#[axum::async_trait]
impl MediaHost for RefusingHost {
    async fn upload(&self, path: &Path) -> Result<UploadedMedia, MediaError> {
        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_at {
            return Err(MediaError::Rejected("quota exceeded".into()));
        }
        self.inner.upload(path).await
    }

    async fn delete(&self, handle: &str) -> Result<(), MediaError> {
        self.inner.delete(handle).await
    }
}

/// Panics on every upload.
struct PanickingHost;

#[axum::async_trait]
impl MediaHost for PanickingHost {
    async fn upload(&self, _path: &Path) -> Result<UploadedMedia, MediaError> {
        panic!("media host exploded")
    }

    async fn delete(&self, _handle: &str) -> Result<(), MediaError> {
        Ok(())
    }
}

fn refusing(fail_at: usize) -> impl FnOnce(Arc<LocalMediaHost>) -> Arc<dyn MediaHost> {
    move |inner| {
        Arc::new(RefusingHost {
            inner,
            uploads: AtomicUsize::new(0),
            fail_at,
        }) as Arc<dyn MediaHost>
    }
}

#[tokio::test]
async fn development_errors_carry_a_stack() {
    let app = spawn_app_with(Environment::Development, |host| host as Arc<dyn MediaHost>).await;

    let (status, body) = app.get("/videos/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid video ID");
    assert!(body["stack"].as_str().unwrap().contains("Invalid video ID"));

    let (status, body) = app.get("/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["stack"].is_string());
}

#[tokio::test]
async fn production_errors_hide_the_stack() {
    let app = spawn_app().await;
    let (status, body) = app.get("/videos/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn handler_panic_becomes_an_internal_error() {
    let app = spawn_app_with(Environment::Development, |_| {
        Arc::new(PanickingHost) as Arc<dyn MediaHost>
    })
    .await;

    let (status, body) = app
        .post_form("/users/register", None, app.registration_form("pat"))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 500);
    assert_eq!(body["message"], "Something went wrong");
    assert!(body["stack"].as_str().unwrap().contains("media host exploded"));
    assert_eq!(app.count("SELECT COUNT(*) FROM users").await, 0);

    // the server keeps answering
    let (status, _) = app.get("/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn failed_cover_upload_rolls_back_the_avatar() {
    let app = spawn_app_with(Environment::Production, refusing(2)).await;

    let form = app
        .registration_form("quinn")
        .part("coverImage", file_part("cover.png", "image/png"));
    let (status, body) = app.post_form("/users/register", None, form).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Something went wrong");
    assert_eq!(app.stored_media(), 0);
    assert_eq!(app.count("SELECT COUNT(*) FROM users").await, 0);
}

#[tokio::test]
async fn failed_thumbnail_upload_rolls_back_the_video_file() {
    // upload 1 is the avatar, 2 the video file, 3 the thumbnail
    let app = spawn_app_with(Environment::Production, refusing(3)).await;
    let owner = app.signup("rosa").await;
    assert_eq!(app.stored_media(), 1);

    let form = Form::new()
        .text("title", "Lost")
        .text("description", "Never lands")
        .part("videoFile", file_part("clip.mp4", "video/mp4"))
        .part("thumbnail", file_part("thumb.png", "image/png"));
    let (status, _) = app
        .post_form("/videos", Some(&owner.access_token), form)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.stored_media(), 1);
    assert_eq!(app.count("SELECT COUNT(*) FROM videos").await, 0);
}
