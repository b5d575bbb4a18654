#![allow(dead_code)]

use reqwest::{
    multipart::{Form, Part},
    Method, StatusCode,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;
use videotube::{
    build_app_with_media,
    config::{AppConfig, Environment, MediaConfig},
    get_random_free_port,
    media::{LocalMediaHost, MediaHost},
    run_app,
};

pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub address: String,
    pub db_url: String,
    pub media_root: PathBuf,
    pub client: reqwest::Client,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Environment::Production, |host| host as Arc<dyn MediaHost>).await
}

/// Starts the app in `environment`; `wrap_host` may decorate the local media host.
pub async fn spawn_app_with<F>(environment: Environment, wrap_host: F) -> TestApp
where
    F: FnOnce(Arc<LocalMediaHost>) -> Arc<dyn MediaHost>,
{
    let dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}/test.db?mode=rwc", dir.path().display());
    let (listener, addr) = get_random_free_port().unwrap();
    let address = format!("http://{addr}");
    let media_root = dir.path().join("media");
    let host = LocalMediaHost::new(media_root.clone(), address.clone()).unwrap();
    let config = AppConfig {
        port: addr.port(),
        database_url: db_url.clone(),
        access_token_secret: "test-access-secret".into(),
        access_token_expiry: time::Duration::minutes(15),
        refresh_token_secret: "test-refresh-secret".into(),
        refresh_token_expiry: time::Duration::days(1),
        cors_origin: "*".into(),
        environment,
        media: MediaConfig::Local {
            root: media_root.clone(),
            public_url: address.clone(),
        },
        upload_tmp_dir: dir.path().join("temp"),
        max_upload_bytes: 10 * 1024 * 1024,
    };
    let router = build_app_with_media(config, wrap_host(Arc::new(host)))
        .await
        .unwrap();
    tokio::spawn(run_app(router, listener));
    TestApp {
        address,
        db_url,
        media_root,
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

/// A registered, logged-in user.
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn file_part(name: &'static str, mime: &str) -> Part {
    Part::bytes(b"not really media".to_vec())
        .file_name(name)
        .mime_str(mime)
        .unwrap()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    /// Files currently stored by the local media host.
    pub fn stored_media(&self) -> usize {
        std::fs::read_dir(&self.media_root).unwrap().count()
    }

    pub async fn pool(&self) -> SqlitePool {
        SqlitePool::connect(&self.db_url).await.unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let pool = self.pool().await;
        let (count,) = sqlx::query_as::<sqlx::Sqlite, (i64,)>(sql)
            .fetch_one(&pool)
            .await
            .unwrap();
        count
    }

    /// Sends a request and returns the status with the decoded envelope.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        let body = response.json::<Value>().await.unwrap();
        (status, body)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, token, None).await
    }

    pub fn registration_form(&self, username: &str) -> Form {
        Form::new()
            .text("fullName", format!("{username} Tester"))
            .text("email", format!("{username}@example.com"))
            .text("username", username.to_owned())
            .text("password", PASSWORD)
            .part("avatar", file_part("avatar.png", "image/png"))
    }

    pub async fn post_form(&self, path: &str, token: Option<&str>, form: Form) -> (StatusCode, Value) {
        let mut request = self.client.post(self.url(path)).multipart(form);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json::<Value>().await.unwrap())
    }

    pub async fn register(&self, username: &str) -> Value {
        let (status, body) = self
            .post_form("/users/register", None, self.registration_form(username))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    pub async fn login(&self, username: &str) -> TestUser {
        let (status, body) = self
            .post(
                "/users/login",
                None,
                json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        TestUser {
            id: body["data"]["user"]["id"].as_i64().unwrap(),
            username: username.to_owned(),
            access_token: body["data"]["accessToken"].as_str().unwrap().to_owned(),
            refresh_token: body["data"]["refreshToken"].as_str().unwrap().to_owned(),
        }
    }

    pub async fn signup(&self, username: &str) -> TestUser {
        self.register(username).await;
        self.login(username).await
    }

    pub async fn create_video(&self, user: &TestUser, title: &str) -> i64 {
        let form = Form::new()
            .text("title", title.to_owned())
            .text("description", format!("{title} description"))
            .part("videoFile", file_part("clip.mp4", "video/mp4"))
            .part("thumbnail", file_part("thumb.png", "image/png"));
        let (status, body) = self
            .post_form("/videos", Some(&user.access_token), form)
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn create_tweet(&self, user: &TestUser, content: &str) -> i64 {
        let (status, body) = self
            .post(
                "/tweets",
                Some(&user.access_token),
                json!({ "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }
}
