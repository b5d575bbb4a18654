mod common;

use common::spawn_app;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn owner_only_edit_and_like_toggle() {
    let app = spawn_app().await;
    let a = app.signup("alice").await;
    let video = app.create_video(&a, "Intro").await;
    let b = app.signup("bob").await;

    let (status, body) = app
        .patch(
            &format!("/videos/{video}"),
            Some(&b.access_token),
            json!({ "title": "Hijacked" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .post(&format!("/likes/toggle/v/{video}"), Some(&a.access_token), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["isLiked"], true);
    assert_eq!(body["data"]["likesCount"], 1);

    let (status, body) = app
        .post(&format!("/likes/toggle/v/{video}"), Some(&a.access_token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLiked"], false);
    assert_eq!(body["data"]["likesCount"], 0);

    let (_, body) = app.get(&format!("/videos/{video}"), None).await;
    assert_eq!(body["data"]["title"], "Intro");
}

#[tokio::test]
async fn anonymous_view_counts_once() {
    let app = spawn_app().await;
    let owner = app.signup("carol").await;
    let video = app.create_video(&owner, "Walkthrough").await;

    let (status, body) = app.get(&format!("/videos/{video}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["views"], 1);
    assert_eq!(body["data"]["isLiked"], false);
    assert_eq!(body["data"]["owner"]["isSubscribed"], false);
    assert_eq!(body["data"]["owner"]["username"], "carol");
    assert_eq!(
        app.count(&format!("SELECT views FROM videos WHERE id = {video}"))
            .await,
        1
    );
    assert_eq!(app.count("SELECT COUNT(*) FROM watch_history").await, 0);

    let (_, body) = app.get(&format!("/videos/{video}"), None).await;
    assert_eq!(body["data"]["views"], 2);
}

#[tokio::test]
async fn missing_video_is_not_found_before_forbidden() {
    let app = spawn_app().await;
    let stranger = app.signup("dave").await;

    let (status, _) = app
        .patch("/videos/9999", Some(&stranger.access_token), json!({ "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete("/videos/9999", Some(&stranger.access_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/videos/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid video ID");
}

#[tokio::test]
async fn owner_updates_and_unpublishes() {
    let app = spawn_app().await;
    let owner = app.signup("erin").await;
    let video = app.create_video(&owner, "Draft").await;

    let (status, body) = app
        .patch(
            &format!("/videos/{video}"),
            Some(&owner.access_token),
            json!({ "description": "Now with words" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Draft");
    assert_eq!(body["data"]["description"], "Now with words");

    let (status, body) = app
        .patch(
            &format!("/videos/toggle/publish/{video}"),
            Some(&owner.access_token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isPublished"], false);

    let (status, _) = app.get(&format!("/videos/{video}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .get(&format!("/videos/{video}"), Some(&owner.access_token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/videos", None).await;
    assert_eq!(body["data"]["totalDocs"], 0);
}

#[tokio::test]
async fn deleting_a_video_removes_its_dependents() {
    let app = spawn_app().await;
    let owner = app.signup("frank").await;
    let fan = app.signup("gina").await;
    let video = app.create_video(&owner, "Doomed").await;
    let keeper = app.create_video(&owner, "Keeper").await;

    let (status, body) = app
        .post(
            &format!("/comments/video/{video}"),
            Some(&fan.access_token),
            json!({ "content": "first!" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment = body["data"]["id"].as_i64().unwrap();

    for path in [
        format!("/likes/toggle/v/{video}"),
        format!("/likes/toggle/c/{comment}"),
        format!("/likes/toggle/v/{keeper}"),
    ] {
        let (status, _) = app.post(&path, Some(&fan.access_token), json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = app
        .post(
            "/playlists",
            Some(&fan.access_token),
            json!({ "name": "Mix", "description": "Assorted" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let playlist = body["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .patch(
            &format!("/playlists/add/{video}/{playlist}"),
            Some(&fan.access_token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.get(&format!("/videos/{video}"), Some(&fan.access_token))
        .await;

    let (status, _) = app
        .delete(&format!("/videos/{video}"), Some(&fan.access_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/videos/{video}"), Some(&owner.access_token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let remaining = [
        format!("SELECT COUNT(*) FROM likes WHERE target_type = 'video' AND target_id = {video}"),
        format!("SELECT COUNT(*) FROM likes WHERE target_type = 'comment' AND target_id = {comment}"),
        format!("SELECT COUNT(*) FROM comments WHERE video_id = {video}"),
        format!("SELECT COUNT(*) FROM playlist_videos WHERE video_id = {video}"),
        format!("SELECT COUNT(*) FROM watch_history WHERE video_id = {video}"),
        format!("SELECT COUNT(*) FROM videos WHERE id = {video}"),
    ];
    for sql in remaining {
        assert_eq!(app.count(&sql).await, 0, "{sql}");
    }
    // unrelated likes survive
    assert_eq!(
        app.count(&format!(
            "SELECT COUNT(*) FROM likes WHERE target_type = 'video' AND target_id = {keeper}"
        ))
        .await,
        1
    );

    let (status, _) = app.get(&format!("/videos/{video}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_paginates() {
    let app = spawn_app().await;
    let owner = app.signup("hank").await;
    for title in ["one", "two", "three"] {
        app.create_video(&owner, title).await;
    }

    let (status, body) = app.get("/videos?page=1&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["docs"].as_array().unwrap().len(), 2);
    assert_eq!(page["totalDocs"], 3);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["hasNextPage"], true);
    assert_eq!(page["nextPage"], 2);
    assert_eq!(page["hasPrevPage"], false);

    let (_, body) = app.get("/videos?page=2&limit=2", None).await;
    assert_eq!(body["data"]["docs"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["pagingCounter"], 3);

    let (status, body) = app.get("/videos?page=5&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["docs"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/videos?sortBy=title&sortType=asc", None).await;
    let titles: Vec<_> = body["data"]["docs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["title"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(titles, ["one", "three", "two"]);

    let (_, body) = app.get("/videos?query=THR", None).await;
    assert_eq!(body["data"]["totalDocs"], 1);

    let (_, body) = app
        .get(&format!("/videos?userId={}", owner.id + 100), None)
        .await;
    assert_eq!(body["data"]["totalDocs"], 0);

    let (status, body) = app.get("/videos?limit=101", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Limit too high: maximum allowed is 100");

    let (status, _) = app.get("/videos?sortBy=password", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_collection_is_an_empty_page() {
    let app = spawn_app().await;
    let (status, body) = app.get("/videos", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalDocs"], 0);
    assert_eq!(body["data"]["totalPages"], 1);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["limit"], 10);
}

#[tokio::test]
async fn publishing_requires_every_field() {
    let app = spawn_app().await;
    let owner = app.signup("ivy").await;
    let form = reqwest::multipart::Form::new().text("title", "No files");
    let (status, body) = app
        .post_form("/videos", Some(&owner.access_token), form)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|error| error["field"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(fields, ["description", "videoFile", "thumbnail"]);
    assert_eq!(app.count("SELECT COUNT(*) FROM videos").await, 0);
}

#[tokio::test]
async fn video_edits_are_read_back_at_once() {
    let app = spawn_app().await;
    let owner = app.signup("jules").await;
    let video = app.create_video(&owner, "Take 0").await;

    for round in 1..=6 {
        let title = format!("Take {round}");
        let (status, body) = app
            .patch(
                &format!("/videos/{video}"),
                Some(&owner.access_token),
                json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], title);

        let (status, body) = app
            .patch(
                &format!("/videos/toggle/publish/{video}"),
                Some(&owner.access_token),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        // starts published, so odd rounds unpublish
        let published = round % 2 == 0;
        assert_eq!(body["data"]["isPublished"], published);

        let (_, body) = app.get("/videos", None).await;
        assert_eq!(body["data"]["totalDocs"], i64::from(published));
    }
}
