use sqlx::{Sqlite, SqlitePool};

use crate::{
    errors::{is_unique_violation, RequestError},
    models::{Playlist, PlaylistRow, VideoRow},
};

use super::{
    owner_join,
    pipeline::{PageRequest, Paginated, Pipeline, Sort},
    video_pipeline, UpdateBuilder, NOW, OWNER_FIELDS,
};

pub const PLAYLIST_SORT_FIELDS: &[(&str, &str)] = &[
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
    ("name", "name"),
    ("videoCount", "video_count"),
];

// published entries only; unpublished videos stay in the playlist but are hidden
const PUBLISHED_ENTRIES: &str =
    "playlist_videos pe JOIN videos ev ON ev.id = pe.video_id AND ev.is_published = 1";

fn playlist_pipeline(viewer: Option<i64>) -> Pipeline {
    Pipeline::new("playlists p", viewer)
        .project(&[
            ("p.id", "id"),
            ("p.name", "name"),
            ("p.description", "description"),
            ("p.created_at", "created_at"),
            ("p.updated_at", "updated_at"),
        ])
        .lookup(&owner_join("p.owner_id"), OWNER_FIELDS)
        .add_field(
            &format!("(SELECT COUNT(*) FROM {PUBLISHED_ENTRIES} WHERE pe.playlist_id = p.id)"),
            "video_count",
        )
        .add_field(
            &format!(
                "(SELECT COALESCE(SUM(ev.duration), 0.0) FROM {PUBLISHED_ENTRIES} WHERE pe.playlist_id = p.id)"
            ),
            "total_duration",
        )
        .lookup(
            &format!(
                "LEFT JOIN videos fv ON fv.id = (SELECT ev.id FROM {PUBLISHED_ENTRIES} \
                 WHERE pe.playlist_id = p.id ORDER BY pe.position LIMIT 1)"
            ),
            &[
                ("fv.id", "first_video_id"),
                ("fv.title", "first_video_title"),
                ("fv.thumbnail", "first_video_thumbnail"),
            ],
        )
}

pub struct PlaylistFilter {
    pub owner_id: Option<i64>,
    pub query: Option<String>,
    /// Hide playlists with no published video.
    pub non_empty: bool,
    pub sort: Sort,
}

pub async fn list_playlists(
    pool: &SqlitePool,
    viewer: Option<i64>,
    filter: PlaylistFilter,
    page: PageRequest,
) -> Result<Paginated<PlaylistRow>, RequestError> {
    let mut pipeline = playlist_pipeline(viewer);
    if let Some(owner_id) = filter.owner_id {
        pipeline = pipeline.match_eq("p.owner_id", owner_id);
    }
    pipeline = pipeline.search(&["p.name", "p.description"], filter.query.as_deref());
    if filter.non_empty {
        pipeline = pipeline.match_computed("video_count > 0");
    }
    let playlists = pipeline.sort(filter.sort).paginate(pool, page).await?;
    Ok(playlists)
}

pub async fn get_playlist_row(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Option<PlaylistRow>, RequestError> {
    let playlist = playlist_pipeline(viewer)
        .match_eq("p.id", id)
        .fetch_optional(pool)
        .await?;
    Ok(playlist)
}

/// The playlist's published videos in the order they were added.
pub async fn get_playlist_videos(
    pool: &SqlitePool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Vec<VideoRow>, RequestError> {
    let videos = video_pipeline(
        "videos v JOIN playlist_videos pv ON pv.video_id = v.id",
        viewer,
    )
    .add_field("pv.position", "position")
    .match_eq("pv.playlist_id", id)
    .match_eq("v.is_published", 1_i64)
    .sort(Sort::asc("position"))
    .fetch_all(pool)
    .await?;
    Ok(videos)
}

pub async fn get_playlist(pool: &SqlitePool, id: i64) -> Result<Option<Playlist>, RequestError> {
    let playlist = sqlx::query_as::<Sqlite, Playlist>(
        "SELECT id, owner_id FROM playlists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(playlist)
}

pub async fn insert_playlist(
    pool: &SqlitePool,
    owner_id: i64,
    name: &str,
    description: &str,
) -> Result<i64, RequestError> {
    let mut tx = pool.begin().await?;
    let id = sqlx::query::<Sqlite>("INSERT INTO playlists (name, description, owner_id) VALUES (?, ?, ?)")
        .bind(name)
        .bind(description)
        .bind(owner_id)
        .execute(&mut tx)
        .await?
        .last_insert_rowid();
    tx.commit().await?;
    Ok(id)
}

pub async fn update_playlist(
    pool: &SqlitePool,
    id: i64,
    name: Option<String>,
    description: Option<String>,
) -> Result<(), RequestError> {
    let updated = UpdateBuilder::new("playlists")
        .set("name", name)
        .set("description", description)
        .execute(pool, id)
        .await?;
    if !updated {
        return Err(RequestError::not_found("Playlist not found"));
    }
    Ok(())
}

pub async fn delete_playlist(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM playlists WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(RequestError::not_found("Playlist not found"));
    }
    tx.commit().await?;
    Ok(())
}

/// Appends the video to the end of the playlist.
pub async fn add_playlist_video(
    pool: &SqlitePool,
    playlist_id: i64,
    video_id: i64,
) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO playlist_videos (playlist_id, video_id, position) \
         SELECT ?, ?, COALESCE(MAX(position), 0) + 1 FROM playlist_videos WHERE playlist_id = ?",
    )
    .bind(playlist_id)
    .bind(video_id)
    .bind(playlist_id)
    .execute(&mut tx)
    .await
    .map_err(RequestError::from);
    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            return Err(RequestError::bad_request("Video already exists in playlist"));
        }
        return Err(e);
    }
    touch_playlist(&mut tx, playlist_id).await?;
    tx.commit().await?;
    Ok(())
}

/// Returns `false` when the video was not in the playlist.
pub async fn remove_playlist_video(
    pool: &SqlitePool,
    playlist_id: i64,
    video_id: i64,
) -> Result<bool, RequestError> {
    let mut tx = pool.begin().await?;
    let removed = sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
        .bind(playlist_id)
        .bind(video_id)
        .execute(&mut tx)
        .await?;
    if removed.rows_affected() == 0 {
        return Ok(false);
    }
    touch_playlist(&mut tx, playlist_id).await?;
    tx.commit().await?;
    Ok(true)
}

async fn touch_playlist(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    playlist_id: i64,
) -> Result<(), sqlx::Error> {
    let query = format!("UPDATE playlists SET updated_at = {NOW} WHERE id = ?");
    sqlx::query(&query).bind(playlist_id).execute(&mut *tx).await?;
    Ok(())
}
