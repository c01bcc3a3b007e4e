use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tunevault_core::{validate_song, Duration, Filters, SongDraft, Validator};

use crate::error::{validation_failed, ApiError};
use crate::ApiState;

pub(crate) const SONG_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "duration", "-id", "-title", "-year", "-duration",
];

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CreateSongInput {
    title: String,
    year: i32,
    duration: Duration,
    genres: Vec<String>,
}

pub(crate) async fn create_song(
    State(state): State<ApiState>,
    body: Result<Json<CreateSongInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = body.map_err(bad_request)?;
    let draft = SongDraft {
        title: input.title,
        year: input.year,
        duration: input.duration,
        genres: input.genres,
    };

    let mut v = Validator::new();
    validate_song(&mut v, &draft);
    if !v.valid() {
        return Err(validation_failed(v.into_errors()));
    }

    let song = state.storage().insert(&draft).await?;
    let location = format!("/v1/songs/{}", song.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(json!({ "song": song })),
    )
        .into_response())
}

pub(crate) async fn show_song(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;
    let song = state.storage().get(id).await?;
    Ok(Json(json!({ "song": song })).into_response())
}

/// Partial update: absent (or null) fields keep their stored values. The
/// update itself is a version CAS, so a concurrent writer surfaces as a 409
/// and the client re-reads before retrying.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct UpdateSongInput {
    title: Option<String>,
    year: Option<i32>,
    duration: Option<Duration>,
    genres: Option<Vec<String>>,
}

pub(crate) async fn update_song(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateSongInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;
    let Json(input) = body.map_err(bad_request)?;

    let song = state.storage().get(id).await?;
    let mut draft = song.draft();
    if let Some(title) = input.title {
        draft.title = title;
    }
    if let Some(year) = input.year {
        draft.year = year;
    }
    if let Some(duration) = input.duration {
        draft.duration = duration;
    }
    if let Some(genres) = input.genres {
        draft.genres = genres;
    }

    let mut v = Validator::new();
    validate_song(&mut v, &draft);
    if !v.valid() {
        return Err(validation_failed(v.into_errors()));
    }

    let updated = state.storage().update(song.id, song.version, &draft).await?;
    Ok(Json(json!({ "song": updated })).into_response())
}

pub(crate) async fn delete_song(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;
    state.storage().delete(id).await?;
    Ok(Json(json!({ "message": "song successfully deleted" })).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ListSongsParams {
    title: Option<String>,
    genres: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
    sort: Option<String>,
}

pub(crate) async fn list_songs(
    State(state): State<ApiState>,
    params: Result<Query<ListSongsParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut v = Validator::new();
    let title = params.title.unwrap_or_default();
    let genres = read_csv(params.genres);
    let filters = Filters {
        page: read_int(&mut v, params.page, "page", 1),
        page_size: read_int(&mut v, params.page_size, "page_size", DEFAULT_PAGE_SIZE),
        sort: params.sort.filter(|s| !s.is_empty()).unwrap_or_else(|| "id".to_owned()),
        sort_safelist: SONG_SORT_SAFELIST,
    };
    filters.validate(&mut v);
    if !v.valid() {
        return Err(validation_failed(v.into_errors()));
    }

    let (songs, metadata) = state.storage().list(&title, &genres, &filters).await?;
    Ok(Json(json!({ "songs": songs, "metadata": metadata })).into_response())
}

fn read_csv(raw: Option<String>) -> Vec<String> {
    match raw {
        Some(value) if !value.is_empty() => value.split(',').map(str::to_owned).collect(),
        _ => Vec::new(),
    }
}

fn read_int(v: &mut Validator, raw: Option<String>, field: &str, default: i64) -> i64 {
    match raw {
        Some(value) if !value.is_empty() => value.parse().unwrap_or_else(|_| {
            v.add_error(field, "must be an integer value");
            default
        }),
        _ => default,
    }
}

fn bad_request(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}
