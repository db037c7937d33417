use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use axum_macros::debug_handler;
use utoipa::OpenApi;

use std::{convert::Infallible, time::Duration};

use crate::{
    AppState,
    dto::{
        AddMinutesRequest, CounterRequest, CreateNoteRequest, DownloadUrlResponse, FileResponse,
        LeavePresenceQuery, NoteResponse, NoteVersionResponse, PresenceQuery, PresenceResponse,
        ProfileQuery, ProfileResponse, ProgressLogResponse, ProgressQuery, SearchQuery,
        ShareRequest, ShareResponse, ShareRole, SharedNoteResponse, SignedQuery, SortKey,
        UpdateNoteRequest, UpdatePresenceRequest, UpdateProfileRequest, UploadQuery, UserQuery,
    },
    service::ServiceError,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        create_note,
        update_note,
        delete_note,
        get_all_notes,
        search_notes,
        get_note_versions,
        get_categories,
        create_share,
        get_shared_notes,
        get_progress,
        add_study_minutes,
        count_note_created,
        count_quiz_done,
        get_profile,
        update_profile,
        update_presence,
        get_presence,
        leave_presence,
        upload_file,
        get_all_files,
        get_download_url,
        delete_file
    ),
    components(schemas(
        NoteResponse,
        CreateNoteRequest,
        UpdateNoteRequest,
        NoteVersionResponse,
        ShareRequest,
        ShareResponse,
        SharedNoteResponse,
        ShareRole,
        SortKey,
        ProgressLogResponse,
        AddMinutesRequest,
        CounterRequest,
        ProfileResponse,
        UpdateProfileRequest,
        PresenceResponse,
        UpdatePresenceRequest,
        FileResponse,
        DownloadUrlResponse
    )),
    tags(
        (name = "notes", description = "Notes, versions and shares"),
        (name = "progress", description = "Study progress tracking"),
        (name = "profiles", description = "User profiles"),
        (name = "presence", description = "Live collaborator positions"),
        (name = "files", description = "File storage")
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    post,
    path = "/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created successfully", body = NoteResponse),
        (status = 400, description = "Invalid payload"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn create_note(
    State(state): State<AppState>,
    Json(payload): Json<CreateNoteRequest>,
) -> Response {
    match state.notes.create(payload).await {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(ServiceError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => {
            tracing::error!("failed to create note entry: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create note").into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/notes/{id}",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated successfully", body = NoteResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateNoteRequest>,
) -> Response {
    match state.notes.update(id, payload).await {
        Ok(Some(note)) => (StatusCode::OK, Json(note)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Note not found").into_response(),
        Err(ServiceError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => {
            tracing::error!("failed to update note entry: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update note").into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 204, description = "Note deleted successfully"),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn delete_note(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.notes.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Note not found").into_response(),
        Err(e) => {
            tracing::error!("failed to delete note entry: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete note").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/notes",
    params(UserQuery),
    responses(
        (status = 200, description = "The user's notes, most recently updated first", body = Vec<NoteResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn get_all_notes(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Response {
    match state.notes.list(&query.user_id).await {
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(e) => {
            tracing::error!("failed to get note entries: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get all notes").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/notes/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Filtered search results", body = Vec<NoteResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn search_notes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match state.notes.search(&query).await {
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(e) => {
            tracing::error!("failed to search notes: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to search notes").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/notes/{id}/versions",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Version history, newest first", body = Vec<NoteVersionResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn get_note_versions(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.notes.versions(id).await {
        Ok(versions) => (StatusCode::OK, Json(versions)).into_response(),
        Err(e) => {
            tracing::error!("failed to get note versions: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get versions").into_response()
        }
    }
}

/// SSE change feed scoped to one user: `insert`, `update` and `delete`
/// events carrying the affected row (id only for deletes).
#[debug_handler]
pub async fn note_feed(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notes.feed().subscribe();
    let user_id = query.user_id;

    use tokio_stream::StreamExt as _;
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        match result {
            Ok(event) if event.user_id == user_id => {
                let kind = event.change.kind();
                match serde_json::to_string(&event.change.payload()) {
                    Ok(json) => Some(Ok(Event::default().event(kind).data(json))),
                    Err(_) => None,
                }
            }
            Ok(_) => None,
            Err(_) => None, // Skip lagged/closed errors
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

#[utoipa::path(
    get,
    path = "/categories",
    params(UserQuery),
    responses(
        (status = 200, description = "Distinct categories used by the user's notes", body = Vec<String>),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn get_categories(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Response {
    match state.notes.categories(&query.user_id).await {
        Ok(categories) => (StatusCode::OK, Json(categories)).into_response(),
        Err(e) => {
            tracing::error!("failed to get categories: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get categories").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/shares",
    request_body = ShareRequest,
    responses(
        (status = 201, description = "Share created", body = ShareResponse),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn create_share(
    State(state): State<AppState>,
    Json(payload): Json<ShareRequest>,
) -> Response {
    match state.notes.share(&payload).await {
        Ok(Some(share)) => (StatusCode::CREATED, Json(share)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Note not found").into_response(),
        Err(e) => {
            tracing::error!("failed to share note: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to share note").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/shares",
    params(UserQuery),
    responses(
        (status = 200, description = "Notes shared with the user", body = Vec<SharedNoteResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn get_shared_notes(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Response {
    match state.notes.shared_with(&query.user_id).await {
        Ok(shares) => (StatusCode::OK, Json(shares)).into_response(),
        Err(e) => {
            tracing::error!("failed to get shared notes: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get shared notes").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/progress",
    params(ProgressQuery),
    responses(
        (status = 200, description = "Log rows for the trailing window, oldest first", body = Vec<ProgressLogResponse>),
        (status = 400, description = "Invalid window"),
        (status = 500, description = "Internal server error")
    ),
    tag = "progress"
)]
#[debug_handler]
pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Response {
    match state.progress.list(&query.user_id, query.days).await {
        Ok(logs) => (StatusCode::OK, Json(logs)).into_response(),
        Err(ServiceError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => {
            tracing::error!("failed to get progress logs: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get progress").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/progress/minutes",
    request_body = AddMinutesRequest,
    responses(
        (status = 200, description = "Updated log row for today", body = ProgressLogResponse),
        (status = 400, description = "Invalid payload"),
        (status = 500, description = "Internal server error")
    ),
    tag = "progress"
)]
#[debug_handler]
pub async fn add_study_minutes(
    State(state): State<AppState>,
    Json(payload): Json<AddMinutesRequest>,
) -> Response {
    match state
        .progress
        .add_minutes(&payload.user_id, payload.minutes)
        .await
    {
        Ok(log) => (StatusCode::OK, Json(log)).into_response(),
        Err(ServiceError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => {
            tracing::error!("failed to add study minutes: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to log study time").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/progress/notes-created",
    request_body = CounterRequest,
    responses(
        (status = 200, description = "Updated log row for today", body = ProgressLogResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "progress"
)]
#[debug_handler]
pub async fn count_note_created(
    State(state): State<AppState>,
    Json(payload): Json<CounterRequest>,
) -> Response {
    match state.progress.note_created(&payload.user_id).await {
        Ok(log) => (StatusCode::OK, Json(log)).into_response(),
        Err(e) => {
            tracing::error!("failed to increment notes-created counter: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update counter").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/progress/quizzes-done",
    request_body = CounterRequest,
    responses(
        (status = 200, description = "Updated log row for today", body = ProgressLogResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "progress"
)]
#[debug_handler]
pub async fn count_quiz_done(
    State(state): State<AppState>,
    Json(payload): Json<CounterRequest>,
) -> Response {
    match state.progress.quiz_done(&payload.user_id).await {
        Ok(log) => (StatusCode::OK, Json(log)).into_response(),
        Err(e) => {
            tracing::error!("failed to increment quizzes-done counter: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update counter").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/profile",
    params(ProfileQuery),
    responses(
        (status = 200, description = "The profile, created lazily if absent", body = ProfileResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "profiles"
)]
#[debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Response {
    match state
        .profiles
        .fetch_or_create(&query.user_id, query.email.as_deref())
        .await
    {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => {
            tracing::error!("failed to fetch profile: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch profile").into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/profile/{id}",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "profiles"
)]
#[debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Response {
    match state.profiles.update(&id, payload).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Profile not found").into_response(),
        Err(e) => {
            tracing::error!("failed to update profile: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/presence",
    request_body = UpdatePresenceRequest,
    responses(
        (status = 200, description = "Presence recorded", body = PresenceResponse),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "presence"
)]
#[debug_handler]
pub async fn update_presence(
    State(state): State<AppState>,
    Json(payload): Json<UpdatePresenceRequest>,
) -> Response {
    match state.presence.update(payload).await {
        Ok(Some(presence)) => (StatusCode::OK, Json(presence)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Note not found").into_response(),
        Err(e) => {
            tracing::error!("failed to record presence: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to record presence").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/presence",
    params(PresenceQuery),
    responses(
        (status = 200, description = "Collaborators inside the note, freshest first", body = Vec<PresenceResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "presence"
)]
#[debug_handler]
pub async fn get_presence(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
) -> Response {
    match state.presence.list(query.note_id).await {
        Ok(presences) => (StatusCode::OK, Json(presences)).into_response(),
        Err(e) => {
            tracing::error!("failed to list presence: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list presence").into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/presence",
    params(LeavePresenceQuery),
    responses(
        (status = 204, description = "Presence cleared"),
        (status = 404, description = "No presence to clear"),
        (status = 500, description = "Internal server error")
    ),
    tag = "presence"
)]
#[debug_handler]
pub async fn leave_presence(
    State(state): State<AppState>,
    Query(query): Query<LeavePresenceQuery>,
) -> Response {
    match state.presence.leave(query.note_id, &query.user_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "No presence to clear").into_response(),
        Err(e) => {
            tracing::error!("failed to clear presence: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear presence").into_response()
        }
    }
}

/// SSE presence feed scoped to one note: `update` events carrying the
/// collaborator's row and `leave` events carrying only the user id.
#[debug_handler]
pub async fn presence_feed(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.presence.feed().subscribe();
    let note_id = query.note_id;

    use tokio_stream::StreamExt as _;
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        match result {
            Ok(event) if event.note_id == note_id => {
                let kind = event.change.kind();
                match serde_json::to_string(&event.change.payload()) {
                    Ok(json) => Some(Ok(Event::default().event(kind).data(json))),
                    Err(_) => None,
                }
            }
            Ok(_) => None,
            Err(_) => None, // Skip lagged/closed errors
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

#[utoipa::path(
    post,
    path = "/files",
    params(UploadQuery),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Invalid upload"),
        (status = 500, description = "Internal server error")
    ),
    tag = "files"
)]
#[debug_handler]
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Response {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream");

    match state
        .files
        .upload(&query.user_id, &query.name, mime_type, query.note_id, &body)
        .await
    {
        Ok(file) => (StatusCode::CREATED, Json(file)).into_response(),
        Err(ServiceError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
        Err(e) => {
            tracing::error!("failed to store file: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store file").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/files",
    params(UserQuery),
    responses(
        (status = 200, description = "File metadata, newest upload first", body = Vec<FileResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "files"
)]
#[debug_handler]
pub async fn get_all_files(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Response {
    match state.files.list(&query.user_id).await {
        Ok(files) => (StatusCode::OK, Json(files)).into_response(),
        Err(e) => {
            tracing::error!("failed to get file entries: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get files").into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/files/{id}/download-url",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Time-limited signed download URL", body = DownloadUrlResponse),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "files"
)]
#[debug_handler]
pub async fn get_download_url(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.files.download_url(id).await {
        Ok(Some(url)) => (StatusCode::OK, Json(url)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(e) => {
            tracing::error!("failed to issue download url: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to issue URL").into_response()
        }
    }
}

/// Serves a blob addressed by a signed URL from `get_download_url`.
#[debug_handler]
pub async fn download_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Response {
    match state.files.serve(&path, query.expires, &query.sig).await {
        Ok(Some((record, bytes))) => {
            let disposition = format!("attachment; filename=\"{}\"", record.name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, record.mime_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(ServiceError::BadSignature) => {
            (StatusCode::FORBIDDEN, "Download link rejected").into_response()
        }
        Err(e) => {
            tracing::error!("failed to serve file: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to serve file").into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "files"
)]
#[debug_handler]
pub async fn delete_file(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.files.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(e) => {
            tracing::error!("failed to delete file: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete file").into_response()
        }
    }
}
