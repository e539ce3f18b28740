use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    Json,
};
use tracing::debug;

use crate::errors::AppError;
use crate::memories::grouping::{group_for_display, GroupedMemories};
use crate::memories::ingest::{ingest_memory, validate_upload, UploadForm, UploadResponse};
use crate::memories::patch::{apply_patch, MemoryPatch};
use crate::models::memory::MemoryRecord;
use crate::state::AppState;

/// Records returned by the list and group views.
pub const LIST_LIMIT: i64 = 100;

type NoStore<T> = ([(header::HeaderName, &'static str); 1], Json<T>);

fn no_store<T>(body: T) -> NoStore<T> {
    ([(header::CACHE_CONTROL, "no-store")], Json(body))
}

/// GET /memories
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<NoStore<Vec<MemoryRecord>>, AppError> {
    let records = state.store.list_recent(LIST_LIMIT).await?;
    Ok(no_store(records))
}

/// GET /memories/groups
pub async fn handle_groups(
    State(state): State<AppState>,
) -> Result<NoStore<GroupedMemories>, AppError> {
    let records = state.store.list_recent(LIST_LIMIT).await?;
    Ok(no_store(group_for_display(&records)))
}

/// POST /upload
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let form = read_upload_form(&mut multipart).await?;
    let upload = validate_upload(form)?;
    let response = ingest_memory(&state, upload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PATCH /memories/:id
pub async fn handle_patch(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<MemoryPatch>, JsonRejection>,
) -> Result<Json<MemoryRecord>, AppError> {
    let Path(id) = id.map_err(|e| AppError::Validation(e.body_text()))?;
    let Json(patch) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let record = apply_patch(state.store.as_ref(), state.places.as_ref(), id, patch).await?;
    Ok(Json(record))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

/// Collects the known fields; unknown ones are skipped.
async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "file" | "photo" => {
                form.content_type = field.content_type().map(str::to_string);
                form.image = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "latitude" | "lat" => form.latitude = Some(field_text(field).await?),
            "longitude" | "lng" | "lon" => form.longitude = Some(field_text(field).await?),
            "taken_at" | "takenAt" => form.taken_at = Some(field_text(field).await?),
            other => debug!("Skipping unknown upload field '{other}'"),
        }
    }

    Ok(form)
}
