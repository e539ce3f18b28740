//! Upload ingestion pipeline.
//!
//! 1. validate the form (fatal on failure, nothing written)
//! 2. place lookup and background removal, concurrently
//! 3. dish / restaurant identification on the (possibly processed) image
//! 4. place-link from the chosen candidate
//! 5. blob uploads, then the single INSERT
//!
//! Steps 2–4 degrade to nulls or the original image; only step 5 can fail
//! the request. Blobs written before a failed INSERT are left behind.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{accepts_media_type, ImageInput, LlmError};
use crate::memories::geo::Coordinate;
use crate::memories::identify::resolve_identification;
use crate::models::memory::{MemoryRecord, NewMemory};
use crate::services::background::remove_background;
use crate::services::places::{PlaceCandidate, PlaceSearch};
use crate::state::AppState;

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Raw multipart fields as received.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub image: Option<Bytes>,
    pub content_type: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub taken_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub image: Bytes,
    pub media_type: String,
    pub coordinate: Coordinate,
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub memory: MemoryRecord,
    /// Every nearby name found, for manual override on the client. Not persisted.
    pub nearby_restaurants: Vec<String>,
}

pub fn validate_upload(form: UploadForm) -> Result<ValidatedUpload, AppError> {
    let image = form
        .image
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::Validation("An image is required".to_string()))?;

    let latitude = parse_number("latitude", form.latitude.as_deref())?;
    let longitude = parse_number("longitude", form.longitude.as_deref())?;
    let coordinate = Coordinate::new(latitude, longitude);
    if !coordinate.is_valid() {
        return Err(AppError::Validation(format!(
            "Coordinates out of range: ({latitude}, {longitude})"
        )));
    }

    let taken_at = form.taken_at.as_deref().and_then(|raw| {
        let parsed = parse_taken_at(raw);
        if parsed.is_none() {
            warn!("Ignoring unparseable capture timestamp '{raw}'");
        }
        parsed
    });

    let media_type = detect_media_type(&image, form.content_type.as_deref());

    Ok(ValidatedUpload {
        image,
        media_type,
        coordinate,
        taken_at,
    })
}

fn parse_number(field: &str, raw: Option<&str>) -> Result<f64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("{field} must be a number, got '{raw}'")))?;
    if !value.is_finite() {
        return Err(AppError::Validation(format!("{field} must be finite")));
    }
    Ok(value)
}

/// Accepts RFC 3339 and the EXIF `YYYY:MM:DD HH:MM:SS` form (read as UTC).
pub fn parse_taken_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, EXIF_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Sniffed type wins over the declared one; anything non-image falls back to JPEG.
fn detect_media_type(bytes: &[u8], declared: Option<&str>) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .filter(|m| m.starts_with("image/"))
        .or(declared.filter(|m| m.starts_with("image/")))
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_string()
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" | "image/heif" => "heic",
        _ => "bin",
    }
}

async fn lookup_places(places: &dyn PlaceSearch, at: Coordinate) -> Vec<PlaceCandidate> {
    match places.nearby(at).await {
        Ok(found) => found,
        Err(e) => {
            warn!("Place lookup failed, continuing without candidates: {e}");
            Vec::new()
        }
    }
}

pub async fn ingest_memory(
    state: &AppState,
    upload: ValidatedUpload,
) -> Result<UploadResponse, AppError> {
    let ValidatedUpload {
        image,
        media_type,
        coordinate,
        taken_at,
    } = upload;

    let (candidates, processed) = tokio::join!(
        lookup_places(state.places.as_ref(), coordinate),
        remove_background(state.background.as_ref(), &image),
    );
    let candidate_names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();

    let display = ImageInput {
        media_type: if processed.is_some() {
            "image/png".to_string()
        } else {
            media_type.clone()
        },
        bytes: processed.clone().unwrap_or_else(|| image.clone()),
    };

    let outcome = if accepts_media_type(&display.media_type) {
        state.identifier.identify(&display, &candidate_names).await
    } else {
        Err(LlmError::UnsupportedMediaType(display.media_type.clone()))
    };
    let identification = resolve_identification(outcome, &candidates);

    let stamp = Utc::now().timestamp_millis();
    let original_key = format!("memories/{stamp}-original.{}", extension_for(&media_type));
    let image_url = state.blobs.put(&original_key, image, &media_type).await?;
    let display_image_url = match processed {
        Some(bytes) => {
            let display_key = format!("memories/{stamp}-display.png");
            state.blobs.put(&display_key, bytes, "image/png").await?
        }
        None => image_url.clone(),
    };

    let memory = state
        .store
        .insert(&NewMemory {
            image_url,
            display_image_url,
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            taken_at,
            dish_name: identification.dish_name.clone(),
            restaurant_name: identification.restaurant_name(),
            place_url: identification.place_url(),
        })
        .await?;

    info!(
        "Created memory {} (dish: {:?}, restaurant: {:?}, {} nearby)",
        memory.id,
        memory.dish_name,
        memory.restaurant_name,
        candidate_names.len()
    );

    Ok(UploadResponse {
        memory,
        nearby_restaurants: candidate_names,
    })
}
