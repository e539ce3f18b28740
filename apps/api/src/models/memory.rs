use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::memories::geo::Coordinate;

/// One persisted food photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MemoryRecord {
    pub id: i64,
    pub image_url: String,
    /// Background-removed image, or the original when removal failed.
    pub display_image_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub dish_name: Option<String>,
    pub restaurant_name: Option<String>,
    pub place_url: Option<String>,
    pub friend_tags: Option<Vec<String>>,
    pub note: Option<String>,
    pub neighborhood: Option<String>,
    pub borough: Option<String>,
}

impl MemoryRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// When the dish was eaten: capture time if the photo carried one, else upload time.
    pub fn experienced_at(&self) -> DateTime<Utc> {
        self.taken_at.unwrap_or(self.created_at)
    }
}

/// Insert payload produced by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub image_url: String,
    pub display_image_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub taken_at: Option<DateTime<Utc>>,
    pub dish_name: Option<String>,
    pub restaurant_name: Option<String>,
    pub place_url: Option<String>,
}

/// Fully resolved column values written by a patch.
/// Every field is written; absent patch fields carry the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryChanges {
    pub dish_name: Option<String>,
    pub restaurant_name: Option<String>,
    pub place_url: Option<String>,
    pub friend_tags: Option<Vec<String>>,
    pub note: Option<String>,
}

impl MemoryChanges {
    pub fn from_record(record: &MemoryRecord) -> Self {
        Self {
            dish_name: record.dish_name.clone(),
            restaurant_name: record.restaurant_name.clone(),
            place_url: record.place_url.clone(),
            friend_tags: record.friend_tags.clone(),
            note: record.note.clone(),
        }
    }
}

/// Reverse-geocoded labels written by the backfill job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalityLabels {
    pub neighborhood: Option<String>,
    pub borough: Option<String>,
}

impl LocalityLabels {
    pub fn is_empty(&self) -> bool {
        self.neighborhood.is_none() && self.borough.is_none()
    }
}
