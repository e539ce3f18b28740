//! Nearby-place lookup (Google Places API, `places:searchNearby`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::memories::geo::Coordinate;
use crate::services::{check_status, http_client, ServiceError};

const GOOGLE_PLACES_BASE_URL: &str = "https://places.googleapis.com";
const SERVICE: &str = "places";
const FIELD_MASK: &str = "places.id,places.displayName";
const MAX_RESULTS: u32 = 10;

/// Search radius around the photo's coordinate.
pub const SEARCH_RADIUS_M: f64 = 50.0;

pub const PLACE_CATEGORIES: &[&str] = &["restaurant", "cafe", "bakery", "bar"];

/// A nearby establishment returned by place search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub place_id: String,
}

impl PlaceCandidate {
    pub fn new(name: impl Into<String>, place_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            place_id: place_id.into(),
        }
    }

    /// Link that opens Google Maps at this establishment.
    pub fn place_url(&self) -> String {
        format!(
            "https://www.google.com/maps/place/?q=place_id:{}",
            self.place_id
        )
    }
}

/// Finds the candidate for `name`: exact match first, then case-insensitive.
pub fn match_candidate<'a>(
    candidates: &'a [PlaceCandidate],
    name: &str,
) -> Option<&'a PlaceCandidate> {
    let name = name.trim();
    candidates.iter().find(|c| c.name == name).or_else(|| {
        let lowered = name.to_lowercase();
        candidates.iter().find(|c| c.name.to_lowercase() == lowered)
    })
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Food and drink establishments within `SEARCH_RADIUS_M` of `at`, nearest first.
    async fn nearby(&self, at: Coordinate) -> Result<Vec<PlaceCandidate>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    id: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<DisplayName>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GooglePlacesClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            base_url: GOOGLE_PLACES_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PlaceSearch for GooglePlacesClient {
    async fn nearby(&self, at: Coordinate) -> Result<Vec<PlaceCandidate>, ServiceError> {
        let body = json!({
            "includedTypes": PLACE_CATEGORIES,
            "maxResultCount": MAX_RESULTS,
            "rankPreference": "DISTANCE",
            "locationRestriction": {
                "circle": {
                    "center": { "latitude": at.latitude, "longitude": at.longitude },
                    "radius": SEARCH_RADIUS_M
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/v1/places:searchNearby", self.base_url))
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let parsed: NearbyResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::invalid(SERVICE, e.to_string()))?;

        let candidates = into_candidates(parsed.places);
        debug!("Place search found {} candidates", candidates.len());
        Ok(candidates)
    }
}

/// Drops entries without an id or a name and keeps the first of duplicate names.
fn into_candidates(places: Vec<RawPlace>) -> Vec<PlaceCandidate> {
    let mut out: Vec<PlaceCandidate> = Vec::new();
    for place in places {
        let name = place
            .display_name
            .and_then(|d| d.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let (Some(name), Some(place_id)) = (name, place.id.filter(|id| !id.is_empty())) else {
            continue;
        };
        if out.iter().any(|c| c.name == name) {
            continue;
        }
        out.push(PlaceCandidate { name, place_id });
    }
    out
}
