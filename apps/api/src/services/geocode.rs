//! Reverse geocoding for the neighborhood backfill (Google Geocoding API).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::memories::geo::Coordinate;
use crate::models::memory::LocalityLabels;
use crate::services::{check_status, http_client, ServiceError};

const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com";
const SERVICE: &str = "geocoding";

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn locality(&self, at: Coordinate) -> Result<LocalityLabels, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Clone)]
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            base_url: GOOGLE_MAPS_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    async fn locality(&self, at: Coordinate) -> Result<LocalityLabels, ServiceError> {
        let latlng = format!("{},{}", at.latitude, at.longitude);
        let response = self
            .client
            .get(format!("{}/maps/api/geocode/json", self.base_url))
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?;
        let response = check_status(SERVICE, response).await?;

        let parsed: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::invalid(SERVICE, e.to_string()))?;

        match parsed.status.as_str() {
            "OK" => Ok(extract_labels(&parsed.results)),
            "ZERO_RESULTS" => Ok(LocalityLabels::default()),
            other => Err(ServiceError::invalid(
                SERVICE,
                format!(
                    "status {other}: {}",
                    parsed.error_message.unwrap_or_default()
                ),
            )),
        }
    }
}

/// First neighborhood and first sublocality across all results.
fn extract_labels(results: &[GeocodeResult]) -> LocalityLabels {
    LocalityLabels {
        neighborhood: first_component(results, &["neighborhood"]),
        borough: first_component(results, &["sublocality_level_1", "sublocality"]),
    }
}

fn first_component(results: &[GeocodeResult], wanted: &[&str]) -> Option<String> {
    results
        .iter()
        .flat_map(|r| r.address_components.iter())
        .find(|c| c.types.iter().any(|t| wanted.contains(&t.as_str())))
        .map(|c| c.long_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(server: &MockServer) -> GoogleGeocoder {
        GoogleGeocoder::new("geo-key".to_string(), 5)
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_locality_extracts_neighborhood_and_borough() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .and(query_param("latlng", "40.7484,-73.9857"))
            .and(query_param("key", "geo-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [
                    { "address_components": [
                        { "long_name": "350", "types": ["street_number"] },
                        { "long_name": "Manhattan", "types": ["political", "sublocality", "sublocality_level_1"] }
                    ]},
                    { "address_components": [
                        { "long_name": "Midtown", "types": ["neighborhood", "political"] },
                        { "long_name": "Brooklyn", "types": ["sublocality"] }
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let labels = client(&server)
            .locality(Coordinate::new(40.7484, -73.9857))
            .await
            .unwrap();
        assert_eq!(labels.neighborhood.as_deref(), Some("Midtown"));
        assert_eq!(labels.borough.as_deref(), Some("Manhattan"));
    }

    #[tokio::test]
    async fn test_zero_results_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "ZERO_RESULTS", "results": [] })),
            )
            .mount(&server)
            .await;

        let labels = client(&server)
            .locality(Coordinate::new(0.0, 0.0))
            .await
            .unwrap();
        assert!(labels.is_empty());
    }

    #[tokio::test]
    async fn test_denied_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_DENIED",
                "error_message": "bad key"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .locality(Coordinate::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse { .. }));
    }
}
