//! In-memory fakes for every collaborator in `AppState`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::Config;
use crate::llm_client::{ImageInput, LlmError};
use crate::memories::geo::Coordinate;
use crate::memories::identify::{DishIdentifier, IdentifyOutcome};
use crate::memories::store::RecordStore;
use crate::models::memory::{LocalityLabels, MemoryChanges, MemoryRecord, NewMemory};
use crate::services::background::{BackgroundRemover, RemovalMode};
use crate::services::blob::{public_url, BlobStore};
use crate::services::geocode::ReverseGeocoder;
use crate::services::places::{PlaceCandidate, PlaceSearch};
use crate::services::ServiceError;
use crate::state::AppState;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// A record with every optional field empty.
pub fn record_at(id: i64, at: Coordinate) -> MemoryRecord {
    MemoryRecord {
        id,
        image_url: format!("https://cdn.test/memories/{id}-original.jpg"),
        display_image_url: format!("https://cdn.test/memories/{id}-original.jpg"),
        latitude: at.latitude,
        longitude: at.longitude,
        created_at: epoch(),
        taken_at: None,
        dish_name: None,
        restaurant_name: None,
        place_url: None,
        friend_tags: None,
        note: None,
        neighborhood: None,
        borough: None,
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<MemoryRecord>>,
    failing: bool,
}

impl InMemoryStore {
    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn snapshot(&self) -> Vec<MemoryRecord> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.failing {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list_recent(&self, limit: i64) -> Result<Vec<MemoryRecord>, sqlx::Error> {
        self.check()?;
        let mut records = self.snapshot();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn get(&self, id: i64) -> Result<Option<MemoryRecord>, sqlx::Error> {
        self.check()?;
        Ok(self.snapshot().into_iter().find(|r| r.id == id))
    }

    async fn insert(&self, memory: &NewMemory) -> Result<MemoryRecord, sqlx::Error> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = MemoryRecord {
            id,
            image_url: memory.image_url.clone(),
            display_image_url: memory.display_image_url.clone(),
            latitude: memory.latitude,
            longitude: memory.longitude,
            created_at: epoch() + Duration::seconds(id),
            taken_at: memory.taken_at,
            dish_name: memory.dish_name.clone(),
            restaurant_name: memory.restaurant_name.clone(),
            place_url: memory.place_url.clone(),
            friend_tags: None,
            note: None,
            neighborhood: None,
            borough: None,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        changes: &MemoryChanges,
    ) -> Result<Option<MemoryRecord>, sqlx::Error> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        Ok(records.iter_mut().find(|r| r.id == id).map(|r| {
            r.dish_name = changes.dish_name.clone();
            r.restaurant_name = changes.restaurant_name.clone();
            r.place_url = changes.place_url.clone();
            r.friend_tags = changes.friend_tags.clone();
            r.note = changes.note.clone();
            r.clone()
        }))
    }

    async fn missing_locality(&self, limit: i64) -> Result<Vec<MemoryRecord>, sqlx::Error> {
        self.check()?;
        let mut records: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.neighborhood.is_none() || r.borough.is_none())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn merge_locality(&self, id: i64, labels: &LocalityLabels) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let Some(r) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        let mut changed = false;
        if r.neighborhood.is_none() && labels.neighborhood.is_some() {
            r.neighborhood = labels.neighborhood.clone();
            changed = true;
        }
        if r.borough.is_none() && labels.borough.is_some() {
            r.borough = labels.borough.clone();
            changed = true;
        }
        Ok(changed)
    }
}

pub struct StaticPlaces {
    candidates: Vec<PlaceCandidate>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticPlaces {
    pub fn new(candidates: Vec<PlaceCandidate>) -> Self {
        Self {
            candidates,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            failing: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceSearch for StaticPlaces {
    async fn nearby(&self, _at: Coordinate) -> Result<Vec<PlaceCandidate>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ServiceError::invalid("places", "scripted failure"));
        }
        Ok(self.candidates.clone())
    }
}

pub struct FailingBackground;

#[async_trait]
impl BackgroundRemover for FailingBackground {
    async fn remove(&self, _image: &Bytes, _mode: RemovalMode) -> Result<Bytes, ServiceError> {
        Err(ServiceError::invalid("background-removal", "scripted failure"))
    }
}

/// Replays results in order; fails once the script runs out.
pub struct ScriptedBackground {
    script: Mutex<VecDeque<Result<Bytes, ServiceError>>>,
    modes: Mutex<Vec<RemovalMode>>,
}

impl ScriptedBackground {
    pub fn new(script: Vec<Result<Bytes, ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn modes(&self) -> Vec<RemovalMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackgroundRemover for ScriptedBackground {
    async fn remove(&self, _image: &Bytes, mode: RemovalMode) -> Result<Bytes, ServiceError> {
        self.modes.lock().unwrap().push(mode);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::invalid("background-removal", "script exhausted")))
    }
}

type IdentifyFn = dyn Fn(&[String]) -> Result<IdentifyOutcome, LlmError> + Send + Sync;

pub struct ScriptedIdentifier {
    respond: Box<IdentifyFn>,
    calls: Mutex<Vec<Vec<String>>>,
    media_types: Mutex<Vec<String>>,
}

impl ScriptedIdentifier {
    pub fn returning<F>(respond: F) -> Self
    where
        F: Fn(&[String]) -> Result<IdentifyOutcome, LlmError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
            media_types: Mutex::new(Vec::new()),
        }
    }

    /// Candidate lists seen, one entry per call.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn media_types(&self) -> Vec<String> {
        self.media_types.lock().unwrap().clone()
    }
}

#[async_trait]
impl DishIdentifier for ScriptedIdentifier {
    async fn identify(
        &self,
        image: &ImageInput,
        candidates: &[String],
    ) -> Result<IdentifyOutcome, LlmError> {
        self.calls.lock().unwrap().push(candidates.to_vec());
        self.media_types
            .lock()
            .unwrap()
            .push(image.media_type.clone());
        (self.respond)(candidates)
    }
}

#[derive(Default)]
pub struct MemoryBlobs {
    objects: Mutex<Vec<(String, Bytes, String)>>,
    failing: bool,
}

impl MemoryBlobs {
    pub fn failing() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, ServiceError> {
        if self.failing {
            return Err(ServiceError::Storage(format!("scripted failure for {key}")));
        }
        self.objects
            .lock()
            .unwrap()
            .push((key.to_string(), bytes, content_type.to_string()));
        Ok(public_url("https://cdn.test", key))
    }
}

/// Geocoder keyed by record latitude; unknown points yield empty labels.
#[derive(Default)]
pub struct StaticGeocoder {
    answers: Vec<(f64, Result<LocalityLabels, String>)>,
    calls: AtomicUsize,
}

impl StaticGeocoder {
    pub fn answer(mut self, latitude: f64, labels: LocalityLabels) -> Self {
        self.answers.push((latitude, Ok(labels)));
        self
    }

    pub fn fail_at(mut self, latitude: f64) -> Self {
        self.answers
            .push((latitude, Err("scripted failure".to_string())));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn locality(&self, at: Coordinate) -> Result<LocalityLabels, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.iter().find(|(lat, _)| *lat == at.latitude) {
            Some((_, Ok(labels))) => Ok(labels.clone()),
            Some((_, Err(e))) => Err(ServiceError::invalid("geocoding", e.clone())),
            None => Ok(LocalityLabels::default()),
        }
    }
}

/// Builder for an `AppState` wired entirely to fakes.
///
/// Defaults: empty store, no nearby places, background removal always
/// failing, identification returning nothing.
pub struct Fakes {
    pub store: Arc<InMemoryStore>,
    pub blobs: Arc<MemoryBlobs>,
    pub places: Arc<StaticPlaces>,
    pub background: Arc<dyn BackgroundRemover>,
    pub identifier: Arc<ScriptedIdentifier>,
    pub config: Config,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::default()),
            blobs: Arc::new(MemoryBlobs::default()),
            places: Arc::new(StaticPlaces::new(Vec::new())),
            background: Arc::new(FailingBackground),
            identifier: Arc::new(ScriptedIdentifier::returning(|_| {
                Ok(IdentifyOutcome::Structured {
                    dish: None,
                    restaurant: None,
                })
            })),
            config: Config::for_tests(),
        }
    }

    pub fn with_store(mut self, store: InMemoryStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn with_failing_store(self) -> Self {
        self.with_store(InMemoryStore::failing())
    }

    pub fn with_failing_blobs(mut self) -> Self {
        self.blobs = Arc::new(MemoryBlobs::failing());
        self
    }

    pub fn with_places(mut self, places: StaticPlaces) -> Self {
        self.places = Arc::new(places);
        self
    }

    pub fn with_background(mut self, background: ScriptedBackground) -> Self {
        self.background = Arc::new(background);
        self
    }

    pub fn with_identifier(mut self, identifier: ScriptedIdentifier) -> Self {
        self.identifier = Arc::new(identifier);
        self
    }

    pub fn with_api_token(mut self, token: &str) -> Self {
        self.config.api_token = Some(token.to_string());
        self
    }

    pub fn places_calls(&self) -> usize {
        self.places.calls()
    }

    pub fn state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            places: self.places.clone(),
            background: self.background.clone(),
            identifier: self.identifier.clone(),
            config: self.config.clone(),
        }
    }
}
