//! Partial updates to a memory.
//!
//! Each mutable field is a `FieldUpdate`: absent from the payload, explicitly
//! null (clear), or a new value. A restaurant change is detected by comparing
//! the normalized new name with the stored one; only a real change touches
//! the place-link.

use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::memories::geo::Coordinate;
use crate::memories::store::RecordStore;
use crate::models::memory::{MemoryChanges, MemoryRecord};
use crate::services::places::{match_candidate, PlaceSearch};

pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_NOTE_CHARS: usize = 4000;
pub const MAX_TAG_CHARS: usize = 60;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldUpdate<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only reached when the key is present; `#[serde(default)]` covers absence.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryPatch {
    #[serde(default, alias = "tags")]
    pub friend_tags: FieldUpdate<Vec<String>>,
    #[serde(default)]
    pub note: FieldUpdate<String>,
    #[serde(default)]
    pub dish_name: FieldUpdate<String>,
    #[serde(default)]
    pub restaurant_name: FieldUpdate<String>,
}

impl MemoryPatch {
    pub fn is_empty(&self) -> bool {
        self.friend_tags == FieldUpdate::Absent
            && self.note == FieldUpdate::Absent
            && self.dish_name == FieldUpdate::Absent
            && self.restaurant_name == FieldUpdate::Absent
    }
}

/// Trims, drops blanks and exact duplicates (first wins). Empty becomes `None`.
pub fn normalize_tags(tags: Vec<String>) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Trims; blank becomes `None`.
pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn check_length(field: &str, value: &Option<String>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

fn text_update(update: &FieldUpdate<String>, current: &Option<String>) -> Option<String> {
    match update {
        FieldUpdate::Absent => current.clone(),
        FieldUpdate::Clear => None,
        FieldUpdate::Set(v) => normalize_text(v),
    }
}

/// Looks up places near the record and links the one named `name`, if any.
pub async fn resolve_place_url(
    places: &dyn PlaceSearch,
    at: Coordinate,
    name: &str,
) -> Option<String> {
    match places.nearby(at).await {
        Ok(candidates) => match_candidate(&candidates, name).map(|c| c.place_url()),
        Err(e) => {
            warn!("Place lookup for '{name}' failed, clearing place link: {e}");
            None
        }
    }
}

pub async fn apply_patch(
    store: &dyn RecordStore,
    places: &dyn PlaceSearch,
    id: i64,
    patch: MemoryPatch,
) -> Result<MemoryRecord, AppError> {
    let existing = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Memory {id} not found")))?;

    if patch.is_empty() {
        return Ok(existing);
    }

    let mut changes = MemoryChanges::from_record(&existing);

    changes.friend_tags = match patch.friend_tags {
        FieldUpdate::Absent => changes.friend_tags,
        FieldUpdate::Clear => None,
        FieldUpdate::Set(tags) => normalize_tags(tags),
    };
    if let Some(tags) = &changes.friend_tags {
        if let Some(long) = tags.iter().find(|t| t.chars().count() > MAX_TAG_CHARS) {
            return Err(AppError::Validation(format!(
                "Tag '{long}' is longer than {MAX_TAG_CHARS} characters"
            )));
        }
    }

    changes.note = text_update(&patch.note, &existing.note);
    changes.dish_name = text_update(&patch.dish_name, &existing.dish_name);
    let new_restaurant = text_update(&patch.restaurant_name, &existing.restaurant_name);

    check_length("note", &changes.note, MAX_NOTE_CHARS)?;
    check_length("dish_name", &changes.dish_name, MAX_NAME_CHARS)?;
    check_length("restaurant_name", &new_restaurant, MAX_NAME_CHARS)?;

    if new_restaurant != existing.restaurant_name {
        changes.place_url = match &new_restaurant {
            Some(name) => resolve_place_url(places, existing.coordinate(), name).await,
            None => None,
        };
        info!(
            "Memory {id} restaurant {:?} -> {:?} (linked: {})",
            existing.restaurant_name,
            new_restaurant,
            changes.place_url.is_some()
        );
        changes.restaurant_name = new_restaurant;
    }

    // Read-then-write; a concurrent patch to the same id may interleave.
    store
        .update(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Memory {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::places::PlaceCandidate;
    use crate::test_support::{record_at, InMemoryStore, StaticPlaces};

    fn seeded(restaurant: Option<&str>) -> InMemoryStore {
        let mut record = record_at(7, Coordinate::new(40.7223, -73.9874));
        record.restaurant_name = restaurant.map(String::from);
        record.place_url = restaurant.map(|_| "https://maps.example/old".to_string());
        InMemoryStore::with_records(vec![record])
    }

    fn patch_json(body: &str) -> MemoryPatch {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_field_update_distinguishes_absent_null_and_value() {
        let p = patch_json(r#"{"note": null, "dish_name": "Pastrami on Rye"}"#);
        assert_eq!(p.friend_tags, FieldUpdate::Absent);
        assert_eq!(p.note, FieldUpdate::Clear);
        assert_eq!(p.dish_name, FieldUpdate::Set("Pastrami on Rye".to_string()));
        assert_eq!(p.restaurant_name, FieldUpdate::Absent);
        assert!(patch_json("{}").is_empty());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<MemoryPatch>(r#"{"latitude": 1.0}"#).is_err());
    }

    #[test]
    fn test_tags_alias_accepted() {
        let p = patch_json(r#"{"tags": ["Sam"]}"#);
        assert_eq!(p.friend_tags, FieldUpdate::Set(vec!["Sam".to_string()]));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            "Sam".to_string(),
            " Alex ".to_string(),
            "Sam".to_string(),
            "sam".to_string(),
            "".to_string(),
        ];
        assert_eq!(
            normalize_tags(tags),
            Some(vec!["Sam".to_string(), "Alex".to_string(), "sam".to_string()])
        );
        assert_eq!(normalize_tags(vec![]), None);
        assert_eq!(normalize_tags(vec!["  ".to_string()]), None);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = seeded(None);
        let places = StaticPlaces::new(vec![]);
        let err = apply_patch(&store, &places, 999, patch_json(r#"{"note": "hi"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_tag_added_then_removed_persists_null() {
        let store = seeded(None);
        let places = StaticPlaces::new(vec![]);

        let added = apply_patch(&store, &places, 7, patch_json(r#"{"friend_tags": ["Sam"]}"#))
            .await
            .unwrap();
        assert_eq!(added.friend_tags, Some(vec!["Sam".to_string()]));

        let removed = apply_patch(&store, &places, 7, patch_json(r#"{"friend_tags": []}"#))
            .await
            .unwrap();
        assert_eq!(removed.friend_tags, None);
        assert_eq!(store.snapshot()[0].friend_tags, None);
    }

    #[tokio::test]
    async fn test_restaurant_change_with_match_links_place() {
        let store = seeded(Some("Katz's Delicatessen"));
        let places = StaticPlaces::new(vec![
            PlaceCandidate::new("Katz's Delicatessen", "katz"),
            PlaceCandidate::new("Russ & Daughters Cafe", "russ"),
        ]);

        let updated = apply_patch(
            &store,
            &places,
            7,
            patch_json(r#"{"restaurant_name": "Russ & Daughters Cafe"}"#),
        )
        .await
        .unwrap();
        assert_eq!(
            updated.restaurant_name.as_deref(),
            Some("Russ & Daughters Cafe")
        );
        assert_eq!(
            updated.place_url.as_deref(),
            Some("https://www.google.com/maps/place/?q=place_id:russ")
        );
    }

    #[tokio::test]
    async fn test_restaurant_change_without_match_clears_link() {
        let store = seeded(Some("Katz's Delicatessen"));
        let places = StaticPlaces::new(vec![PlaceCandidate::new("Katz's Delicatessen", "katz")]);

        let updated = apply_patch(
            &store,
            &places,
            7,
            patch_json(r#"{"restaurant_name": "Grandma's Kitchen"}"#),
        )
        .await
        .unwrap();
        assert_eq!(updated.restaurant_name.as_deref(), Some("Grandma's Kitchen"));
        assert_eq!(updated.place_url, None);
    }

    #[tokio::test]
    async fn test_cleared_restaurant_clears_link_without_lookup() {
        let store = seeded(Some("Katz's Delicatessen"));
        let places = StaticPlaces::new(vec![PlaceCandidate::new("Katz's Delicatessen", "katz")]);

        for body in [r#"{"restaurant_name": null}"#, r#"{"restaurant_name": "   "}"#] {
            let updated = apply_patch(&store, &places, 7, patch_json(body))
                .await
                .unwrap();
            assert_eq!(updated.restaurant_name, None);
            assert_eq!(updated.place_url, None);
        }
        assert_eq!(places.calls(), 0);
    }

    #[tokio::test]
    async fn test_same_restaurant_keeps_link_and_skips_lookup() {
        let store = seeded(Some("Katz's Delicatessen"));
        let places = StaticPlaces::new(vec![]);

        let updated = apply_patch(
            &store,
            &places,
            7,
            patch_json(r#"{"restaurant_name": " Katz's Delicatessen ", "note": "  best pastrami "}"#),
        )
        .await
        .unwrap();
        assert_eq!(
            updated.place_url.as_deref(),
            Some("https://maps.example/old")
        );
        assert_eq!(updated.note.as_deref(), Some("best pastrami"));
        assert_eq!(places.calls(), 0);
    }

    #[tokio::test]
    async fn test_place_lookup_failure_clears_link() {
        let store = seeded(Some("Old Name"));
        let places = StaticPlaces::failing();

        let updated = apply_patch(&store, &places, 7, patch_json(r#"{"restaurant_name": "New"}"#))
            .await
            .unwrap();
        assert_eq!(updated.restaurant_name.as_deref(), Some("New"));
        assert_eq!(updated.place_url, None);
    }

    #[tokio::test]
    async fn test_overlong_dish_name_rejected_without_write() {
        let store = seeded(None);
        let places = StaticPlaces::new(vec![]);
        let body = format!(r#"{{"dish_name": "{}"}}"#, "a".repeat(MAX_NAME_CHARS + 1));

        let err = apply_patch(&store, &places, 7, patch_json(&body))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.snapshot()[0].dish_name, None);
    }
}
