use serde::Serialize;

use crate::memories::patch::{normalize_tags, normalize_text};
use crate::models::memory::MemoryRecord;

/// Body of a PATCH the front end should send. Omitted fields are left alone;
/// an empty tag list or blank text clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dish_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
}

impl RecordEdit {
    pub fn is_empty(&self) -> bool {
        *self == RecordEdit::default()
    }

    /// Optimistic local copy of what the server will store. A new restaurant
    /// drops the place-link until the server copy supplies the resolved one.
    pub fn apply_to(&self, record: &mut MemoryRecord) {
        if let Some(tags) = &self.friend_tags {
            record.friend_tags = normalize_tags(tags.clone());
        }
        if let Some(note) = &self.note {
            record.note = normalize_text(note);
        }
        if let Some(dish) = &self.dish_name {
            record.dish_name = normalize_text(dish);
        }
        if let Some(restaurant) = &self.restaurant_name {
            let restaurant = normalize_text(restaurant);
            if restaurant != record.restaurant_name {
                record.place_url = None;
            }
            record.restaurant_name = restaurant;
        }
    }
}

/// Unsaved edits for the selected record. Discarded on deselect.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffers {
    record_id: i64,
    tags: Vec<String>,
    note: String,
    note_seed: String,
    dish_name: String,
    dish_seed: String,
}

impl EditBuffers {
    pub fn seed(record: &MemoryRecord) -> Self {
        let note = record.note.clone().unwrap_or_default();
        let dish_name = record.dish_name.clone().unwrap_or_default();
        Self {
            record_id: record.id,
            tags: record.friend_tags.clone().unwrap_or_default(),
            note_seed: note.clone(),
            note,
            dish_seed: dish_name.clone(),
            dish_name,
        }
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn dish_name(&self) -> &str {
        &self.dish_name
    }

    /// Commits immediately. `None` for blank or already-present tags.
    pub fn add_tag(&mut self, raw: &str) -> Option<RecordEdit> {
        let tag = raw.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return None;
        }
        self.tags.push(tag.to_string());
        Some(self.tags_edit())
    }

    pub fn remove_tag(&mut self, tag: &str) -> Option<RecordEdit> {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        if self.tags.len() == before {
            return None;
        }
        Some(self.tags_edit())
    }

    fn tags_edit(&self) -> RecordEdit {
        RecordEdit {
            friend_tags: Some(self.tags.clone()),
            ..Default::default()
        }
    }

    pub fn set_note(&mut self, text: impl Into<String>) {
        self.note = text.into();
    }

    /// Commits only when the text differs from what was seeded.
    pub fn blur_note(&mut self) -> Option<RecordEdit> {
        if self.note == self.note_seed {
            return None;
        }
        self.note_seed = self.note.clone();
        Some(RecordEdit {
            note: Some(self.note.clone()),
            ..Default::default()
        })
    }

    pub fn set_dish_name(&mut self, text: impl Into<String>) {
        self.dish_name = text.into();
    }

    pub fn blur_dish_name(&mut self) -> Option<RecordEdit> {
        if self.dish_name == self.dish_seed {
            return None;
        }
        self.dish_seed = self.dish_name.clone();
        Some(RecordEdit {
            dish_name: Some(self.dish_name.clone()),
            ..Default::default()
        })
    }
}
