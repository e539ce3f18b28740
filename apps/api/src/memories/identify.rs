//! Dish / restaurant identification.
//!
//! The vision call is untrusted: its answer is parsed into `IdentifyOutcome`
//! and then resolved against the nearby candidates by `resolve_identification`,
//! which is the only place the fallback policy lives.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm_client::{parse_json_text, ImageInput, LlmClient, LlmError};
use crate::memories::patch::MAX_NAME_CHARS;
use crate::memories::prompts::{
    dish_and_restaurant_prompt, identify_system, DISH_ONLY_PROMPT,
};
use crate::services::places::{match_candidate, PlaceCandidate};

/// What the model said, before it is checked against the candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyOutcome {
    Structured {
        dish: Option<String>,
        restaurant: Option<String>,
    },
    /// The reply was not the expected JSON.
    FreeText(String),
}

#[async_trait]
pub trait DishIdentifier: Send + Sync {
    /// With no candidates only a dish is requested.
    async fn identify(
        &self,
        image: &ImageInput,
        candidates: &[String],
    ) -> Result<IdentifyOutcome, LlmError>;
}

#[derive(Debug, Deserialize)]
struct RawIdentification {
    dish: Option<String>,
    #[serde(default)]
    restaurant: Option<String>,
}

pub struct LlmDishIdentifier {
    llm: LlmClient,
}

impl LlmDishIdentifier {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl DishIdentifier for LlmDishIdentifier {
    async fn identify(
        &self,
        image: &ImageInput,
        candidates: &[String],
    ) -> Result<IdentifyOutcome, LlmError> {
        let prompt = if candidates.is_empty() {
            DISH_ONLY_PROMPT.to_string()
        } else {
            dish_and_restaurant_prompt(candidates)
        };

        let response = self
            .llm
            .call_with_image(image, &prompt, &identify_system())
            .await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        Ok(parse_outcome(text))
    }
}

fn parse_outcome(text: &str) -> IdentifyOutcome {
    match parse_json_text::<RawIdentification>(text) {
        Ok(raw) => IdentifyOutcome::Structured {
            dish: raw.dish,
            restaurant: raw.restaurant,
        },
        Err(e) => {
            debug!("Identification reply was not JSON ({e}); using raw text");
            IdentifyOutcome::FreeText(text.to_string())
        }
    }
}

/// Resolved dish and restaurant for a new memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identification {
    pub dish_name: Option<String>,
    /// The nearby candidate chosen as the restaurant.
    pub place: Option<PlaceCandidate>,
}

impl Identification {
    pub fn restaurant_name(&self) -> Option<String> {
        self.place.as_ref().map(|p| p.name.clone())
    }

    /// Derived from the chosen candidate's place id, never a fresh lookup.
    pub fn place_url(&self) -> Option<String> {
        self.place.as_ref().map(PlaceCandidate::place_url)
    }
}

/// Applies the fallback policy:
/// - the restaurant is always one of `candidates`; when the model gave no
///   admissible name (bad JSON, failed call, null, or a name not in the list)
///   the first candidate is used;
/// - with no candidates there is never a restaurant;
/// - free text becomes the dish name; a failed call leaves the dish unset.
pub fn resolve_identification(
    outcome: Result<IdentifyOutcome, LlmError>,
    candidates: &[PlaceCandidate],
) -> Identification {
    let (dish, restaurant) = match outcome {
        Ok(IdentifyOutcome::Structured { dish, restaurant }) => (dish, restaurant),
        Ok(IdentifyOutcome::FreeText(text)) => (Some(text), None),
        Err(e) => {
            warn!("Dish identification unavailable: {e}");
            (None, None)
        }
    };

    let place = restaurant
        .as_deref()
        .and_then(|name| match_candidate(candidates, name))
        .or_else(|| candidates.first())
        .cloned();

    Identification {
        dish_name: dish.as_deref().and_then(clean_dish_name),
        place,
    }
}

/// Trims whitespace and wrapping quotes, truncates to `MAX_NAME_CHARS`.
pub fn clean_dish_name(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    let first_line = trimmed.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return None;
    }
    let short: String = first_line.chars().take(MAX_NAME_CHARS).collect();
    Some(short.trim_end().to_string())
}
