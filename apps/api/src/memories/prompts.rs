// Dish identification prompt templates.

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else: \
    no markdown fences, no commentary.";

pub fn identify_system() -> String {
    format!(
        "You identify food in photographs. {JSON_ONLY} \
         Dish names are short and specific (2 to 5 words), title case, no restaurant name."
    )
}

pub const DISH_ONLY_PROMPT: &str = r#"Name the dish in this photo.

OUTPUT SCHEMA (return exactly this structure):
{ "dish": "string" | null }

Use null only if the photo does not show food or drink."#;

pub const DISH_AND_RESTAURANT_PROMPT: &str = r#"Name the dish in this photo and pick the restaurant it most likely came from.

The photo was taken within a few dozen meters of these places:
{candidates}

OUTPUT SCHEMA (return exactly this structure):
{ "dish": "string" | null, "restaurant": "string" }

"restaurant" MUST be copied exactly from the list above. Choose the place whose
menu best fits the dish; if nothing fits, choose the first place in the list."#;

pub fn dish_and_restaurant_prompt(candidates: &[String]) -> String {
    let list = candidates
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    DISH_AND_RESTAURANT_PROMPT.replace("{candidates}", &list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_are_listed() {
        let prompt =
            dish_and_restaurant_prompt(&["Katz's Delicatessen".to_string(), "Russ & Daughters".to_string()]);
        assert!(prompt.contains("- Katz's Delicatessen\n- Russ & Daughters"));
        assert!(!prompt.contains("{candidates}"));
    }
}
