// Memory records: ingestion, proximity grouping, patching, and their HTTP handlers.
// External calls go through the collaborator traits in `services` and `llm_client`.

pub mod geo;
pub mod grouping;
pub mod handlers;
pub mod identify;
pub mod ingest;
pub mod patch;
pub mod prompts;
pub mod store;
