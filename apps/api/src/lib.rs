pub mod auth;
pub mod backfill;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm_client;
pub mod memories;
pub mod models;
pub mod presentation;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;
