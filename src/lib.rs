pub mod api; // HTTP API (axum)
pub mod carry_forward; // Daily appointment carry-forward
pub mod config;
pub mod core_state; // Shared state for server, timer and CLI
pub mod db;
pub mod models;
