// Presentation layer - HTTP handlers and shared handler state
pub mod app_state;
pub mod handlers;
