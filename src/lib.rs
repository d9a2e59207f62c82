pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod estimation;
pub mod state;
pub mod store;
