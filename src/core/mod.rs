pub mod config;
pub mod error;
pub mod harvester;
pub mod models;
