pub mod auth;
pub mod config;
pub mod connectors;
pub mod dates;
pub mod error;
pub mod mail;
pub mod models;
pub mod output;
pub mod sheets;
pub mod sync;
