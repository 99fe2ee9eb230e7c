pub mod api;
pub mod api_docs;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod gateway;
pub mod infrastructure;
pub mod integrations;
pub mod models;
pub mod services;
pub mod utils;

pub use infrastructure::server;
