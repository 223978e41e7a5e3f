pub mod app;
pub mod auth;
pub mod config;
pub mod countries;
pub mod db;
pub mod error;
pub mod extract;
pub mod memory;
pub mod pagination;
pub mod posts;
pub mod state;
pub mod users;
