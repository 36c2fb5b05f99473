pub mod app;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod tenancy;

#[cfg(test)]
pub mod testing;

pub use app::{app, AppState};
