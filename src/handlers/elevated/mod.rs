// handlers/elevated/mod.rs - ADMIN-only handlers
pub mod admin;
