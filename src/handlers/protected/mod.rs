// handlers/protected/mod.rs - Handlers for any authenticated campus user
pub mod vehicles;
