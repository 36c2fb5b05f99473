// handlers/mod.rs - Tiered handler layout
//
// Public (no token) → Protected (any access token) → Elevated (ADMIN token). Every tier runs behind the
// tenant_context middleware, so a valid token always means a tenant marker.
pub mod elevated;
pub mod health;
pub mod protected;
pub mod public;
