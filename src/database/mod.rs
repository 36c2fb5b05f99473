pub mod manager;
pub mod models;
pub mod repository;
pub mod router;
pub mod unit_of_work;

pub use manager::{DatabaseError, DatabaseManager};
pub use router::{BoundConnection, ConnectionRouter, ConnectionSource, SchemaConnection};
pub use unit_of_work::{TenantQuery, UnitOfWork};
