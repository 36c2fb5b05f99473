pub mod audit_log;
pub mod user;
pub mod vehicle;

pub use audit_log::AuditAction;
pub use user::{Role, UnknownRole, User};
pub use vehicle::{NewVehicle, VehicleType};
