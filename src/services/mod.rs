pub mod audit_service;
pub mod auth_service;
pub mod dashboard_service;
pub mod vehicle_service;

pub use audit_service::AuditLogger;
pub use auth_service::{AuthService, LoginRequest, LoginResponse, UserInfo};
pub use dashboard_service::{CampusArrivalStats, DashboardService, MultiCampusDashboard};
pub use vehicle_service::{
    ArrivalRecorded, RegisterVehicleRequest, VehicleCreated, VehicleError, VehicleService,
};
