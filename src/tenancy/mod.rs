pub mod aggregator;
pub mod error;
pub mod marker;
pub mod propagator;
pub mod resolver;
pub mod tenant_id;

pub use aggregator::{CrossTenantAggregator, TenantOutcome};
pub use error::TenancyError;
pub use marker::{ClearOnExit, MarkerRestore, TenantMarker};
pub use propagator::{TaskContextPropagator, TenantAwareExecutor, TenantJob};
pub use resolver::SchemaResolver;
pub use tenant_id::{AllowList, TenantId};
