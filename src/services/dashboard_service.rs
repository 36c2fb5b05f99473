use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::database::repository::{ArrivalCounts, ArrivalStats};
use crate::database::{ConnectionSource, TenantQuery, UnitOfWork};
use crate::tenancy::CrossTenantAggregator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampusArrivalStats {
    pub campus: String,
    pub campus_name: String,
    pub bikes_count: i64,
    pub cars_count: i64,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiCampusDashboard {
    pub date: NaiveDate,
    pub campus_stats: Vec<CampusArrivalStats>,
}

/// Admin view across every campus
pub struct DashboardService<S> {
    aggregator: CrossTenantAggregator<S>,
}

impl<S> DashboardService<S>
where
    S: ConnectionSource,
    ArrivalCounts: TenantQuery<S::Connection, Output = ArrivalStats>,
{
    pub fn new(unit_of_work: UnitOfWork<S>) -> Self {
        Self {
            aggregator: CrossTenantAggregator::new(unit_of_work),
        }
    }

    /// Arrivals per campus for `date`. A campus that cannot be read shows zero counts.
    pub async fn multi_campus_dashboard(&self, date: NaiveDate) -> MultiCampusDashboard {
        info!("Starting multi-campus dashboard fetch for date: {}", date);

        let campus_stats = self
            .aggregator
            .aggregate(&ArrivalCounts { date })
            .await
            .into_iter()
            .map(|outcome| CampusArrivalStats {
                campus: outcome.tenant.to_string(),
                campus_name: outcome.tenant.display_name(),
                bikes_count: outcome.value.bikes,
                cars_count: outcome.value.cars,
                total_count: outcome.value.total(),
            })
            .collect();

        MultiCampusDashboard { date, campus_stats }
    }
}
